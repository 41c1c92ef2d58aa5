//! trouble-host GATT declarations
//!
//! Mirrors the table in `gatt::table`; registration checks the two agree.
//! - CSC service 0x1816: feature (read), location (read), control point
//!   (write, indicate)
//! - IMU service (vendor): live data (notify; read is declared here but only
//!   granted by the core when `ServerConfig::live_data_readable` is set)
//! - Device Information 0x180A: manufacturer, model (read)

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::Vec;
use trouble_host::prelude::*;

use crate::gatt::control_point::{CSC_FEATURES, DEFAULT_SENSOR_LOCATION, MAX_WRITE_LEN};
use crate::sensor::traits::SAMPLE_WIRE_SIZE;

/// Control point value size, matching the longest write the core accepts
pub const CP_VALUE_MAX: usize = MAX_WRITE_LEN;

const DEFAULT_LOCATION: u8 = DEFAULT_SENSOR_LOCATION.to_byte();

/// Largest device information string
pub const INFO_STRING_MAX: usize = 32;

#[gatt_service(uuid = "1816")]
pub struct CyclingSpeedCadenceService {
    #[characteristic(uuid = "2a5c", read, value = CSC_FEATURES)]
    pub feature: u16,

    #[characteristic(uuid = "2a5d", read, value = DEFAULT_LOCATION)]
    pub location: u8,

    #[characteristic(uuid = "2a55", write, indicate)]
    pub control_point: Vec<u8, CP_VALUE_MAX>,
}

#[gatt_service(uuid = "a8f1c000-4e1b-4c6a-9d0e-7b3f5c2a9e10")]
pub struct ImuService {
    /// `[ax, ay, az, gx, gy, gz]`, f32 little-endian
    #[characteristic(uuid = "a8f1c001-4e1b-4c6a-9d0e-7b3f5c2a9e10", read, notify, value = [0u8; SAMPLE_WIRE_SIZE])]
    pub live_data: [u8; SAMPLE_WIRE_SIZE],
}

#[gatt_service(uuid = "180a")]
pub struct DeviceInformationService {
    #[characteristic(uuid = "2a29", read)]
    pub manufacturer_name: Vec<u8, INFO_STRING_MAX>,

    #[characteristic(uuid = "2a24", read)]
    pub model_number: Vec<u8, INFO_STRING_MAX>,
}

#[gatt_server(mutex_type = CriticalSectionRawMutex)]
pub struct ImuGattServer {
    pub csc: CyclingSpeedCadenceService,
    pub imu: ImuService,
    pub device_info: DeviceInformationService,
}
