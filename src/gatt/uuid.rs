//! UUIDs for the services and characteristics exposed by the sensor
//!
//! - Cycling Speed and Cadence service: 0x1816 (feature, location, control point)
//! - IMU service: vendor 128-bit (live accel + gyro data)
//! - Device Information service: 0x180A (manufacturer, model)

/// A Bluetooth UUID, either SIG-assigned 16-bit or vendor 128-bit
///
/// 128-bit values are stored little-endian, as they appear on air.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uuid {
    Uuid16(u16),
    Uuid128([u8; 16]),
}

impl Uuid {
    /// Build a 128-bit UUID from its canonical big-endian integer form
    pub const fn from_u128(value: u128) -> Self {
        Uuid::Uuid128(value.to_le_bytes())
    }
}

pub const CSC_SERVICE: Uuid = Uuid::Uuid16(0x1816);
pub const CSC_FEATURE: Uuid = Uuid::Uuid16(0x2A5C);
pub const SENSOR_LOCATION: Uuid = Uuid::Uuid16(0x2A5D);
pub const SC_CONTROL_POINT: Uuid = Uuid::Uuid16(0x2A55);

pub const IMU_SERVICE: Uuid = Uuid::from_u128(0xa8f1c000_4e1b_4c6a_9d0e_7b3f5c2a9e10);
pub const IMU_LIVE_DATA: Uuid = Uuid::from_u128(0xa8f1c001_4e1b_4c6a_9d0e_7b3f5c2a9e10);

pub const DEVICE_INFO_SERVICE: Uuid = Uuid::Uuid16(0x180A);
pub const MANUFACTURER_NAME: Uuid = Uuid::Uuid16(0x2A29);
pub const MODEL_NUMBER: Uuid = Uuid::Uuid16(0x2A24);
