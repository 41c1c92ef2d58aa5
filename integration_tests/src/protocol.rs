//! GATT surface definitions matching the firmware.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use uuid::Uuid;

/// Expand a SIG-assigned 16-bit UUID onto the Bluetooth base UUID
const fn sig_uuid(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | 0x0000_0000_0000_1000_8000_0080_5f9b_34fb)
}

pub const CSC_SERVICE_UUID: Uuid = sig_uuid(0x1816);
pub const CSC_FEATURE_UUID: Uuid = sig_uuid(0x2a5c);
pub const SENSOR_LOCATION_UUID: Uuid = sig_uuid(0x2a5d);
pub const SC_CONTROL_POINT_UUID: Uuid = sig_uuid(0x2a55);
pub const MANUFACTURER_NAME_UUID: Uuid = sig_uuid(0x2a29);
pub const MODEL_NUMBER_UUID: Uuid = sig_uuid(0x2a24);

pub const IMU_SERVICE_UUID: Uuid = Uuid::from_u128(0xa8f1c000_4e1b_4c6a_9d0e_7b3f5c2a9e10);
pub const IMU_LIVE_DATA_UUID: Uuid = Uuid::from_u128(0xa8f1c001_4e1b_4c6a_9d0e_7b3f5c2a9e10);

/// Feature bits advertised by the firmware (wheel, crank, multiple locations)
pub const CSC_FEATURES: u16 = 0x0007;

/// Supported sensor locations, in the order the firmware reports them
pub const SUPPORTED_LOCATIONS: [u8; 4] = [4, 10, 11, 12];

pub const DEFAULT_LOCATION: u8 = 10;

/// ATT error for a control point write without indications enabled
/// (common profile code; the CSC profile's 0x81)
pub const CCCD_IMPROPERLY_CONFIGURED: u8 = 0xFD;

/// Control point op-codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    SetCumulativeValue = 0x01,
    StartSensorCalibration = 0x02,
    UpdateSensorLocation = 0x03,
    RequestSupportedSensorLocations = 0x04,
}

/// Control point indication status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseCode {
    Success = 0x01,
    OpCodeNotSupported = 0x02,
    InvalidParameter = 0x03,
    OperationFailed = 0x04,
}

impl TryFrom<u8> for ResponseCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(ResponseCode::Success),
            0x02 => Ok(ResponseCode::OpCodeNotSupported),
            0x03 => Ok(ResponseCode::InvalidParameter),
            0x04 => Ok(ResponseCode::OperationFailed),
            _ => Err(value),
        }
    }
}

/// Parsed control point indication.
#[derive(Debug, Clone)]
pub struct ControlPointResponse {
    pub status: ResponseCode,
    pub payload: Vec<u8>,
}

pub fn parse_control_point_response(data: &[u8]) -> Result<ControlPointResponse> {
    let (&status, payload) = data
        .split_first()
        .ok_or_else(|| anyhow!("Empty control point indication"))?;
    let status = ResponseCode::try_from(status)
        .map_err(|b| anyhow!("Unknown response code 0x{:02x}", b))?;
    Ok(ControlPointResponse {
        status,
        payload: payload.to_vec(),
    })
}

/// One live data notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuSample {
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
}

impl ImuSample {
    /// Length of a live data notification
    pub const SIZE: usize = 24;

    /// Decode `[ax, ay, az, gx, gy, gz]`, f32 little-endian.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != Self::SIZE {
            return Err(anyhow!(
                "Expected {} byte sample, got {}",
                Self::SIZE,
                data.len()
            ));
        }

        let mut values = [0f32; 6];
        for (value, chunk) in values.iter_mut().zip(data.chunks_exact(4)) {
            *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }

        Ok(Self {
            accel: [values[0], values[1], values[2]],
            gyro: [values[3], values[4], values[5]],
        })
    }

    /// Magnitude of the acceleration vector in g
    pub fn accel_magnitude(&self) -> f32 {
        self.accel.iter().map(|a| a * a).sum::<f32>().sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sig_uuid_expansion() {
        assert_eq!(
            CSC_SERVICE_UUID.to_string(),
            "00001816-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_parse_sample() {
        let mut data = Vec::new();
        for v in [0.0f32, 0.0, 1.0, 10.0, -20.0, 30.0] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let sample = ImuSample::parse(&data).unwrap();
        assert_eq!(sample.accel, [0.0, 0.0, 1.0]);
        assert_eq!(sample.gyro, [10.0, -20.0, 30.0]);
        assert!((sample.accel_magnitude() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_parse_sample_wrong_length() {
        assert!(ImuSample::parse(&[0u8; 20]).is_err());
    }

    #[test]
    fn test_parse_control_point_response() {
        let response = parse_control_point_response(&[0x01, 4, 10, 11, 12]).unwrap();
        assert_eq!(response.status, ResponseCode::Success);
        assert_eq!(response.payload, SUPPORTED_LOCATIONS);
        assert!(parse_control_point_response(&[]).is_err());
    }
}
