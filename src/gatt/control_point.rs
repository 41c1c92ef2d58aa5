//! SC control point command/response protocol
//!
//! # Write format
//!
//! ```text
//! [op_code: u8][parameter: variable]
//! ```
//!
//! | Op-code | Command | Parameter |
//! |---------|---------|-----------|
//! | 0x01 | Set cumulative value | `u32` LE wheel revolutions |
//! | 0x02 | Start sensor calibration | none (not supported) |
//! | 0x03 | Update sensor location | `u8` location |
//! | 0x04 | Request supported sensor locations | none |
//!
//! # Indication format
//!
//! ```text
//! [status: u8][payload: variable]
//! ```
//!
//! Only "request supported sensor locations" carries a payload: the
//! canonical location list. A write is rejected at the ATT level only for
//! CCC misconfiguration, an unconfirmed previous indication, a truncated or
//! oversized payload or buffer exhaustion. Everything else is a status byte.
//! Trailing bytes after a complete parameter are ignored.

use crate::config::gatt::MAX_ATTRIBUTE_VALUE;
use crate::gatt::buffer::AttBuffer;
use crate::gatt::error::AttError;

/// Longest control point write accepted
///
/// The host attribute storing the written value is sized to this, so any
/// write the core accepts is also accepted by the host.
pub const MAX_WRITE_LEN: usize = MAX_ATTRIBUTE_VALUE;

/// CSC feature bits (u16 LE on the wire)
pub mod feature {
    pub const WHEEL_REV_DATA: u16 = 0x01;
    pub const CRANK_REV_DATA: u16 = 0x02;
    pub const MULTIPLE_SENSOR_LOCATIONS: u16 = 0x04;
}

/// Features advertised by this sensor
pub const CSC_FEATURES: u16 =
    feature::WHEEL_REV_DATA | feature::CRANK_REV_DATA | feature::MULTIPLE_SENSOR_LOCATIONS;

/// Body sensor location values from the CSC profile
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorLocation {
    Other = 0,
    TopOfShoe = 1,
    InShoe = 2,
    Hip = 3,
    FrontWheel = 4,
    LeftCrank = 5,
    RightCrank = 6,
    LeftPedal = 7,
    RightPedal = 8,
    FrontHub = 9,
    RearDropout = 10,
    Chainstay = 11,
    RearWheel = 12,
    RearHub = 13,
}

impl SensorLocation {
    pub const fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Canonical supported-location list
///
/// Used both to validate updates and as the body of the supported-locations
/// response, so the two can never disagree.
pub const SUPPORTED_SENSOR_LOCATIONS: [SensorLocation; 4] = [
    SensorLocation::FrontWheel,
    SensorLocation::RearDropout,
    SensorLocation::Chainstay,
    SensorLocation::RearWheel,
];

pub const DEFAULT_SENSOR_LOCATION: SensorLocation = SensorLocation::RearDropout;

/// Control point op-codes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    SetCumulativeValue = 0x01,
    StartSensorCalibration = 0x02,
    UpdateSensorLocation = 0x03,
    RequestSupportedSensorLocations = 0x04,
}

impl OpCode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::SetCumulativeValue),
            0x02 => Some(Self::StartSensorCalibration),
            0x03 => Some(Self::UpdateSensorLocation),
            0x04 => Some(Self::RequestSupportedSensorLocations),
            _ => None,
        }
    }

    /// Feature bit that must be advertised for this op-code to be accepted
    ///
    /// `None` means the op-code is never supported by this sensor.
    const fn required_feature(self) -> Option<u16> {
        match self {
            OpCode::SetCumulativeValue => Some(feature::WHEEL_REV_DATA),
            OpCode::UpdateSensorLocation | OpCode::RequestSupportedSensorLocations => {
                Some(feature::MULTIPLE_SENSOR_LOCATIONS)
            }
            OpCode::StartSensorCalibration => None,
        }
    }
}

/// Status byte at the head of every indication
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success = 0x01,
    OpCodeNotSupported = 0x02,
    InvalidParameter = 0x03,
}

/// CSC measurement counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeasurementState {
    /// Set by the "set cumulative value" op-code
    pub cumulative_wheel_rev: u32,
}

/// Configuration mutated by the control point and read by other handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorConfig {
    pub location: SensorLocation,
    pub measurement: MeasurementState,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            location: DEFAULT_SENSOR_LOCATION,
            measurement: MeasurementState::default(),
        }
    }
}

/// Indication handshake state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPointState {
    Idle,
    /// A response indication is in flight
    AwaitingConfirmation,
}

/// Decoded control point write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    SetCumulativeValue(u32),
    UpdateSensorLocation(u8),
    RequestSupportedSensorLocations,
    Unsupported(u8),
}

/// Configuration change to apply once the response is built
#[derive(Debug, Clone, Copy)]
enum Mutation {
    None,
    CumulativeValue(u32),
    Location(SensorLocation),
}

/// Control point state machine
#[derive(Debug)]
pub struct ControlPoint {
    state: ControlPointState,
    features: u16,
    config: SensorConfig,
}

impl ControlPoint {
    pub fn new(features: u16) -> Self {
        Self {
            state: ControlPointState::Idle,
            features,
            config: SensorConfig::default(),
        }
    }

    /// Handle a write and build the indication payload
    ///
    /// On `Ok` the configuration change (if any) has been committed and the
    /// returned buffer must be sent as an indication. On `Err` nothing was
    /// mutated and nothing should be sent. `capacity` is the largest
    /// indication payload the link can carry.
    pub fn process(
        &mut self,
        indications_enabled: bool,
        payload: &[u8],
        capacity: usize,
    ) -> Result<AttBuffer, AttError> {
        if !indications_enabled {
            log::warn!("CP: write rejected, indications not enabled");
            return Err(AttError::CccImproperlyConfigured);
        }
        if self.state == ControlPointState::AwaitingConfirmation {
            log::warn!("CP: write rejected, previous indication unconfirmed");
            return Err(AttError::ProcedureAlreadyInProgress);
        }

        if payload.len() > MAX_WRITE_LEN {
            log::warn!("CP: write of {} bytes rejected", payload.len());
            return Err(AttError::InvalidAttributeValueLength);
        }

        let request = self.decode(payload)?;
        let (status, mutation) = self.evaluate(request);

        let mut response = AttBuffer::with_limit(capacity);
        response.push(status as u8)?;
        if request == Request::RequestSupportedSensorLocations && status == ResponseCode::Success {
            response.append(&SUPPORTED_SENSOR_LOCATIONS.map(SensorLocation::to_byte))?;
        }

        self.commit(mutation);
        log::info!("CP: {:?} -> {:?}", request, status);
        Ok(response)
    }

    /// The response indication was handed to the link
    pub fn indication_sent(&mut self) {
        self.state = ControlPointState::AwaitingConfirmation;
    }

    /// The peer confirmed the response indication
    pub fn indication_confirmed(&mut self) {
        if self.state != ControlPointState::AwaitingConfirmation {
            log::debug!("CP: confirmation without pending indication");
        }
        self.state = ControlPointState::Idle;
    }

    /// Drop any in-flight handshake (link lost)
    pub fn reset(&mut self) {
        self.state = ControlPointState::Idle;
    }

    pub fn state(&self) -> ControlPointState {
        self.state
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn features(&self) -> u16 {
        self.features
    }

    fn decode(&self, payload: &[u8]) -> Result<Request, AttError> {
        let (&op_code, params) = payload
            .split_first()
            .ok_or(AttError::InvalidAttributeValueLength)?;

        let op = match OpCode::from_byte(op_code) {
            Some(op) if self.supports(op) => op,
            _ => return Ok(Request::Unsupported(op_code)),
        };

        match op {
            OpCode::SetCumulativeValue => {
                let bytes: [u8; 4] = params
                    .get(..4)
                    .and_then(|b| b.try_into().ok())
                    .ok_or(AttError::InvalidAttributeValueLength)?;
                Ok(Request::SetCumulativeValue(u32::from_le_bytes(bytes)))
            }
            OpCode::UpdateSensorLocation => {
                let &location = params.first().ok_or(AttError::InvalidAttributeValueLength)?;
                Ok(Request::UpdateSensorLocation(location))
            }
            OpCode::RequestSupportedSensorLocations => Ok(Request::RequestSupportedSensorLocations),
            OpCode::StartSensorCalibration => Ok(Request::Unsupported(op_code)),
        }
    }

    fn supports(&self, op: OpCode) -> bool {
        op.required_feature()
            .is_some_and(|bit| self.features & bit == bit)
    }

    fn evaluate(&self, request: Request) -> (ResponseCode, Mutation) {
        match request {
            Request::SetCumulativeValue(value) => {
                (ResponseCode::Success, Mutation::CumulativeValue(value))
            }
            Request::UpdateSensorLocation(byte) => {
                match SUPPORTED_SENSOR_LOCATIONS
                    .iter()
                    .find(|location| location.to_byte() == byte)
                {
                    Some(&location) => (ResponseCode::Success, Mutation::Location(location)),
                    None => (ResponseCode::InvalidParameter, Mutation::None),
                }
            }
            Request::RequestSupportedSensorLocations => (ResponseCode::Success, Mutation::None),
            Request::Unsupported(_) => (ResponseCode::OpCodeNotSupported, Mutation::None),
        }
    }

    fn commit(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::None => {}
            Mutation::CumulativeValue(value) => {
                self.config.measurement.cumulative_wheel_rev = value;
            }
            Mutation::Location(location) => self.config.location = location,
        }
    }
}

impl Default for ControlPoint {
    fn default() -> Self {
        Self::new(CSC_FEATURES)
    }
}
