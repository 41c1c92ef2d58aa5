//! Error types for the attribute server
//!
//! Every failure the peer can observe is an [`AttError`], which carries the
//! ATT error code sent back in the error response. Control-point validation
//! failures are not ATT errors; they travel as status bytes inside the
//! indication (see `control_point::ResponseCode`).

use core::fmt;

use crate::gatt::table::AttributeHandle;
use crate::gatt::uuid::Uuid;

/// Broad error categories used for logging and propagation decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wrong operation for the characteristic
    Permission,
    /// Payload too short or too long
    Length,
    /// Buffer or allocation exhaustion
    Resource,
    /// Indication handshake or CCC configuration violated
    ProtocolState,
    /// Unknown op-code, handle or enum value
    Validation,
    /// Sensor bus or link failure, retried next cycle
    TransientIo,
}

/// ATT-level errors returned to the peer
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttError {
    /// Handle is not part of this table (0x01)
    InvalidHandle = 0x01,
    /// Characteristic has no read permission (0x02)
    ReadNotPermitted = 0x02,
    /// Characteristic has no write permission (0x03)
    WriteNotPermitted = 0x03,
    /// Write payload is missing required bytes (0x0D)
    InvalidAttributeValueLength = 0x0D,
    /// Sensor or transport failure while serving the request (0x0E)
    Unlikely = 0x0E,
    /// Response did not fit the outgoing buffer (0x11)
    InsufficientResources = 0x11,
    /// Control-point indication still awaiting confirmation (0x80)
    ProcedureAlreadyInProgress = 0x80,
    /// Control point written without indications enabled (0x81)
    CccImproperlyConfigured = 0x81,
}

impl AttError {
    /// Error code carried in the ATT error response
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Equivalent Core Specification Supplement common profile code
    ///
    /// The CSC application codes 0x80/0x81 have common profile counterparts
    /// (0xFE/0xFD); hosts that only expose the common set send these.
    pub const fn common_profile_code(self) -> u8 {
        match self {
            AttError::ProcedureAlreadyInProgress => 0xFE,
            AttError::CccImproperlyConfigured => 0xFD,
            other => other.code(),
        }
    }

    pub const fn kind(self) -> ErrorKind {
        match self {
            AttError::ReadNotPermitted | AttError::WriteNotPermitted => ErrorKind::Permission,
            AttError::InvalidAttributeValueLength => ErrorKind::Length,
            AttError::InsufficientResources => ErrorKind::Resource,
            AttError::ProcedureAlreadyInProgress | AttError::CccImproperlyConfigured => {
                ErrorKind::ProtocolState
            }
            AttError::InvalidHandle => ErrorKind::Validation,
            AttError::Unlikely => ErrorKind::TransientIo,
        }
    }
}

impl fmt::Display for AttError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AttError::InvalidHandle => "invalid handle",
            AttError::ReadNotPermitted => "read not permitted",
            AttError::WriteNotPermitted => "write not permitted",
            AttError::InvalidAttributeValueLength => "invalid attribute value length",
            AttError::Unlikely => "unlikely error",
            AttError::InsufficientResources => "insufficient resources",
            AttError::ProcedureAlreadyInProgress => "procedure already in progress",
            AttError::CccImproperlyConfigured => "CCC descriptor improperly configured",
        };
        write!(f, "{} (0x{:02x})", text, self.code())
    }
}

/// Errors raised while registering the attribute table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationError {
    /// The host cannot hold the declared number of attributes
    AttributeSpaceExhausted { required: usize, available: usize },
    /// Two characteristics in one service share a UUID
    DuplicateCharacteristic(Uuid),
    /// The host handed out a handle that was already assigned
    HandleReused(AttributeHandle),
    /// The host has no attribute for this UUID
    UnknownAttribute(Uuid),
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::AttributeSpaceExhausted {
                required,
                available,
            } => write!(
                f,
                "attribute space exhausted ({} required, {} available)",
                required, available
            ),
            RegistrationError::DuplicateCharacteristic(uuid) => {
                write!(f, "duplicate characteristic {:?}", uuid)
            }
            RegistrationError::HandleReused(handle) => write!(f, "handle {} reused", handle.0),
            RegistrationError::UnknownAttribute(uuid) => write!(f, "unknown attribute {:?}", uuid),
        }
    }
}

/// Errors returned by the link when pushing notifications or indications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No connection with the given id
    NotConnected,
    /// Packet pool exhausted
    OutOfBuffers,
    /// Link-layer queue full
    Busy,
    /// Any other host stack failure
    Link,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::NotConnected => f.write_str("not connected"),
            TransportError::OutOfBuffers => f.write_str("out of buffers"),
            TransportError::Busy => f.write_str("transport busy"),
            TransportError::Link => f.write_str("link error"),
        }
    }
}

impl From<TransportError> for AttError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::OutOfBuffers => AttError::InsufficientResources,
            _ => AttError::Unlikely,
        }
    }
}
