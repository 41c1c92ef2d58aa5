//! GATT attribute server core
//!
//! Target independent: the trouble-host binding in `ble` drives it through
//! [`ServerEvent`]s and the [`AttributeRegistry`] / [`GattTransport`] seams.

pub mod buffer;
pub mod control_point;
pub mod error;
pub mod event;
pub mod notify;
pub mod server;
pub mod table;
pub mod tracker;
pub mod transport;
pub mod uuid;

pub use error::{AttError, RegistrationError, TransportError};
pub use event::{EventOutcome, ServerEvent};
pub use server::{SensorServer, ServerConfig};
pub use table::{AttributeHandle, AttributeRegistry, Characteristic};
pub use tracker::ConnectionId;
pub use transport::GattTransport;
