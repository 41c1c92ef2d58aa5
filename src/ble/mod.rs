//! Bluetooth Low Energy binding
//!
//! Declares the trouble-host attribute server and adapts it to the
//! target-independent GATT core.

pub mod link;
pub mod service;

pub use link::{LinkTransport, ServerRegistry};
pub use service::ImuGattServer;
