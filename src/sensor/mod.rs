//! Inertial sensor source
//!
//! The trait and sample type are target independent; the ICM-42670 driver
//! needs embassy-time and the async I2C traits.

#[cfg(feature = "embedded")]
pub mod driver;
pub mod traits;

pub use traits::{ImuSample, ImuSensor, SensorError};
