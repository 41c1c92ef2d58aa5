//! Embassy tasks

pub mod ble;

pub use ble::ble_task;
