//! Hardware and protocol configuration constants for the ESP32-C3 with ICM-42670

/// I2C bus wiring for the on-board IMU
pub mod i2c {
    pub const SDA: u8 = 10;
    pub const SCL: u8 = 8;
    pub const FREQUENCY_KHZ: u32 = 400;
}

/// ICM-42670 configuration
pub mod imu {
    /// 7-bit I2C address (AD0 low)
    pub const ADDRESS: u8 = 0x68;

    /// Expected WHO_AM_I value
    pub const WHO_AM_I: u8 = 0x67;

    /// Accelerometer full scale in g
    pub const ACCEL_FULL_SCALE_G: u8 = 2;

    /// Gyroscope full scale in degrees per second
    pub const GYRO_FULL_SCALE_DPS: u16 = 2000;

    /// Output data rate for both accel and gyro
    pub const ODR_HZ: u16 = 400;
}

/// BLE advertising and connection limits
pub mod ble {
    /// Advertised complete local name
    pub const DEVICE_NAME: &str = "ESP32C3_IMU";

    /// Only a single peer is served at a time
    pub const CONNECTIONS_MAX: usize = 1;

    /// Signal + ATT
    pub const L2CAP_CHANNELS_MAX: usize = 2;

    /// Static random address suffix (upper bytes come from the eFuse MAC)
    pub const ADDRESS_SUFFIX: [u8; 3] = [0x1E, 0x83, 0xC3];
}

/// Device Information Service strings
pub mod device_info {
    pub const MANUFACTURER_NAME: &str = "Apache Mynewt";
    pub const MODEL_NUMBER: &str = "Mynewt CSC Sensor";
}

/// Timing
pub mod timing {
    /// Live data notification period
    pub const NOTIFY_PERIOD_MS: u64 = 100;
}

/// GATT sizing
pub mod gatt {
    /// Default ATT MTU before any exchange
    pub const DEFAULT_ATT_MTU: u16 = 23;

    /// Largest ATT MTU we will negotiate
    pub const MAX_ATT_MTU: u16 = 247;

    /// Largest attribute value handled by the core (MAX_ATT_MTU - 1)
    pub const MAX_ATTRIBUTE_VALUE: usize = 246;

    /// Attribute slots the host reserves for this table
    pub const MAX_ATTRIBUTES: usize = 24;

    /// Upper bound on characteristics across all services
    pub const MAX_CHARACTERISTICS: usize = 8;
}

/// Logging
pub mod logging {
    pub const LEVEL: log::LevelFilter = log::LevelFilter::Info;
}
