//! ICM-42670-P 6-axis IMU driver
//!
//! Implements the ImuSensor trait over any async I2C bus for use with Embassy.

use crate::config::imu;
use crate::sensor::traits::{ImuSample, ImuSensor, SensorError};
use embassy_time::{Duration, Timer};
use embedded_hal_async::i2c::I2c;

/// ICM-42670 register addresses (user bank 0)
mod reg {
    pub const SIGNAL_PATH_RESET: u8 = 0x02;
    pub const ACCEL_DATA_X1: u8 = 0x0B;
    pub const PWR_MGMT0: u8 = 0x1F;
    pub const GYRO_CONFIG0: u8 = 0x20;
    pub const ACCEL_CONFIG0: u8 = 0x21;
    pub const WHO_AM_I: u8 = 0x75;
}

/// Field encodings
mod bits {
    pub const SOFT_RESET_DEVICE_CONFIG: u8 = 0x10;

    /// Gyro and accel both in low-noise mode
    pub const PWR_LOW_NOISE: u8 = 0x0F;

    /// ACCEL_UI_FS_SEL = +-2 g
    pub const ACCEL_FS_2G: u8 = 0b11 << 5;
    /// GYRO_UI_FS_SEL = +-2000 dps
    pub const GYRO_FS_2000DPS: u8 = 0b00 << 5;

    /// 400 Hz output data rate (shared accel/gyro encoding)
    pub const ODR_400HZ: u8 = 0b0111;
}

/// LSB per g at +-2 g
const ACCEL_SENSITIVITY: f32 = 16384.0;

/// LSB per dps at +-2000 dps
const GYRO_SENSITIVITY: f32 = 16.4;

/// ICM-42670 driver
///
/// The sample burst covers ACCEL_DATA_X1..GYRO_DATA_Z0, big-endian i16 pairs.
pub struct Icm42670<I> {
    i2c: I,
    address: u8,
    initialised: bool,
}

impl<I: I2c> Icm42670<I> {
    /// Create a new driver at the default address
    pub fn new(i2c: I) -> Self {
        Self {
            i2c,
            address: imu::ADDRESS,
            initialised: false,
        }
    }

    async fn write_register(&mut self, register: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &[register, value])
            .await
            .map_err(bus_error)
    }

    async fn read_registers(&mut self, register: u8, buf: &mut [u8]) -> Result<(), SensorError> {
        self.i2c
            .write_read(self.address, &[register], buf)
            .await
            .map_err(bus_error)
    }

    async fn who_am_i(&mut self) -> Result<u8, SensorError> {
        let mut id = [0u8; 1];
        self.read_registers(reg::WHO_AM_I, &mut id).await?;
        Ok(id[0])
    }

    async fn soft_reset(&mut self) -> Result<(), SensorError> {
        self.write_register(reg::SIGNAL_PATH_RESET, bits::SOFT_RESET_DEVICE_CONFIG)
            .await?;
        // Datasheet: wait 1 ms after soft reset
        Timer::after(Duration::from_millis(2)).await;
        Ok(())
    }
}

fn bus_error<E: embedded_hal::i2c::Error>(error: E) -> SensorError {
    log::debug!("IMU: i2c {:?}", error.kind());
    SensorError::Bus
}

fn be_i16(bytes: &[u8]) -> i16 {
    i16::from_be_bytes([bytes[0], bytes[1]])
}

/// Convert a 12-byte accel + gyro burst into engineering units
fn decode_burst(raw: &[u8; 12]) -> ImuSample {
    let mut sample = ImuSample::default();
    for axis in 0..3 {
        sample.accel[axis] = be_i16(&raw[axis * 2..]) as f32 / ACCEL_SENSITIVITY;
        sample.gyro[axis] = be_i16(&raw[6 + axis * 2..]) as f32 / GYRO_SENSITIVITY;
    }
    sample
}

impl<I: I2c> ImuSensor for Icm42670<I> {
    async fn init(&mut self) -> Result<(), SensorError> {
        let id = self.who_am_i().await?;
        if id != imu::WHO_AM_I {
            log::error!("IMU: WHO_AM_I mismatch (0x{:02x})", id);
            return Err(SensorError::InvalidDevice(id));
        }

        self.soft_reset().await?;

        self.write_register(reg::ACCEL_CONFIG0, bits::ACCEL_FS_2G | bits::ODR_400HZ)
            .await?;
        self.write_register(reg::GYRO_CONFIG0, bits::GYRO_FS_2000DPS | bits::ODR_400HZ)
            .await?;
        self.write_register(reg::PWR_MGMT0, bits::PWR_LOW_NOISE).await?;

        // Gyro needs 45 ms after leaving off mode before data is valid
        Timer::after(Duration::from_millis(45)).await;

        self.initialised = true;
        log::info!(
            "IMU: ICM-42670 ready (+-{} g, +-{} dps, {} Hz)",
            imu::ACCEL_FULL_SCALE_G,
            imu::GYRO_FULL_SCALE_DPS,
            imu::ODR_HZ
        );
        Ok(())
    }

    async fn sample(&mut self) -> Result<ImuSample, SensorError> {
        if !self.initialised {
            return Err(SensorError::NotReady);
        }

        let mut raw = [0u8; 12];
        self.read_registers(reg::ACCEL_DATA_X1, &mut raw).await?;
        Ok(decode_burst(&raw))
    }
}
