//! IMU sensor trait for abstraction and testability
//!
//! This trait defines the interface the GATT core uses to pull samples,
//! allowing the ICM-42670 driver to be swapped with a mock for testing.

use core::fmt;
use core::future::Future;

/// Errors that can occur while talking to the IMU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// I2C transaction failed (NACK, arbitration loss, timeout)
    Bus,
    /// Sensor has not been configured yet
    NotReady,
    /// WHO_AM_I did not match the expected part
    InvalidDevice(u8),
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::Bus => f.write_str("i2c bus error"),
            SensorError::NotReady => f.write_str("sensor not initialised"),
            SensorError::InvalidDevice(id) => write!(f, "unexpected WHO_AM_I 0x{:02x}", id),
        }
    }
}

/// Size of a serialised sample on the wire
pub const SAMPLE_WIRE_SIZE: usize = 24;

/// One accelerometer + gyroscope reading
///
/// Acceleration is in g, angular rate in degrees per second.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImuSample {
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
}

impl ImuSample {
    /// Serialise as `[ax, ay, az, gx, gy, gz]`, each an f32 little-endian
    pub fn to_bytes(&self) -> [u8; SAMPLE_WIRE_SIZE] {
        let mut out = [0u8; SAMPLE_WIRE_SIZE];
        for (chunk, value) in out
            .chunks_exact_mut(4)
            .zip(self.accel.iter().chain(self.gyro.iter()))
        {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        out
    }
}

/// Abstract IMU interface
///
/// A sample is fetched on demand. Failures are transient: callers skip the
/// current cycle and try again on the next one.
pub trait ImuSensor {
    /// Probe and configure the sensor
    fn init(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    /// Read a fresh accel + gyro sample
    fn sample(&mut self) -> impl Future<Output = Result<ImuSample, SensorError>>;
}

#[cfg(test)]
pub mod mock {
    //! Mock IMU for testing

    use super::*;
    use core::cell::RefCell;
    use heapless::Vec;

    /// Mock IMU for unit testing
    pub struct MockImuSensor {
        /// Samples returned in FIFO order; when empty `fallback` is returned
        queue: RefCell<Vec<ImuSample, 16>>,
        /// Sample returned when the queue is drained
        fallback: ImuSample,
        /// Error to return on next sample
        next_error: RefCell<Option<SensorError>>,
        /// Number of sample() calls
        reads: RefCell<usize>,
        initialised: RefCell<bool>,
    }

    impl MockImuSensor {
        /// Create a new mock sensor
        pub fn new() -> Self {
            Self {
                queue: RefCell::new(Vec::new()),
                fallback: ImuSample {
                    accel: [0.0, 0.0, 1.0],
                    gyro: [0.0, 0.0, 0.0],
                },
                next_error: RefCell::new(None),
                reads: RefCell::new(0),
                initialised: RefCell::new(false),
            }
        }

        /// Queue a sample for the next sample() call
        pub fn queue_sample(&self, sample: ImuSample) {
            let _ = self.queue.borrow_mut().push(sample);
        }

        /// Set an error to be returned by the next sample() call
        pub fn set_next_error(&self, error: SensorError) {
            *self.next_error.borrow_mut() = Some(error);
        }

        /// Number of times the sensor was sampled
        pub fn read_count(&self) -> usize {
            *self.reads.borrow()
        }

        pub fn is_initialised(&self) -> bool {
            *self.initialised.borrow()
        }
    }

    impl Default for MockImuSensor {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ImuSensor for MockImuSensor {
        async fn init(&mut self) -> Result<(), SensorError> {
            *self.initialised.borrow_mut() = true;
            Ok(())
        }

        async fn sample(&mut self) -> Result<ImuSample, SensorError> {
            *self.reads.borrow_mut() += 1;

            if let Some(error) = self.next_error.borrow_mut().take() {
                return Err(error);
            }

            let mut queue = self.queue.borrow_mut();
            if queue.is_empty() {
                return Ok(self.fallback);
            }
            Ok(queue.remove(0))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_mock_fifo_then_fallback() {
            let mut imu = MockImuSensor::new();

            futures::executor::block_on(async {
                let first = ImuSample {
                    accel: [1.0, 2.0, 3.0],
                    gyro: [4.0, 5.0, 6.0],
                };
                imu.queue_sample(first);

                assert_eq!(imu.sample().await, Ok(first));
                assert_eq!(imu.sample().await.unwrap().accel, [0.0, 0.0, 1.0]);
                assert_eq!(imu.read_count(), 2);
            });
        }

        #[test]
        fn test_mock_error_clears() {
            let mut imu = MockImuSensor::new();

            futures::executor::block_on(async {
                imu.set_next_error(SensorError::Bus);
                assert_eq!(imu.sample().await, Err(SensorError::Bus));
                assert!(imu.sample().await.is_ok());
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_wire_layout() {
        let sample = ImuSample {
            accel: [1.0, -1.0, 0.5],
            gyro: [250.0, 0.0, -2000.0],
        };
        let bytes = sample.to_bytes();

        assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &(-1.0f32).to_le_bytes());
        assert_eq!(&bytes[8..12], &0.5f32.to_le_bytes());
        assert_eq!(&bytes[12..16], &250.0f32.to_le_bytes());
        assert_eq!(&bytes[20..24], &(-2000.0f32).to_le_bytes());
    }
}
