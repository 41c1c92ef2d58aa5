//! Periodic live data notifications
//!
//! Each tick either does nothing (no peer or no subscription) or samples the
//! IMU once and pushes one notification. Failures skip the cycle; the caller's
//! ticker keeps running regardless.
//!
//! A sample is only sent whole: until the peer raises the MTU above the
//! default, the 24-byte payload does not fit and every cycle is skipped.

use crate::gatt::table::AttributeHandle;
use crate::gatt::tracker::LinkTracker;
use crate::gatt::transport::GattTransport;
use crate::sensor::traits::SAMPLE_WIRE_SIZE;
use crate::sensor::ImuSensor;

/// Result of one pipeline tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    NotConnected,
    NotSubscribed,
    /// Negotiated MTU cannot carry a whole sample
    PayloadTooLarge,
    Sent,
    SensorFailed,
    SendFailed,
}

/// Running counters, reset only at boot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub sent: u32,
    pub skipped: u32,
    pub oversized: u32,
    pub sensor_errors: u32,
    pub transport_errors: u32,
}

#[derive(Debug)]
pub struct LiveDataPipeline {
    handle: AttributeHandle,
    stats: PipelineStats,
}

impl LiveDataPipeline {
    pub fn new(handle: AttributeHandle) -> Self {
        Self {
            handle,
            stats: PipelineStats::default(),
        }
    }

    pub async fn tick<S: ImuSensor, T: GattTransport>(
        &mut self,
        tracker: &LinkTracker,
        sensor: &mut S,
        transport: &mut T,
    ) -> TickOutcome {
        let Some(connection) = tracker.connection() else {
            self.stats.skipped = self.stats.skipped.wrapping_add(1);
            return TickOutcome::NotConnected;
        };
        if !tracker.live_data_subscribed() {
            self.stats.skipped = self.stats.skipped.wrapping_add(1);
            return TickOutcome::NotSubscribed;
        }
        if SAMPLE_WIRE_SIZE > tracker.indication_capacity() {
            log::debug!(
                "BLE: live data needs {} bytes, MTU {} allows {}",
                SAMPLE_WIRE_SIZE,
                tracker.mtu(),
                tracker.indication_capacity()
            );
            self.stats.oversized = self.stats.oversized.wrapping_add(1);
            return TickOutcome::PayloadTooLarge;
        }

        let sample = match sensor.sample().await {
            Ok(sample) => sample,
            Err(e) => {
                log::warn!("IMU: sample failed, skipping cycle: {}", e);
                self.stats.sensor_errors = self.stats.sensor_errors.wrapping_add(1);
                return TickOutcome::SensorFailed;
            }
        };

        match transport
            .send_notification(connection, self.handle, &sample.to_bytes())
            .await
        {
            Ok(()) => {
                log::trace!(
                    "BLE: notified a=[{:.3}, {:.3}, {:.3}] g=[{:.2}, {:.2}, {:.2}]",
                    sample.accel[0],
                    sample.accel[1],
                    sample.accel[2],
                    sample.gyro[0],
                    sample.gyro[1],
                    sample.gyro[2]
                );
                self.stats.sent = self.stats.sent.wrapping_add(1);
                TickOutcome::Sent
            }
            Err(e) => {
                log::warn!("BLE: live data notification dropped: {}", e);
                self.stats.transport_errors = self.stats.transport_errors.wrapping_add(1);
                TickOutcome::SendFailed
            }
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatt::error::TransportError;
    use crate::gatt::table::Characteristic;
    use crate::gatt::tracker::ConnectionId;
    use crate::gatt::transport::mock::MockTransport;
    use crate::sensor::traits::mock::MockImuSensor;
    use crate::sensor::{ImuSample, SensorError};
    use futures::executor::block_on;

    const HANDLE: AttributeHandle = AttributeHandle(12);

    fn subscribed() -> LinkTracker {
        let mut tracker = LinkTracker::new();
        tracker.on_connect(ConnectionId(1));
        tracker.on_subscribe(Characteristic::LiveData, true, false);
        tracker.on_mtu(185);
        tracker
    }

    #[test]
    fn test_unsubscribed_never_sends() {
        let mut pipeline = LiveDataPipeline::new(HANDLE);
        let mut tracker = LinkTracker::new();
        tracker.on_connect(ConnectionId(1));
        let mut imu = MockImuSensor::new();
        let mut transport = MockTransport::new();

        block_on(async {
            for _ in 0..10 {
                let outcome = pipeline.tick(&tracker, &mut imu, &mut transport).await;
                assert_eq!(outcome, TickOutcome::NotSubscribed);
            }
        });

        assert_eq!(transport.notifications(), 0);
        assert_eq!(imu.read_count(), 0);
        assert_eq!(pipeline.stats().skipped, 10);
    }

    #[test]
    fn test_disconnected_never_sends() {
        let mut pipeline = LiveDataPipeline::new(HANDLE);
        let tracker = LinkTracker::new();
        let mut imu = MockImuSensor::new();
        let mut transport = MockTransport::new();

        let outcome = block_on(pipeline.tick(&tracker, &mut imu, &mut transport));
        assert_eq!(outcome, TickOutcome::NotConnected);
        assert_eq!(transport.notifications(), 0);
    }

    #[test]
    fn test_one_send_per_tick() {
        let mut pipeline = LiveDataPipeline::new(HANDLE);
        let tracker = subscribed();
        let mut imu = MockImuSensor::new();
        let mut transport = MockTransport::new();

        block_on(async {
            for _ in 0..5 {
                let outcome = pipeline.tick(&tracker, &mut imu, &mut transport).await;
                assert_eq!(outcome, TickOutcome::Sent);
            }
        });

        assert_eq!(transport.notifications(), 5);
        assert_eq!(pipeline.stats().sent, 5);
    }

    #[test]
    fn test_default_mtu_skips_oversized_sample() {
        let mut pipeline = LiveDataPipeline::new(HANDLE);
        let mut tracker = LinkTracker::new();
        tracker.on_connect(ConnectionId(1));
        tracker.on_subscribe(Characteristic::LiveData, true, false);
        let mut imu = MockImuSensor::new();
        let mut transport = MockTransport::new();

        let outcome = block_on(pipeline.tick(&tracker, &mut imu, &mut transport));

        assert_eq!(tracker.indication_capacity(), 20);
        assert_eq!(outcome, TickOutcome::PayloadTooLarge);
        assert_eq!(transport.notifications(), 0);
        assert_eq!(imu.read_count(), 0);
        assert_eq!(pipeline.stats().oversized, 1);
    }

    #[test]
    fn test_smallest_fitting_mtu_sends_whole_sample() {
        let mut pipeline = LiveDataPipeline::new(HANDLE);
        let mut tracker = LinkTracker::new();
        tracker.on_connect(ConnectionId(1));
        tracker.on_subscribe(Characteristic::LiveData, true, false);
        let mut imu = MockImuSensor::new();
        let mut transport = MockTransport::new();

        tracker.on_mtu(26);
        let outcome = block_on(pipeline.tick(&tracker, &mut imu, &mut transport));
        assert_eq!(outcome, TickOutcome::PayloadTooLarge);

        tracker.on_mtu(27);
        let outcome = block_on(pipeline.tick(&tracker, &mut imu, &mut transport));
        assert_eq!(outcome, TickOutcome::Sent);
        let sent = transport.last().unwrap();
        assert_eq!(sent.payload.len(), SAMPLE_WIRE_SIZE);
        assert!(sent.payload.len() <= tracker.indication_capacity());
    }

    #[test]
    fn test_payload_is_latest_sample() {
        let mut pipeline = LiveDataPipeline::new(HANDLE);
        let tracker = subscribed();
        let mut imu = MockImuSensor::new();
        let mut transport = MockTransport::new();
        let sample = ImuSample {
            accel: [0.1, 0.2, 0.98],
            gyro: [1.5, -3.0, 0.0],
        };
        imu.queue_sample(sample);

        block_on(pipeline.tick(&tracker, &mut imu, &mut transport));

        let sent = transport.last().unwrap();
        assert_eq!(sent.handle, HANDLE);
        assert_eq!(sent.connection, ConnectionId(1));
        assert_eq!(sent.payload.as_slice(), &sample.to_bytes());
    }

    #[test]
    fn test_sensor_failure_skips_cycle() {
        let mut pipeline = LiveDataPipeline::new(HANDLE);
        let tracker = subscribed();
        let mut imu = MockImuSensor::new();
        let mut transport = MockTransport::new();
        imu.set_next_error(SensorError::Bus);

        block_on(async {
            let outcome = pipeline.tick(&tracker, &mut imu, &mut transport).await;
            assert_eq!(outcome, TickOutcome::SensorFailed);
            let outcome = pipeline.tick(&tracker, &mut imu, &mut transport).await;
            assert_eq!(outcome, TickOutcome::Sent);
        });

        assert_eq!(transport.notifications(), 1);
        assert_eq!(pipeline.stats().sensor_errors, 1);
    }

    #[test]
    fn test_transport_failure_skips_cycle() {
        let mut pipeline = LiveDataPipeline::new(HANDLE);
        let tracker = subscribed();
        let mut imu = MockImuSensor::new();
        let mut transport = MockTransport::new();
        transport.set_next_error(TransportError::OutOfBuffers);

        block_on(async {
            let outcome = pipeline.tick(&tracker, &mut imu, &mut transport).await;
            assert_eq!(outcome, TickOutcome::SendFailed);
            let outcome = pipeline.tick(&tracker, &mut imu, &mut transport).await;
            assert_eq!(outcome, TickOutcome::Sent);
        });

        let stats = pipeline.stats();
        assert_eq!(stats.transport_errors, 1);
        assert_eq!(stats.sent, 1);
    }
}
