//! Attribute server context and event dispatch
//!
//! `SensorServer` owns every piece of mutable state: the registered table,
//! the link tracker, the control point and the notification pipeline. The
//! BLE task feeds it one [`ServerEvent`] at a time and acts on the returned
//! [`EventOutcome`], so no locking is needed.
//!
//! Reads of the live data characteristic (when enabled in [`ServerConfig`])
//! take a fresh sample from the IMU rather than returning a cached value.

use crate::config::gatt::MAX_ATTRIBUTE_VALUE;
use crate::config::{device_info, timing};
use crate::gatt::buffer::{AttBuffer, AttValue};
use crate::gatt::control_point::{ControlPoint, SensorConfig, CSC_FEATURES};
use crate::gatt::error::{AttError, RegistrationError};
use crate::gatt::event::{EventOutcome, ServerEvent};
use crate::gatt::notify::{LiveDataPipeline, PipelineStats};
use crate::gatt::table::{
    self, AttributeHandle, AttributeRegistry, AttributeTable, Characteristic, Entry, Permissions,
};
use crate::gatt::tracker::LinkTracker;
use crate::gatt::transport::GattTransport;
use crate::gatt::uuid;
use crate::sensor::ImuSensor;

/// Runtime server options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Also grant read on the live data characteristic
    pub live_data_readable: bool,
    /// CSC feature bitmask reported and enforced by the control point
    pub features: u16,
    pub notify_period_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            live_data_readable: false,
            features: CSC_FEATURES,
            notify_period_ms: timing::NOTIFY_PERIOD_MS,
        }
    }
}

pub struct SensorServer<S: ImuSensor> {
    table: AttributeTable,
    tracker: LinkTracker,
    control_point: ControlPoint,
    pipeline: LiveDataPipeline,
    sensor: S,
    config: ServerConfig,
}

impl<S: ImuSensor> SensorServer<S> {
    /// Register the attribute table with the host and build the server
    pub fn register<R: AttributeRegistry>(
        registry: &mut R,
        sensor: S,
        config: ServerConfig,
    ) -> Result<Self, RegistrationError> {
        let table = AttributeTable::register(registry, &table::services(config.live_data_readable))?;
        let live_data = table
            .value_handle(Characteristic::LiveData)
            .ok_or(RegistrationError::UnknownAttribute(uuid::IMU_LIVE_DATA))?;

        log::info!(
            "GATT: {} characteristics registered, live data at handle {}",
            table.iter().count(),
            live_data.0
        );

        Ok(Self {
            table,
            tracker: LinkTracker::new(),
            control_point: ControlPoint::new(config.features),
            pipeline: LiveDataPipeline::new(live_data),
            sensor,
            config,
        })
    }

    /// Apply one event and tell the caller how to answer it
    pub async fn handle_event<T: GattTransport>(
        &mut self,
        event: ServerEvent<'_>,
        transport: &mut T,
    ) -> EventOutcome {
        match event {
            ServerEvent::Connected(id) => {
                log::info!("BLE: connected ({})", id.0);
                self.tracker.on_connect(id);
                self.control_point.reset();
                EventOutcome::Handled
            }
            ServerEvent::Disconnected => {
                log::info!("BLE: disconnected, stats {:?}", self.pipeline.stats());
                self.tracker.on_disconnect();
                self.control_point.reset();
                EventOutcome::Handled
            }
            ServerEvent::Subscribed {
                handle,
                notify,
                indicate,
            } => {
                match self.table.lookup_subscription(handle) {
                    Some(entry) => {
                        log::info!(
                            "BLE: {:?} subscription notify={} indicate={}",
                            entry.kind,
                            notify,
                            indicate
                        );
                        self.tracker.on_subscribe(entry.kind, notify, indicate);
                    }
                    None => log::warn!("BLE: subscription for unknown handle {}", handle.0),
                }
                EventOutcome::Handled
            }
            ServerEvent::MtuExchanged(mtu) => {
                self.tracker.on_mtu(mtu);
                log::debug!("BLE: ATT MTU {}", self.tracker.mtu());
                EventOutcome::Handled
            }
            ServerEvent::Read { handle } => match self.on_read(handle).await {
                Ok(value) => EventOutcome::ReadValue(value),
                Err(e) => EventOutcome::Rejected(e),
            },
            ServerEvent::Write { handle, data } => match self.on_write(handle, data, transport).await {
                Ok(()) => EventOutcome::WriteAccepted,
                Err(e) => EventOutcome::Rejected(e),
            },
            ServerEvent::IndicationConfirmed { handle } => {
                if self.table.value_handle(Characteristic::ControlPoint) == Some(handle) {
                    self.control_point.indication_confirmed();
                }
                EventOutcome::Handled
            }
            ServerEvent::Tick => {
                let outcome = self
                    .pipeline
                    .tick(&self.tracker, &mut self.sensor, transport)
                    .await;
                EventOutcome::Ticked(outcome)
            }
        }
    }

    async fn on_read(&mut self, handle: AttributeHandle) -> Result<AttValue, AttError> {
        let entry = *self.table.lookup(handle).ok_or(AttError::InvalidHandle)?;
        if !entry.permissions.contains(Permissions::READ) {
            log::warn!("BLE: read of {:?} not permitted", entry.kind);
            return Err(AttError::ReadNotPermitted);
        }

        let mut buf = AttBuffer::with_limit(MAX_ATTRIBUTE_VALUE);
        match entry.kind {
            Characteristic::CscFeature => buf.append(&self.config.features.to_le_bytes())?,
            Characteristic::SensorLocation => {
                buf.push(self.control_point.config().location.to_byte())?
            }
            Characteristic::ControlPoint => return Err(AttError::ReadNotPermitted),
            Characteristic::LiveData => {
                let sample = self.sensor.sample().await.map_err(|e| {
                    log::warn!("IMU: sample for read failed: {}", e);
                    AttError::Unlikely
                })?;
                buf.append(&sample.to_bytes())?
            }
            Characteristic::ManufacturerName => {
                buf.append(device_info::MANUFACTURER_NAME.as_bytes())?
            }
            Characteristic::ModelNumber => buf.append(device_info::MODEL_NUMBER.as_bytes())?,
        }
        Ok(buf.into_value())
    }

    async fn on_write<T: GattTransport>(
        &mut self,
        handle: AttributeHandle,
        data: &[u8],
        transport: &mut T,
    ) -> Result<(), AttError> {
        let entry: Entry = *self.table.lookup(handle).ok_or(AttError::InvalidHandle)?;
        if !entry.permissions.contains(Permissions::WRITE) {
            log::warn!("BLE: write to {:?} not permitted", entry.kind);
            return Err(AttError::WriteNotPermitted);
        }

        match entry.kind {
            Characteristic::ControlPoint => {
                let connection = self.tracker.connection().ok_or(AttError::Unlikely)?;
                let response = self.control_point.process(
                    self.tracker.control_point_indications(),
                    data,
                    self.tracker.indication_capacity(),
                )?;

                // The configuration change is already committed; a failed
                // indication is still reported to the writer.
                transport
                    .send_indication(connection, entry.handles.value, response.as_slice())
                    .await
                    .map_err(|e| {
                        log::error!("CP: indication failed: {}", e);
                        AttError::from(e)
                    })?;
                self.control_point.indication_sent();
                Ok(())
            }
            Characteristic::CscFeature
            | Characteristic::SensorLocation
            | Characteristic::LiveData
            | Characteristic::ManufacturerName
            | Characteristic::ModelNumber => Err(AttError::WriteNotPermitted),
        }
    }

    pub fn table(&self) -> &AttributeTable {
        &self.table
    }

    pub fn tracker(&self) -> &LinkTracker {
        &self.tracker
    }

    pub fn control_point(&self) -> &ControlPoint {
        &self.control_point
    }

    pub fn sensor_config(&self) -> &SensorConfig {
        self.control_point.config()
    }

    pub fn stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }
}
