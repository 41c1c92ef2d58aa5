//! BLE client for the IMU GATT sensor.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::time::timeout;
use uuid::Uuid;

use crate::protocol::{
    parse_control_point_response, ControlPointResponse, ImuSample, IMU_LIVE_DATA_UUID,
    SC_CONTROL_POINT_UUID,
};

/// BLE client for the sensor.
pub struct ImuClient {
    peripheral: Peripheral,
    control_point: Characteristic,
    live_data: Characteristic,
    /// Control point indications, oldest first
    indications: Arc<Mutex<Vec<Vec<u8>>>>,
    /// Live data notifications, oldest first
    samples: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ImuClient {
    /// Scan for a device by name and connect.
    pub async fn connect_by_name(name: &str, scan_timeout: Duration) -> Result<Self> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No Bluetooth adapters found"))?;

        adapter.start_scan(ScanFilter::default()).await?;
        let peripheral = Self::find_device_by_name(&adapter, name, scan_timeout).await?;
        adapter.stop_scan().await?;

        peripheral.connect().await?;
        peripheral.discover_services().await?;

        let control_point = Self::find_characteristic(&peripheral, SC_CONTROL_POINT_UUID)?;
        let live_data = Self::find_characteristic(&peripheral, IMU_LIVE_DATA_UUID)?;

        let indications = Arc::new(Mutex::new(Vec::new()));
        let samples = Arc::new(Mutex::new(Vec::new()));

        // Indications and notifications share one stream
        let indications_clone = indications.clone();
        let samples_clone = samples.clone();
        let peripheral_clone = peripheral.clone();
        tokio::spawn(async move {
            let mut stream = match peripheral_clone.notifications().await {
                Ok(s) => s,
                Err(_) => return,
            };

            while let Some(data) = stream.next().await {
                if data.uuid == SC_CONTROL_POINT_UUID {
                    indications_clone.lock().await.push(data.value);
                } else if data.uuid == IMU_LIVE_DATA_UUID {
                    samples_clone.lock().await.push(data.value);
                }
            }
        });

        Ok(Self {
            peripheral,
            control_point,
            live_data,
            indications,
            samples,
        })
    }

    async fn find_device_by_name(
        adapter: &Adapter,
        name: &str,
        scan_timeout: Duration,
    ) -> Result<Peripheral> {
        let start = std::time::Instant::now();

        while start.elapsed() < scan_timeout {
            for peripheral in adapter.peripherals().await? {
                if let Some(props) = peripheral.properties().await? {
                    if props.local_name.as_deref() == Some(name) {
                        return Ok(peripheral);
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err(anyhow!("Device '{}' not found within timeout", name))
    }

    fn find_characteristic(peripheral: &Peripheral, uuid: Uuid) -> Result<Characteristic> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or_else(|| anyhow!("Characteristic {} not found", uuid))
    }

    /// Read any characteristic by UUID.
    pub async fn read(&self, uuid: Uuid) -> Result<Vec<u8>> {
        let characteristic = Self::find_characteristic(&self.peripheral, uuid)?;
        Ok(self.peripheral.read(&characteristic).await?)
    }

    /// Write to any characteristic by UUID, with response.
    pub async fn write(&self, uuid: Uuid, data: &[u8]) -> Result<()> {
        let characteristic = Self::find_characteristic(&self.peripheral, uuid)?;
        self.peripheral
            .write(&characteristic, data, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    pub async fn enable_control_point_indications(&self) -> Result<()> {
        self.peripheral.subscribe(&self.control_point).await?;
        Ok(())
    }

    pub async fn disable_control_point_indications(&self) -> Result<()> {
        self.peripheral.unsubscribe(&self.control_point).await?;
        Ok(())
    }

    pub async fn subscribe_live_data(&self) -> Result<()> {
        self.peripheral.subscribe(&self.live_data).await?;
        Ok(())
    }

    pub async fn unsubscribe_live_data(&self) -> Result<()> {
        self.peripheral.unsubscribe(&self.live_data).await?;
        Ok(())
    }

    /// Write a control point command and wait for its indication.
    pub async fn control_point(
        &self,
        command: &[u8],
        response_timeout: Duration,
    ) -> Result<ControlPointResponse> {
        self.indications.lock().await.clear();
        self.peripheral
            .write(&self.control_point, command, WriteType::WithResponse)
            .await?;

        let result = timeout(response_timeout, async {
            loop {
                {
                    let mut indications = self.indications.lock().await;
                    if !indications.is_empty() {
                        return indications.remove(0);
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        match result {
            Ok(data) => parse_control_point_response(&data),
            Err(_) => Err(anyhow!("Timeout waiting for control point indication")),
        }
    }

    /// Write a control point command that the device should reject.
    pub async fn control_point_expect_error(&self, command: &[u8]) -> Result<()> {
        match self
            .peripheral
            .write(&self.control_point, command, WriteType::WithResponse)
            .await
        {
            Ok(()) => Err(anyhow!("Write was accepted")),
            Err(_) => Ok(()),
        }
    }

    /// Write a control point command that the device should reject and
    /// return the error text reported by the platform.
    pub async fn control_point_error_text(&self, command: &[u8]) -> Result<String> {
        match self
            .peripheral
            .write(&self.control_point, command, WriteType::WithResponse)
            .await
        {
            Ok(()) => Err(anyhow!("Write was accepted")),
            Err(e) => Ok(e.to_string().to_lowercase()),
        }
    }

    /// Collect live data notifications for `window`.
    pub async fn collect_samples(&self, window: Duration) -> Result<Vec<ImuSample>> {
        self.samples.lock().await.clear();
        tokio::time::sleep(window).await;

        let raw: Vec<Vec<u8>> = self.samples.lock().await.drain(..).collect();
        raw.iter().map(|data| ImuSample::parse(data)).collect()
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}
