//! Binding between the trouble-host attribute server and the GATT core
//!
//! [`ServerRegistry`] answers registration from the handles the
//! `gatt_server` macro assigned. [`LinkTransport`] pushes notifications
//! directly and holds a control point indication until the write that caused
//! it has been answered.

use heapless::Vec;
use trouble_host::prelude::*;

use crate::ble::service::{ImuGattServer, CP_VALUE_MAX, INFO_STRING_MAX};
use crate::config;
use crate::gatt::buffer::AttValue;
use crate::gatt::error::{RegistrationError, TransportError};
use crate::gatt::table::{AttributeHandle, AttributeRegistry, CharacteristicHandles, Permissions};
use crate::gatt::tracker::ConnectionId;
use crate::gatt::transport::GattTransport;
use crate::gatt::uuid::{self, Uuid};
use crate::sensor::traits::SAMPLE_WIRE_SIZE;

fn handles_of<T: AsGatt>(characteristic: &Characteristic<T>) -> CharacteristicHandles {
    CharacteristicHandles {
        value: AttributeHandle(characteristic.handle),
        cccd: characteristic.cccd_handle.map(AttributeHandle),
    }
}

fn transport_error(error: Error) -> TransportError {
    match error {
        Error::OutOfMemory => TransportError::OutOfBuffers,
        Error::Disconnected => TransportError::NotConnected,
        Error::Busy => TransportError::Busy,
        _ => TransportError::Link,
    }
}

/// Registry view over the macro-built attribute table
pub struct ServerRegistry<'s, 'v> {
    server: &'s ImuGattServer<'v>,
}

impl<'s, 'v> ServerRegistry<'s, 'v> {
    pub fn new(server: &'s ImuGattServer<'v>) -> Self {
        Self { server }
    }
}

impl AttributeRegistry for ServerRegistry<'_, '_> {
    fn reserve(&mut self, attributes: usize) -> Result<(), RegistrationError> {
        if attributes > config::gatt::MAX_ATTRIBUTES {
            return Err(RegistrationError::AttributeSpaceExhausted {
                required: attributes,
                available: config::gatt::MAX_ATTRIBUTES,
            });
        }
        Ok(())
    }

    fn add_service(&mut self, service: Uuid) -> Result<AttributeHandle, RegistrationError> {
        let first_value = match service {
            uuid::CSC_SERVICE => self.server.csc.feature.handle,
            uuid::IMU_SERVICE => self.server.imu.live_data.handle,
            uuid::DEVICE_INFO_SERVICE => self.server.device_info.manufacturer_name.handle,
            other => return Err(RegistrationError::UnknownAttribute(other)),
        };
        // Service declaration, then the first characteristic declaration
        Ok(AttributeHandle(first_value - 2))
    }

    fn add_characteristic(
        &mut self,
        characteristic: Uuid,
        permissions: Permissions,
    ) -> Result<CharacteristicHandles, RegistrationError> {
        let handles = match characteristic {
            uuid::CSC_FEATURE => handles_of(&self.server.csc.feature),
            uuid::SENSOR_LOCATION => handles_of(&self.server.csc.location),
            uuid::SC_CONTROL_POINT => handles_of(&self.server.csc.control_point),
            uuid::IMU_LIVE_DATA => handles_of(&self.server.imu.live_data),
            uuid::MANUFACTURER_NAME => handles_of(&self.server.device_info.manufacturer_name),
            uuid::MODEL_NUMBER => handles_of(&self.server.device_info.model_number),
            other => return Err(RegistrationError::UnknownAttribute(other)),
        };

        if permissions.is_subscribable() != handles.cccd.is_some() {
            log::error!("GATT: CCCD mismatch for {:?}", characteristic);
            return Err(RegistrationError::UnknownAttribute(characteristic));
        }
        Ok(handles)
    }
}

/// Outbound link for one connection
pub struct LinkTransport<'a, 'stack, 'server, 'v, P: PacketPool> {
    server: &'a ImuGattServer<'v>,
    conn: &'a GattConnection<'stack, 'server, P>,
    pending: Option<(AttributeHandle, Vec<u8, CP_VALUE_MAX>)>,
}

impl<'a, 'stack, 'server, 'v, P: PacketPool> LinkTransport<'a, 'stack, 'server, 'v, P> {
    pub fn new(server: &'a ImuGattServer<'v>, conn: &'a GattConnection<'stack, 'server, P>) -> Self {
        Self {
            server,
            conn,
            pending: None,
        }
    }

    /// Send the queued control point indication, if any
    ///
    /// Returns the handle once the handshake is over, whether the peer
    /// confirmed it or the link dropped it; either way no confirmation
    /// will follow.
    pub async fn flush_indication(&mut self) -> Option<AttributeHandle> {
        let (handle, value) = self.pending.take()?;
        match self.server.csc.control_point.indicate(self.conn, &value).await {
            Ok(()) => log::debug!("CP: indication confirmed"),
            Err(e) => log::warn!("CP: indication failed: {:?}", e),
        }
        Some(handle)
    }

    /// Store a value produced by the core so the host serves it on read
    pub fn store_read_value(
        &self,
        handle: AttributeHandle,
        value: &AttValue,
    ) -> Result<(), TransportError> {
        let server = self.server;
        let result = if handle.0 == server.csc.feature.handle {
            let bytes: [u8; 2] = value.as_slice().try_into().map_err(|_| TransportError::Link)?;
            server.set(&server.csc.feature, &u16::from_le_bytes(bytes))
        } else if handle.0 == server.csc.location.handle {
            let &location = value.first().ok_or(TransportError::Link)?;
            server.set(&server.csc.location, &location)
        } else if handle.0 == server.imu.live_data.handle {
            let sample: [u8; SAMPLE_WIRE_SIZE] =
                value.as_slice().try_into().map_err(|_| TransportError::Link)?;
            server.set(&server.imu.live_data, &sample)
        } else if handle.0 == server.device_info.manufacturer_name.handle {
            server.set(&server.device_info.manufacturer_name, &info_string(value)?)
        } else if handle.0 == server.device_info.model_number.handle {
            server.set(&server.device_info.model_number, &info_string(value)?)
        } else {
            return Err(TransportError::Link);
        };
        result.map_err(transport_error)
    }
}

fn info_string(value: &AttValue) -> Result<Vec<u8, INFO_STRING_MAX>, TransportError> {
    Vec::from_slice(value).map_err(|_| TransportError::OutOfBuffers)
}

impl<P: PacketPool> GattTransport for LinkTransport<'_, '_, '_, '_, P> {
    async fn send_notification(
        &mut self,
        _connection: ConnectionId,
        handle: AttributeHandle,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        // Single connection: the id always names `self.conn`
        if handle.0 != self.server.imu.live_data.handle {
            return Err(TransportError::Link);
        }
        let sample: [u8; SAMPLE_WIRE_SIZE] =
            payload.try_into().map_err(|_| TransportError::Link)?;
        self.server
            .imu
            .live_data
            .notify(self.conn, &sample)
            .await
            .map_err(transport_error)
    }

    async fn send_indication(
        &mut self,
        _connection: ConnectionId,
        handle: AttributeHandle,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        if handle.0 != self.server.csc.control_point.handle {
            return Err(TransportError::Link);
        }
        if self.pending.is_some() {
            return Err(TransportError::Busy);
        }
        let value = Vec::from_slice(payload).map_err(|_| TransportError::OutOfBuffers)?;
        self.pending = Some((handle, value));
        Ok(())
    }
}
