//! BLE host task
//!
//! Owns the trouble-host stack and the [`SensorServer`]. Each GATT event and
//! each notification tick is translated into a [`ServerEvent`]; the returned
//! [`EventOutcome`] decides how the request is answered.

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Ticker};
use heapless::Vec;
use trouble_host::prelude::*;

use crate::ble::{ImuGattServer, LinkTransport, ServerRegistry};
use crate::config;
use crate::gatt::{
    AttError, AttributeHandle, ConnectionId, EventOutcome, SensorServer, ServerConfig, ServerEvent,
};
use crate::sensor::ImuSensor;

/// CCC descriptor bits
const CCC_NOTIFY: u16 = 0x0001;
const CCC_INDICATE: u16 = 0x0002;

fn att_error_code(error: AttError) -> AttErrorCode {
    match error {
        AttError::InvalidHandle => AttErrorCode::INVALID_HANDLE,
        AttError::ReadNotPermitted => AttErrorCode::READ_NOT_PERMITTED,
        AttError::WriteNotPermitted => AttErrorCode::WRITE_NOT_PERMITTED,
        AttError::InvalidAttributeValueLength => AttErrorCode::INVALID_ATTRIBUTE_VALUE_LENGTH,
        AttError::InsufficientResources => AttErrorCode::INSUFFICIENT_RESOURCES,
        AttError::Unlikely => AttErrorCode::UNLIKELY_ERROR,
        // No raw constructor for 0x80/0x81; see AttError::common_profile_code
        AttError::ProcedureAlreadyInProgress => AttErrorCode::PROCEDURE_ALREADY_IN_PROGRESS,
        AttError::CccImproperlyConfigured => AttErrorCode::CCCD_IMPROPERLY_CONFIGURED,
    }
}

/// Load the constant characteristic values into the host table
fn load_static_values(server: &ImuGattServer<'_>) -> Result<(), Error> {
    let manufacturer: Vec<u8, { crate::ble::service::INFO_STRING_MAX }> =
        Vec::from_slice(config::device_info::MANUFACTURER_NAME.as_bytes())
            .map_err(|_| Error::InsufficientSpace)?;
    let model: Vec<u8, { crate::ble::service::INFO_STRING_MAX }> =
        Vec::from_slice(config::device_info::MODEL_NUMBER.as_bytes())
            .map_err(|_| Error::InsufficientSpace)?;
    server.set(&server.device_info.manufacturer_name, &manufacturer)?;
    server.set(&server.device_info.model_number, &model)
}

/// Main BLE task
///
/// 1. Builds the host stack and the attribute server
/// 2. Registers the GATT core against the server's handles
/// 3. Advertises as `config::ble::DEVICE_NAME`, one connection at a time
/// 4. Serves GATT requests and the live data ticker until disconnect
pub async fn ble_task<C: Controller, S: ImuSensor>(controller: C, sensor: S, device_id: [u8; 3]) {
    let mut resources: HostResources<
        DefaultPacketPool,
        { config::ble::CONNECTIONS_MAX },
        { config::ble::L2CAP_CHANNELS_MAX },
    > = HostResources::new();

    let suffix = config::ble::ADDRESS_SUFFIX;
    let stack = trouble_host::new(controller, &mut resources).set_random_address(Address::random([
        device_id[0],
        device_id[1],
        device_id[2],
        suffix[0],
        suffix[1],
        suffix[2],
    ]));

    let Host {
        mut peripheral,
        mut runner,
        ..
    } = stack.build();

    let gap = GapConfig::Peripheral(PeripheralConfig {
        name: config::ble::DEVICE_NAME,
        appearance: &appearance::UNKNOWN,
    });
    let server = match ImuGattServer::new_with_config(gap) {
        Ok(s) => s,
        Err(e) => {
            log::error!("BLE: attribute server setup failed: {:?}", e);
            return;
        }
    };
    if let Err(e) = load_static_values(&server) {
        log::error!("BLE: loading device information failed: {:?}", e);
        return;
    }

    let server_config = ServerConfig::default();
    let mut core = match SensorServer::register(&mut ServerRegistry::new(&server), sensor, server_config) {
        Ok(core) => core,
        Err(e) => {
            log::error!("GATT: registration failed: {}", e);
            return;
        }
    };

    let runner_task = async {
        if let Err(e) = runner.run().await {
            log::error!("BLE: runner stopped: {:?}", e);
        }
    };

    let peripheral_task = async {
        let mut adv_data = [0u8; 31];
        let len = match AdStructure::encode_slice(
            &[
                AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
                AdStructure::ServiceUuids16(&[0x1816u16.to_le_bytes()]),
                AdStructure::CompleteLocalName(config::ble::DEVICE_NAME.as_bytes()),
            ],
            &mut adv_data,
        ) {
            Ok(l) => l,
            Err(e) => {
                log::error!("BLE: advertising data does not fit: {:?}", e);
                return;
            }
        };

        loop {
            log::info!("BLE: advertising as '{}'", config::ble::DEVICE_NAME);
            let advertiser = match peripheral
                .advertise(
                    &Default::default(),
                    Advertisement::ConnectableScannableUndirected {
                        adv_data: &adv_data[..len],
                        scan_data: &[],
                    },
                )
                .await
            {
                Ok(a) => a,
                Err(e) => {
                    log::warn!("BLE: advertise failed: {:?}", e);
                    continue;
                }
            };

            let conn = match advertiser.accept().await {
                Ok(acceptor) => match acceptor.with_attribute_server(&server) {
                    Ok(c) => c,
                    Err(e) => {
                        log::warn!("BLE: attaching attribute server failed: {:?}", e);
                        continue;
                    }
                },
                Err(e) => {
                    log::warn!("BLE: accept failed: {:?}", e);
                    continue;
                }
            };

            serve_connection(&server, &conn, &mut core, server_config.notify_period_ms).await;
        }
    };

    select(runner_task, peripheral_task).await;
}

/// Serve one connection until the peer disconnects
async fn serve_connection<P: PacketPool, S: ImuSensor>(
    server: &ImuGattServer<'_>,
    conn: &GattConnection<'_, '_, P>,
    core: &mut SensorServer<S>,
    notify_period_ms: u64,
) {
    let mut transport = LinkTransport::new(server, conn);
    let id = ConnectionId(conn.raw().handle().raw());
    core.handle_event(ServerEvent::Connected(id), &mut transport).await;

    let mut mtu = config::gatt::DEFAULT_ATT_MTU;
    let mut ticker = Ticker::every(Duration::from_millis(notify_period_ms));

    loop {
        let next = select(conn.next(), ticker.next()).await;

        // The host answers MTU exchanges itself; pick the result up before
        // sizing any indication or notification
        let current = conn.raw().att_mtu();
        if current != mtu {
            mtu = current;
            core.handle_event(ServerEvent::MtuExchanged(mtu), &mut transport).await;
        }

        match next {
            Either::First(GattConnectionEvent::Disconnected { reason }) => {
                log::info!("BLE: link closed ({:?})", reason);
                core.handle_event(ServerEvent::Disconnected, &mut transport).await;
                break;
            }
            Either::First(GattConnectionEvent::Gatt { event }) => {
                let reply = match &event {
                    GattEvent::Read(read) => {
                        let handle = AttributeHandle(read.handle());
                        match core.handle_event(ServerEvent::Read { handle }, &mut transport).await {
                            EventOutcome::ReadValue(value) => transport
                                .store_read_value(handle, &value)
                                .map_err(|e| {
                                    log::warn!("BLE: storing read value failed: {}", e);
                                    AttError::Unlikely
                                }),
                            EventOutcome::Rejected(e) => Err(e),
                            _ => Ok(()),
                        }
                    }
                    GattEvent::Write(write) => {
                        let handle = AttributeHandle(write.handle());
                        let is_cccd = core
                            .table()
                            .lookup_subscription(handle)
                            .is_some_and(|entry| entry.handles.cccd == Some(handle));

                        let event = if is_cccd {
                            let bits = match write.data() {
                                [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
                                [lo] => u16::from(*lo),
                                [] => 0,
                            };
                            ServerEvent::Subscribed {
                                handle,
                                notify: bits & CCC_NOTIFY != 0,
                                indicate: bits & CCC_INDICATE != 0,
                            }
                        } else {
                            ServerEvent::Write {
                                handle,
                                data: write.data(),
                            }
                        };

                        match core.handle_event(event, &mut transport).await {
                            EventOutcome::Rejected(e) => Err(e),
                            _ => Ok(()),
                        }
                    }
                    _ => Ok(()),
                };

                let reply = match reply {
                    Ok(()) => event.accept(),
                    Err(e) => {
                        log::debug!("BLE: rejecting access, {:?}: {}", e.kind(), e);
                        event.reject(att_error_code(e))
                    }
                };
                match reply {
                    Ok(reply) => reply.send().await,
                    Err(e) => log::warn!("BLE: error sending response: {:?}", e),
                }

                // Indication goes out only after the write response
                if let Some(handle) = transport.flush_indication().await {
                    core.handle_event(ServerEvent::IndicationConfirmed { handle }, &mut transport)
                        .await;
                }
            }
            Either::First(_) => {}
            Either::Second(()) => {
                core.handle_event(ServerEvent::Tick, &mut transport).await;
            }
        }
    }
}
