//! Connection and subscription tracker
//!
//! Holds the single active connection, the negotiated ATT MTU and the peer's
//! CCC state for the two subscribable characteristics. Everything resets on
//! disconnect so a new peer never inherits the previous one's subscriptions.

use crate::config::gatt::{DEFAULT_ATT_MTU, MAX_ATT_MTU};
use crate::gatt::table::Characteristic;

/// Host-assigned connection identifier
///
/// Zero is a valid id; absence of a connection is `None` in the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionId(pub u16);

#[derive(Debug)]
pub struct LinkTracker {
    connection: Option<ConnectionId>,
    mtu: u16,
    live_data_notify: bool,
    control_point_indicate: bool,
}

impl LinkTracker {
    pub const fn new() -> Self {
        Self {
            connection: None,
            mtu: DEFAULT_ATT_MTU,
            live_data_notify: false,
            control_point_indicate: false,
        }
    }

    pub fn on_connect(&mut self, id: ConnectionId) {
        if let Some(previous) = self.connection {
            log::warn!(
                "BLE: connection {} replaces stale connection {}",
                id.0,
                previous.0
            );
        }
        *self = Self::new();
        self.connection = Some(id);
    }

    /// Clear the connection and every per-peer flag
    pub fn on_disconnect(&mut self) {
        *self = Self::new();
    }

    /// Apply a CCC write for `kind`
    ///
    /// Only the flag matching the characteristic's property is honoured;
    /// enabling indications on live data or notifications on the control
    /// point leaves the tracked state unsubscribed.
    pub fn on_subscribe(&mut self, kind: Characteristic, notify: bool, indicate: bool) {
        match kind {
            Characteristic::LiveData => self.live_data_notify = notify,
            Characteristic::ControlPoint => self.control_point_indicate = indicate,
            Characteristic::CscFeature
            | Characteristic::SensorLocation
            | Characteristic::ManufacturerName
            | Characteristic::ModelNumber => {
                log::warn!("BLE: subscription to non-subscribable {:?} ignored", kind);
            }
        }
    }

    /// Record the negotiated MTU, clamped to what this firmware supports
    pub fn on_mtu(&mut self, mtu: u16) {
        self.mtu = mtu.clamp(DEFAULT_ATT_MTU, MAX_ATT_MTU);
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    pub fn live_data_subscribed(&self) -> bool {
        self.live_data_notify
    }

    pub fn control_point_indications(&self) -> bool {
        self.control_point_indicate
    }

    /// Largest indication/notification payload (ATT header is 3 bytes)
    pub fn indication_capacity(&self) -> usize {
        usize::from(self.mtu) - 3
    }
}

impl Default for LinkTracker {
    fn default() -> Self {
        Self::new()
    }
}
