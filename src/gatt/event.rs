//! Events consumed by `SensorServer::handle_event`

use crate::gatt::buffer::AttValue;
use crate::gatt::error::AttError;
use crate::gatt::notify::TickOutcome;
use crate::gatt::table::AttributeHandle;
use crate::gatt::tracker::ConnectionId;

/// Everything the host stack and the ticker can tell the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEvent<'a> {
    Connected(ConnectionId),
    Disconnected,
    /// CCC descriptor written; `handle` may be the value or the CCCD handle
    Subscribed {
        handle: AttributeHandle,
        notify: bool,
        indicate: bool,
    },
    MtuExchanged(u16),
    Read {
        handle: AttributeHandle,
    },
    Write {
        handle: AttributeHandle,
        data: &'a [u8],
    },
    IndicationConfirmed {
        handle: AttributeHandle,
    },
    /// Notification period elapsed
    Tick,
}

/// What the host stack must do in response to an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Nothing to reply
    Handled,
    /// Accept the read with this value
    ReadValue(AttValue),
    /// Accept the write
    WriteAccepted,
    /// Reject the access with this ATT error
    Rejected(AttError),
    Ticked(TickOutcome),
}
