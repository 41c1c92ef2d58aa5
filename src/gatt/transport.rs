//! Outbound half of the host stack boundary
//!
//! The server pushes values through this trait and never waits for the link
//! to drain. The trouble-host binding lives in `ble::link`.

use crate::gatt::error::TransportError;
use crate::gatt::table::AttributeHandle;
use crate::gatt::tracker::ConnectionId;
use core::future::Future;

pub trait GattTransport {
    /// Push an unconfirmed notification
    fn send_notification(
        &mut self,
        connection: ConnectionId,
        handle: AttributeHandle,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>>;

    /// Push a confirmed indication
    ///
    /// Completion is reported later through `ServerEvent::IndicationConfirmed`.
    fn send_indication(
        &mut self,
        connection: ConnectionId,
        handle: AttributeHandle,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>>;
}

#[cfg(test)]
pub mod mock {
    //! Recording transport for testing

    use super::*;
    use crate::config::gatt::MAX_ATTRIBUTE_VALUE;
    use core::cell::RefCell;
    use heapless::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SendKind {
        Notification,
        Indication,
    }

    #[derive(Debug, Clone)]
    pub struct Sent {
        pub kind: SendKind,
        pub connection: ConnectionId,
        pub handle: AttributeHandle,
        pub payload: Vec<u8, MAX_ATTRIBUTE_VALUE>,
    }

    pub struct MockTransport {
        history: RefCell<Vec<Sent, 32>>,
        next_error: RefCell<Option<TransportError>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                history: RefCell::new(Vec::new()),
                next_error: RefCell::new(None),
            }
        }

        /// Fail the next send of either kind
        pub fn set_next_error(&self, error: TransportError) {
            *self.next_error.borrow_mut() = Some(error);
        }

        pub fn history(&self) -> Vec<Sent, 32> {
            self.history.borrow().clone()
        }

        pub fn notifications(&self) -> usize {
            self.count(SendKind::Notification)
        }

        pub fn indications(&self) -> usize {
            self.count(SendKind::Indication)
        }

        pub fn last(&self) -> Option<Sent> {
            self.history.borrow().last().cloned()
        }

        fn count(&self, kind: SendKind) -> usize {
            self.history.borrow().iter().filter(|s| s.kind == kind).count()
        }

        fn record(
            &self,
            kind: SendKind,
            connection: ConnectionId,
            handle: AttributeHandle,
            payload: &[u8],
        ) -> Result<(), TransportError> {
            if let Some(error) = self.next_error.borrow_mut().take() {
                return Err(error);
            }

            let mut copy = Vec::new();
            copy.extend_from_slice(payload)
                .map_err(|_| TransportError::OutOfBuffers)?;
            self.history
                .borrow_mut()
                .push(Sent {
                    kind,
                    connection,
                    handle,
                    payload: copy,
                })
                .map_err(|_| TransportError::OutOfBuffers)
        }
    }

    impl Default for MockTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl GattTransport for MockTransport {
        async fn send_notification(
            &mut self,
            connection: ConnectionId,
            handle: AttributeHandle,
            payload: &[u8],
        ) -> Result<(), TransportError> {
            self.record(SendKind::Notification, connection, handle, payload)
        }

        async fn send_indication(
            &mut self,
            connection: ConnectionId,
            handle: AttributeHandle,
            payload: &[u8],
        ) -> Result<(), TransportError> {
            self.record(SendKind::Indication, connection, handle, payload)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_records_in_order() {
            let mut transport = MockTransport::new();

            futures::executor::block_on(async {
                transport
                    .send_notification(ConnectionId(1), AttributeHandle(5), &[1, 2])
                    .await
                    .unwrap();
                transport
                    .send_indication(ConnectionId(1), AttributeHandle(9), &[3])
                    .await
                    .unwrap();
            });

            assert_eq!(transport.notifications(), 1);
            assert_eq!(transport.indications(), 1);
            let last = transport.last().unwrap();
            assert_eq!(last.handle, AttributeHandle(9));
            assert_eq!(last.payload.as_slice(), &[3]);
        }

        #[test]
        fn test_injected_error_is_one_shot() {
            let mut transport = MockTransport::new();
            transport.set_next_error(TransportError::Busy);

            futures::executor::block_on(async {
                let first = transport
                    .send_notification(ConnectionId(0), AttributeHandle(1), &[0])
                    .await;
                assert_eq!(first, Err(TransportError::Busy));
                assert!(transport
                    .send_notification(ConnectionId(0), AttributeHandle(1), &[0])
                    .await
                    .is_ok());
            });

            assert_eq!(transport.notifications(), 1);
        }
    }
}
