//! One-shot delivery of built messages to registered endpoints.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::handle::RequestHandle;
use crate::message::CallbackMessage;
use crate::registry::EndpointRegistry;

/// Routes built messages to the endpoint registered for a request.
///
/// The bridge owns nothing beyond a shared reference to its registry, so
/// it clones cheaply into every callback handler that needs to dispatch.
/// Delivery is fire-and-forget: the bridge never blocks on the receiver
/// and never reports receiver-side failure back to the engine.
#[derive(Clone)]
pub struct DispatchBridge {
    registry: Arc<EndpointRegistry>,
}

impl DispatchBridge {
    /// Creates a bridge routing through `registry`.
    pub fn new(registry: Arc<EndpointRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this bridge routes through.
    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    /// Delivers `message` to the endpoint registered for `handle`.
    ///
    /// An unregistered handle means the receiver is already torn down: the
    /// message is dropped here, releasing its payload, and nothing is
    /// reported anywhere. A terminal event erases the registration as part
    /// of the dispatch, since the engine emits nothing further for the
    /// handle; the erase doubles as the lookup so the pair stays atomic.
    pub fn dispatch(&self, handle: RequestHandle, message: CallbackMessage) {
        let event = message.event();
        let endpoint = if event.is_terminal() {
            self.registry.remove(handle)
        } else {
            self.registry.lookup(handle)
        };
        let Some(endpoint) = endpoint else {
            debug!(%handle, %event, "no endpoint registered, dropping dispatch");
            return;
        };
        if endpoint.post(message) {
            trace!(%handle, %event, "dispatched");
        } else {
            debug!(%handle, %event, "endpoint receiver gone, message released");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::handle::EngineRef;
    use crate::message::{EventKind, MessageBuilder};
    use crate::registry::MessagePort;

    struct MockPort {
        received: AtomicUsize,
        last_event: Mutex<Option<EventKind>>,
    }

    impl MockPort {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                received: AtomicUsize::new(0),
                last_event: Mutex::new(None),
            })
        }
    }

    impl MessagePort for MockPort {
        fn post(&self, message: CallbackMessage) -> bool {
            self.received.fetch_add(1, Ordering::SeqCst);
            *self.last_event.lock().unwrap() = Some(message.event());
            true
        }
    }

    fn bridge_with_registry() -> (DispatchBridge, Arc<EndpointRegistry>) {
        let registry = Arc::new(EndpointRegistry::new());
        (DispatchBridge::new(Arc::clone(&registry)), registry)
    }

    #[test]
    fn test_dispatch_delivers_to_registered_endpoint() {
        let (bridge, registry) = bridge_with_registry();
        let port = MockPort::new();
        let handle = RequestHandle::new(1);
        registry.register(handle, Arc::clone(&port) as Arc<dyn MessagePort>);

        let message = MessageBuilder::new(EventKind::ResponseStarted)
            .ptr(EngineRef::new(0x10))
            .ptr(EngineRef::new(0x20))
            .build()
            .unwrap();
        bridge.dispatch(handle, message);

        assert_eq!(port.received.load(Ordering::SeqCst), 1);
        assert_eq!(
            *port.last_event.lock().unwrap(),
            Some(EventKind::ResponseStarted)
        );
    }

    #[test]
    fn test_dispatch_to_unregistered_handle_releases_payload() {
        let (bridge, _registry) = bridge_with_registry();
        let released = Arc::new(AtomicUsize::new(0));
        let release_flag = Arc::clone(&released);

        let message = MessageBuilder::new(EventKind::Canceled)
            .release_hook(move || {
                release_flag.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();
        bridge.dispatch(RequestHandle::new(404), message);

        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_non_terminal_dispatch_keeps_registration() {
        let (bridge, registry) = bridge_with_registry();
        let port = MockPort::new();
        let handle = RequestHandle::new(2);
        registry.register(handle, port);

        let message = MessageBuilder::new(EventKind::ReadCompleted)
            .ptr(handle.as_engine_ref())
            .ptr(EngineRef::new(0x20))
            .ptr(EngineRef::new(0x30))
            .uint(1024)
            .build()
            .unwrap();
        bridge.dispatch(handle, message);

        assert!(registry.lookup(handle).is_some());
    }

    #[test]
    fn test_terminal_dispatch_erases_registration() {
        let (bridge, registry) = bridge_with_registry();
        let port = MockPort::new();
        let handle = RequestHandle::new(3);
        registry.register(handle, Arc::clone(&port) as Arc<dyn MessagePort>);

        let message = MessageBuilder::new(EventKind::Succeeded)
            .ptr(EngineRef::new(0x50))
            .build()
            .unwrap();
        bridge.dispatch(handle, message);

        assert_eq!(port.received.load(Ordering::SeqCst), 1);
        // The accessor sees the same table the dispatch path routed through.
        assert!(bridge.registry().lookup(handle).is_none());
        assert_eq!(bridge.registry().removal_count(), 1);
    }

    #[test]
    fn test_dispatch_after_removal_is_silent_drop() {
        let (bridge, registry) = bridge_with_registry();
        let port = MockPort::new();
        let handle = RequestHandle::new(4);
        registry.register(handle, Arc::clone(&port) as Arc<dyn MessagePort>);
        registry.remove(handle);

        let released = Arc::new(AtomicUsize::new(0));
        let release_flag = Arc::clone(&released);
        let message = MessageBuilder::new(EventKind::Succeeded)
            .ptr(EngineRef::new(0x60))
            .release_hook(move || {
                release_flag.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();
        bridge.dispatch(handle, message);

        assert_eq!(port.received.load(Ordering::SeqCst), 0);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_gone_mailbox_receiver_releases_message() {
        let (bridge, registry) = bridge_with_registry();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = RequestHandle::new(5);
        registry.register(handle, Arc::new(tx));
        drop(rx);

        let released = Arc::new(AtomicUsize::new(0));
        let release_flag = Arc::clone(&released);
        let message = MessageBuilder::new(EventKind::Canceled)
            .release_hook(move || {
                release_flag.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();
        bridge.dispatch(handle, message);

        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
