//! Request-to-endpoint routing table.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

use crate::handle::RequestHandle;
use crate::message::CallbackMessage;

/// Delivery endpoint in the consuming runtime.
///
/// `post` hands one message over, fire-and-forget: it must not block, and
/// it reports only whether a receiver still existed. Engine threads call
/// this, so an implementation that parks the calling thread is wrong.
pub trait MessagePort: Send + Sync {
    /// Posts one message; `false` means the receiver is gone.
    fn post(&self, message: CallbackMessage) -> bool;
}

/// Mailbox delivery into a tokio unbounded channel.
///
/// `UnboundedSender::send` never blocks, which is exactly the contract
/// engine threads need. A dropped receiver shows up as `false`, and the
/// message is released on the spot.
impl MessagePort for mpsc::UnboundedSender<CallbackMessage> {
    fn post(&self, message: CallbackMessage) -> bool {
        self.send(message).is_ok()
    }
}

struct RegistryState {
    endpoints: HashMap<RequestHandle, Arc<dyn MessagePort>>,
    registrations: u64,
    removals: u64,
}

/// Concurrent map from request handle to delivery endpoint.
///
/// One instance per engine session. All operations are individually atomic
/// behind one mutex; callers must not assume atomicity across a
/// lookup-then-remove pair. For the terminal-dispatch case the bridge uses
/// [`EndpointRegistry::remove`], whose return value is the lookup.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use fairlead::{CallbackMessage, EndpointRegistry, RequestHandle};
///
/// let registry = EndpointRegistry::new();
/// let (tx, _rx) = tokio::sync::mpsc::unbounded_channel::<CallbackMessage>();
/// let handle = RequestHandle::new(7);
///
/// registry.register(handle, Arc::new(tx));
/// assert!(registry.lookup(handle).is_some());
/// registry.remove(handle);
/// assert!(registry.lookup(handle).is_none());
/// ```
pub struct EndpointRegistry {
    state: Mutex<RegistryState>,
}

impl EndpointRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                endpoints: HashMap::new(),
                registrations: 0,
                removals: 0,
            }),
        }
    }

    /// Inserts or overwrites the endpoint for `handle`.
    pub fn register(&self, handle: RequestHandle, endpoint: Arc<dyn MessagePort>) {
        let mut state = self.state.lock().unwrap();
        state.registrations += 1;
        let replaced = state.endpoints.insert(handle, endpoint).is_some();
        drop(state);
        debug!(%handle, replaced, "registered endpoint");
    }

    /// Returns the endpoint registered for `handle`, if any.
    pub fn lookup(&self, handle: RequestHandle) -> Option<Arc<dyn MessagePort>> {
        self.state.lock().unwrap().endpoints.get(&handle).cloned()
    }

    /// Erases the mapping, returning what was registered.
    ///
    /// Removing a handle that was never registered, or was already removed,
    /// is a no-op.
    pub fn remove(&self, handle: RequestHandle) -> Option<Arc<dyn MessagePort>> {
        let mut state = self.state.lock().unwrap();
        let removed = state.endpoints.remove(&handle);
        if removed.is_some() {
            state.removals += 1;
        }
        drop(state);
        if removed.is_some() {
            debug!(%handle, "removed endpoint");
        }
        removed
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().endpoints.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total register calls over the registry's lifetime.
    pub fn registration_count(&self) -> u64 {
        self.state.lock().unwrap().registrations
    }

    /// Total removals that actually erased an entry.
    pub fn removal_count(&self) -> u64 {
        self.state.lock().unwrap().removals
    }
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EndpointRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("EndpointRegistry")
            .field("live", &state.endpoints.len())
            .field("registrations", &state.registrations)
            .field("removals", &state.removals)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Counts posts instead of delivering anywhere.
    struct MockPort {
        received: AtomicUsize,
    }

    impl MockPort {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                received: AtomicUsize::new(0),
            })
        }

        fn received_count(&self) -> usize {
            self.received.load(Ordering::SeqCst)
        }
    }

    impl MessagePort for MockPort {
        fn post(&self, _message: CallbackMessage) -> bool {
            self.received.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn test_new_registry_is_empty() {
        let registry = EndpointRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.registration_count(), 0);
        assert_eq!(registry.removal_count(), 0);
    }

    #[test]
    fn test_register_lookup_remove() {
        let registry = EndpointRegistry::new();
        let port = MockPort::new();
        let handle = RequestHandle::new(42);

        registry.register(handle, port);
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup(handle).is_some());

        assert!(registry.remove(handle).is_some());
        assert!(registry.lookup(handle).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_overwrites_existing_endpoint() {
        let registry = EndpointRegistry::new();
        let first = MockPort::new();
        let second = MockPort::new();
        let handle = RequestHandle::new(1);

        registry.register(handle, Arc::clone(&first) as Arc<dyn MessagePort>);
        registry.register(handle, Arc::clone(&second) as Arc<dyn MessagePort>);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.registration_count(), 2);

        let endpoint = registry.lookup(handle).unwrap();
        let message = crate::message::MessageBuilder::new(crate::message::EventKind::Canceled)
            .build()
            .unwrap();
        assert!(endpoint.post(message));
        assert_eq!(first.received_count(), 0);
        assert_eq!(second.received_count(), 1);
    }

    #[test]
    fn test_remove_missing_handle_is_noop() {
        let registry = EndpointRegistry::new();
        assert!(registry.remove(RequestHandle::new(9)).is_none());
        assert_eq!(registry.removal_count(), 0);
    }

    #[test]
    fn test_lookup_never_registers() {
        let registry = EndpointRegistry::new();
        assert!(registry.lookup(RequestHandle::new(5)).is_none());
        assert!(registry.is_empty());
        assert_eq!(registry.registration_count(), 0);
    }

    #[test]
    fn test_mailbox_port_reports_gone_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let message = crate::message::MessageBuilder::new(crate::message::EventKind::Canceled)
            .build()
            .unwrap();
        drop(rx);
        assert!(!tx.post(message));
    }
}
