//! Engine-facing callback handlers.
//!
//! Each handler is the sole entry point for its callback shape: it packs
//! the schema'd message and hands it to the bridge. Handlers run on the
//! engine's internal threads, so none of them blocks and none of them
//! reaches back into the engine except through the installed entry-point
//! table.

use std::sync::Arc;

use tracing::error;

use crate::api::EngineApi;
use crate::bridge::DispatchBridge;
use crate::error::MessageError;
use crate::handle::{EngineRef, RequestHandle};
use crate::message::{CallbackMessage, EventKind, MessageBuilder};

/// Size of the read buffer created when a response starts.
pub const READ_BUFFER_SIZE: u64 = 32 * 1024;

/// The engine-facing callback set for one session.
///
/// Bound to the session's bridge and entry-point table; cheap to hand to
/// the embedding layer per request since both bindings are shared.
pub struct UrlRequestCallbacks {
    bridge: DispatchBridge,
    engine: Arc<EngineApi>,
}

impl UrlRequestCallbacks {
    /// Binds a callback set to a bridge and an installed table.
    pub fn new(bridge: DispatchBridge, engine: Arc<EngineApi>) -> Self {
        Self { bridge, engine }
    }

    /// The engine is following a redirect.
    ///
    /// `new_location_url` is only valid for the duration of this call; it
    /// is duplicated into the payload before the hand-off.
    pub fn on_redirect_received(
        &self,
        request: RequestHandle,
        info: EngineRef,
        new_location_url: &str,
    ) {
        let built = MessageBuilder::new(EventKind::RedirectReceived)
            .str(new_location_url)
            .ptr(info)
            .build();
        self.dispatch(request, built);
    }

    /// Response headers arrived. Creates the buffer the consuming runtime
    /// hands back to the engine on its first read.
    pub fn on_response_started(&self, request: RequestHandle, info: EngineRef) {
        let buffer = self.engine.create_read_buffer(READ_BUFFER_SIZE);
        let built = MessageBuilder::new(EventKind::ResponseStarted)
            .ptr(info)
            .ptr(buffer)
            .build();
        self.dispatch(request, built);
    }

    /// One read finished; `bytes_read` bytes are waiting in `buffer`.
    pub fn on_read_completed(
        &self,
        request: RequestHandle,
        info: EngineRef,
        buffer: EngineRef,
        bytes_read: u64,
    ) {
        let built = MessageBuilder::new(EventKind::ReadCompleted)
            .ptr(request.as_engine_ref())
            .ptr(info)
            .ptr(buffer)
            .uint(bytes_read)
            .build();
        self.dispatch(request, built);
    }

    /// Terminal: the request finished cleanly.
    pub fn on_succeeded(&self, request: RequestHandle, info: EngineRef) {
        let built = MessageBuilder::new(EventKind::Succeeded).ptr(info).build();
        self.dispatch(request, built);
    }

    /// Terminal: the request failed.
    ///
    /// Only the engine's error message crosses the bridge; the error
    /// object itself stays with the engine.
    pub fn on_failed(&self, request: RequestHandle, _info: EngineRef, error_message: &str) {
        let built = MessageBuilder::new(EventKind::Failed)
            .str(error_message)
            .build();
        self.dispatch(request, built);
    }

    /// Terminal: the request was canceled. Carries no payload fields.
    pub fn on_canceled(&self, request: RequestHandle, _info: EngineRef) {
        let built = MessageBuilder::new(EventKind::Canceled).build();
        self.dispatch(request, built);
    }

    fn dispatch(&self, request: RequestHandle, built: Result<CallbackMessage, MessageError>) {
        match built {
            Ok(message) => self.bridge.dispatch(request, message),
            Err(error) => {
                // Handlers pack their own schemas, so this is a bug here,
                // not in the engine; it is contained, never propagated.
                error!(%request, %error, "dropping malformed callback message");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::message::CallbackEvent;
    use crate::registry::{EndpointRegistry, MessagePort};

    struct RecordingPort {
        events: Mutex<Vec<CallbackEvent>>,
    }

    impl RecordingPort {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
            })
        }

        fn events(&self) -> Vec<CallbackEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl MessagePort for RecordingPort {
        fn post(&self, message: CallbackMessage) -> bool {
            self.events
                .lock()
                .unwrap()
                .push(message.decode().expect("handlers build valid messages"));
            true
        }
    }

    fn test_api() -> EngineApi {
        EngineApi::builder()
            .buffer_create(|| EngineRef::new(0xBEEF))
            .buffer_init_with_alloc(|_, _| {})
            .engine_shutdown(|_| true)
            .engine_destroy(|_| {})
            .install()
            .unwrap()
    }

    fn wired_callbacks() -> (UrlRequestCallbacks, Arc<RecordingPort>, RequestHandle) {
        let registry = Arc::new(EndpointRegistry::new());
        let bridge = DispatchBridge::new(Arc::clone(&registry));
        let port = RecordingPort::new();
        let handle = RequestHandle::new(0xA1);
        registry.register(handle, Arc::clone(&port) as Arc<dyn MessagePort>);
        let callbacks = UrlRequestCallbacks::new(bridge, Arc::new(test_api()));
        (callbacks, port, handle)
    }

    #[test]
    fn test_redirect_packs_location_then_info() {
        let (callbacks, port, handle) = wired_callbacks();
        callbacks.on_redirect_received(handle, EngineRef::new(0x11), "https://example.com/next");
        assert_eq!(
            port.events(),
            vec![CallbackEvent::RedirectReceived {
                new_location: "https://example.com/next".to_string(),
                info: EngineRef::new(0x11),
            }]
        );
    }

    #[test]
    fn test_response_started_creates_read_buffer() {
        let (callbacks, port, handle) = wired_callbacks();
        callbacks.on_response_started(handle, EngineRef::new(0x22));
        assert_eq!(
            port.events(),
            vec![CallbackEvent::ResponseStarted {
                info: EngineRef::new(0x22),
                read_buffer: EngineRef::new(0xBEEF),
            }]
        );
    }

    #[test]
    fn test_read_completed_carries_request_and_count() {
        let (callbacks, port, handle) = wired_callbacks();
        callbacks.on_read_completed(handle, EngineRef::new(0x22), EngineRef::new(0x33), 8192);
        assert_eq!(
            port.events(),
            vec![CallbackEvent::ReadCompleted {
                request: handle.as_engine_ref(),
                info: EngineRef::new(0x22),
                buffer: EngineRef::new(0x33),
                bytes_read: 8192,
            }]
        );
    }

    #[test]
    fn test_failed_carries_only_the_message() {
        let (callbacks, port, handle) = wired_callbacks();
        callbacks.on_failed(handle, EngineRef::new(0x22), "net::ERR_TIMED_OUT");
        assert_eq!(
            port.events(),
            vec![CallbackEvent::Failed {
                error: "net::ERR_TIMED_OUT".to_string(),
            }]
        );
    }

    #[test]
    fn test_canceled_is_empty_and_terminal() {
        let (callbacks, port, handle) = wired_callbacks();
        callbacks.on_canceled(handle, EngineRef::new(0x22));
        assert_eq!(port.events(), vec![CallbackEvent::Canceled]);
    }

    #[test]
    fn test_terminal_callback_tears_down_registration() {
        let (callbacks, port, handle) = wired_callbacks();
        callbacks.on_succeeded(handle, EngineRef::new(0x22));
        assert_eq!(
            port.events(),
            vec![CallbackEvent::Succeeded {
                info: EngineRef::new(0x22),
            }]
        );
        // Nothing further for the handle reaches the endpoint.
        callbacks.on_canceled(handle, EngineRef::new(0x22));
        assert_eq!(port.events().len(), 1);
    }
}
