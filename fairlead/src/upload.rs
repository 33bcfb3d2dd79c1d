//! Upload body events from the engine's pull-based provider.
//!
//! Filling buffers and acknowledging the sink is the consuming runtime's
//! business; this side only relays the engine's pulls through the bridge,
//! in the same message format as the response callbacks.

use tracing::error;

use crate::bridge::DispatchBridge;
use crate::error::{InitError, MessageError};
use crate::handle::{EngineRef, RequestHandle};
use crate::message::{CallbackMessage, EventKind, MessageBuilder};

/// Relays upload-provider callbacks for one request.
#[derive(Clone)]
pub struct UploadDataProvider {
    bridge: DispatchBridge,
    request: RequestHandle,
    length: i64,
}

impl UploadDataProvider {
    /// Associates a provider with its request and declared body length.
    ///
    /// `length` is the total body size in bytes the engine will announce
    /// upstream; it is validated before anything else happens.
    ///
    /// # Errors
    ///
    /// [`InitError::InvalidLength`] if `length` is negative. No provider is
    /// created and nothing is dispatched in that case.
    pub fn init(
        bridge: DispatchBridge,
        request: RequestHandle,
        length: i64,
    ) -> Result<Self, InitError> {
        if length < 0 {
            return Err(InitError::InvalidLength { length });
        }
        Ok(Self {
            bridge,
            request,
            length,
        })
    }

    /// Declared body length in bytes.
    pub fn length(&self) -> i64 {
        self.length
    }

    /// The request this provider feeds.
    pub fn request(&self) -> RequestHandle {
        self.request
    }

    /// The engine wants the next chunk written into `buffer`, with `sink`
    /// notified once it is there.
    pub fn read(&self, sink: EngineRef, buffer: EngineRef) {
        let built = MessageBuilder::new(EventKind::UploadRead)
            .ptr(sink)
            .ptr(buffer)
            .build();
        self.dispatch(built);
    }

    /// The engine wants the body restarted from the beginning.
    pub fn rewind(&self, sink: EngineRef) {
        let built = MessageBuilder::new(EventKind::UploadRewind).ptr(sink).build();
        self.dispatch(built);
    }

    /// The engine is done with the body. Carries no payload fields.
    pub fn close(&self) {
        let built = MessageBuilder::new(EventKind::UploadClose).build();
        self.dispatch(built);
    }

    fn dispatch(&self, built: Result<CallbackMessage, MessageError>) {
        match built {
            Ok(message) => self.bridge.dispatch(self.request, message),
            Err(error) => {
                error!(request = %self.request, %error, "dropping malformed upload message");
            }
        }
    }
}
