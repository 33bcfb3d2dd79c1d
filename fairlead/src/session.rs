//! Scoped owner tying registry, bridge, and engine table together.

use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{EngineApi, EngineApiBuilder};
use crate::bridge::DispatchBridge;
use crate::callbacks::UrlRequestCallbacks;
use crate::error::InitError;
use crate::handle::{EngineRef, RequestHandle};
use crate::registry::{EndpointRegistry, MessagePort};
use crate::upload::UploadDataProvider;

/// One engine instance's bridge state, torn down on drop.
///
/// Owns the endpoint registry, the dispatch bridge over it, and the
/// installed [`EngineApi`] table. Nothing here is process-global: two
/// engines get two sessions, each with its own registry and teardown.
///
/// Dropping the session asks the engine to shut down and, after a clean
/// shutdown, releases the engine object. An engine that refuses shutdown
/// is left alive; destroy never runs on the refusal branch.
pub struct EngineSession {
    engine: EngineRef,
    api: Arc<EngineApi>,
    registry: Arc<EndpointRegistry>,
    bridge: DispatchBridge,
}

impl EngineSession {
    /// Binds a session to `engine` with an installed entry-point table.
    ///
    /// A session cannot exist without a complete table, so every callback
    /// set it hands out can reach the engine.
    pub fn new(engine: EngineRef, api: EngineApi) -> Self {
        let registry = Arc::new(EndpointRegistry::new());
        let bridge = DispatchBridge::new(Arc::clone(&registry));
        info!(%engine, "engine session created");
        Self {
            engine,
            api: Arc::new(api),
            registry,
            bridge,
        }
    }

    /// Replaces the engine entry-point table.
    ///
    /// Callback sets handed out earlier keep the table they were bound to.
    ///
    /// # Errors
    ///
    /// [`InitError::MissingFunction`] if the new table is incomplete; the
    /// session keeps its current table in that case.
    pub fn install_api(&mut self, builder: EngineApiBuilder) -> Result<(), InitError> {
        self.api = Arc::new(builder.install()?);
        Ok(())
    }

    /// Registers the delivery endpoint for a request before it starts.
    pub fn register_endpoint(&self, handle: RequestHandle, endpoint: Arc<dyn MessagePort>) {
        self.registry.register(handle, endpoint);
    }

    /// Tears down a request's registration; idempotent.
    ///
    /// Terminal callbacks erase the registration on their own; this is for
    /// explicit teardown, e.g. when the consuming side abandons a request.
    pub fn remove_request(&self, handle: RequestHandle) {
        self.registry.remove(handle);
    }

    /// Callback set for the engine to invoke, bound to this session.
    pub fn callbacks(&self) -> UrlRequestCallbacks {
        UrlRequestCallbacks::new(self.bridge.clone(), Arc::clone(&self.api))
    }

    /// Upload relay for `request` with its declared body length.
    ///
    /// # Errors
    ///
    /// [`InitError::InvalidLength`] if `length` is negative.
    pub fn upload_provider(
        &self,
        request: RequestHandle,
        length: i64,
    ) -> Result<UploadDataProvider, InitError> {
        UploadDataProvider::init(self.bridge.clone(), request, length)
    }

    /// The engine object this session drives.
    pub fn engine(&self) -> EngineRef {
        self.engine
    }

    /// Bridge handle for dispatch paths outside the standard callbacks.
    pub fn bridge(&self) -> &DispatchBridge {
        &self.bridge
    }

    /// Registry handle, mainly for observability.
    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        if !self.api.shutdown_engine(self.engine) {
            warn!(engine = %self.engine, "engine refused shutdown, skipping destroy");
            return;
        }
        self.api.destroy_engine(self.engine);
        info!(engine = %self.engine, "engine session closed");
    }
}
