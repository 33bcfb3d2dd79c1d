//! Engine entry-point table.
//!
//! The bridge calls back into the engine in exactly two places: creating
//! the read buffer when a response starts, and shutting the engine down at
//! session teardown. Those entry points arrive from the embedding layer as
//! a table, installed once per session. An incomplete table is refused
//! wholesale; there is no partially initialized state.

use std::fmt;
use std::sync::Arc;

use tracing::error;

use crate::error::InitError;
use crate::handle::EngineRef;

type BufferCreateFn = Arc<dyn Fn() -> EngineRef + Send + Sync>;
type BufferInitFn = Arc<dyn Fn(EngineRef, u64) + Send + Sync>;
type EngineShutdownFn = Arc<dyn Fn(EngineRef) -> bool + Send + Sync>;
type EngineDestroyFn = Arc<dyn Fn(EngineRef) + Send + Sync>;

/// Installed, validated table of engine entry points.
///
/// Only obtainable through [`EngineApi::builder`], which guarantees every
/// entry point is present.
pub struct EngineApi {
    buffer_create: BufferCreateFn,
    buffer_init_with_alloc: BufferInitFn,
    engine_shutdown: EngineShutdownFn,
    engine_destroy: EngineDestroyFn,
}

impl EngineApi {
    /// Starts collecting a table.
    pub fn builder() -> EngineApiBuilder {
        EngineApiBuilder::default()
    }

    /// Creates a read buffer of `size` bytes inside the engine.
    pub fn create_read_buffer(&self, size: u64) -> EngineRef {
        let buffer = (self.buffer_create)();
        (self.buffer_init_with_alloc)(buffer, size);
        buffer
    }

    /// Asks the engine to shut down; `true` on success.
    pub fn shutdown_engine(&self, engine: EngineRef) -> bool {
        (self.engine_shutdown)(engine)
    }

    /// Releases the engine object.
    pub fn destroy_engine(&self, engine: EngineRef) {
        (self.engine_destroy)(engine)
    }
}

impl fmt::Debug for EngineApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineApi").finish_non_exhaustive()
    }
}

/// Collects engine entry points and validates completeness at install.
///
/// # Example
///
/// ```rust
/// use fairlead::{EngineApi, EngineRef};
///
/// let api = EngineApi::builder()
///     .buffer_create(|| EngineRef::new(0x1000))
///     .buffer_init_with_alloc(|_buffer, _size| {})
///     .engine_shutdown(|_engine| true)
///     .engine_destroy(|_engine| {})
///     .install()
///     .expect("table is complete");
/// assert_eq!(api.create_read_buffer(32 * 1024), EngineRef::new(0x1000));
/// ```
#[derive(Default)]
pub struct EngineApiBuilder {
    buffer_create: Option<BufferCreateFn>,
    buffer_init_with_alloc: Option<BufferInitFn>,
    engine_shutdown: Option<EngineShutdownFn>,
    engine_destroy: Option<EngineDestroyFn>,
}

impl EngineApiBuilder {
    /// Entry point that allocates an uninitialized engine buffer.
    pub fn buffer_create(mut self, f: impl Fn() -> EngineRef + Send + Sync + 'static) -> Self {
        self.buffer_create = Some(Arc::new(f));
        self
    }

    /// Entry point that sizes a freshly created buffer.
    pub fn buffer_init_with_alloc(
        mut self,
        f: impl Fn(EngineRef, u64) + Send + Sync + 'static,
    ) -> Self {
        self.buffer_init_with_alloc = Some(Arc::new(f));
        self
    }

    /// Entry point that shuts the engine down, reporting success.
    pub fn engine_shutdown(mut self, f: impl Fn(EngineRef) -> bool + Send + Sync + 'static) -> Self {
        self.engine_shutdown = Some(Arc::new(f));
        self
    }

    /// Entry point that releases the engine object.
    pub fn engine_destroy(mut self, f: impl Fn(EngineRef) + Send + Sync + 'static) -> Self {
        self.engine_destroy = Some(Arc::new(f));
        self
    }

    /// Validates that every entry point is present and installs the table.
    ///
    /// # Errors
    ///
    /// [`InitError::MissingFunction`] naming the first absent entry point.
    /// Nothing is installed in that case; whatever table the caller had
    /// before stays in place.
    pub fn install(self) -> Result<EngineApi, InitError> {
        let Some(buffer_create) = self.buffer_create else {
            return Err(Self::missing("buffer_create"));
        };
        let Some(buffer_init_with_alloc) = self.buffer_init_with_alloc else {
            return Err(Self::missing("buffer_init_with_alloc"));
        };
        let Some(engine_shutdown) = self.engine_shutdown else {
            return Err(Self::missing("engine_shutdown"));
        };
        let Some(engine_destroy) = self.engine_destroy else {
            return Err(Self::missing("engine_destroy"));
        };
        Ok(EngineApi {
            buffer_create,
            buffer_init_with_alloc,
            engine_shutdown,
            engine_destroy,
        })
    }

    fn missing(name: &'static str) -> InitError {
        error!(function = name, "engine entry-point table incomplete, refusing to install");
        InitError::MissingFunction { name }
    }
}
