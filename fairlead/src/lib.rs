//! # Fairlead
//!
//! A fairlead guides a running line to where it must go without fouling.
//! This crate does the same for a native network engine's callbacks: it
//! guides them across the boundary between the engine's internal threads
//! and the consuming runtime's event loop.
//!
//! Two coupled subsystems:
//!
//! - **Serializing executor**: one dedicated worker thread running opaque
//!   tasks in submission order, so the engine only ever observes
//!   single-threaded calls.
//! - **Dispatch bridge**: a per-session registry from request handle to
//!   delivery endpoint, plus self-describing, ownership-transferring
//!   callback messages released exactly once.
//!
//! ```text
//! engine threads                                consuming runtime
//!   ─callback─▶ UrlRequestCallbacks ─▶ DispatchBridge ──post──▶ mailbox
//!                                           │ lookup
//!                                    EndpointRegistry
//!   ◀──run()── SerializingExecutor ◀──submit── any thread
//! ```
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use fairlead::{
//!     CallbackMessage, EngineApi, EngineRef, EngineSession, EventKind, RequestHandle,
//! };
//!
//! let api = EngineApi::builder()
//!     .buffer_create(|| EngineRef::new(0x1000))
//!     .buffer_init_with_alloc(|_buffer, _size| {})
//!     .engine_shutdown(|_engine| true)
//!     .engine_destroy(|_engine| {})
//!     .install()
//!     .expect("table is complete");
//!
//! let session = EngineSession::new(EngineRef::new(0xE), api);
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<CallbackMessage>();
//! let request = RequestHandle::new(1);
//! session.register_endpoint(request, Arc::new(tx));
//!
//! // An engine thread would drive this; terminal events also tear down
//! // the registration.
//! session.callbacks().on_succeeded(request, EngineRef::new(0x2000));
//!
//! let delivered = rx.try_recv().expect("terminal event delivered");
//! assert_eq!(delivered.event(), EventKind::Succeeded);
//! assert!(session.registry().is_empty());
//! ```

#![deny(missing_docs)]

/// Engine entry-point table and its validating builder.
pub mod api;

/// One-shot delivery of built messages to registered endpoints.
pub mod bridge;

/// Engine-facing callback handlers.
pub mod callbacks;

/// Error types for message schemas and engine initialization.
pub mod error;

/// Single-threaded serializing executor.
pub mod executor;

/// Opaque identities for engine-owned objects.
pub mod handle;

/// Callback messages crossing the runtime boundary.
pub mod message;

/// Request-to-endpoint routing table.
pub mod registry;

/// Scoped owner tying registry, bridge, and engine table together.
pub mod session;

/// Upload body events from the engine's pull-based provider.
pub mod upload;

pub use api::{EngineApi, EngineApiBuilder};
pub use bridge::DispatchBridge;
pub use callbacks::{UrlRequestCallbacks, READ_BUFFER_SIZE};
pub use error::{InitError, MessageError};
pub use executor::{Runnable, SerializingExecutor, TaskQueue};
pub use handle::{EngineRef, RequestHandle};
pub use message::{
    ArgShape, CallbackArg, CallbackEvent, CallbackMessage, EventKind, MessageBuilder, Payload,
    ReleaseHook,
};
pub use registry::{EndpointRegistry, MessagePort};
pub use session::EngineSession;
pub use upload::UploadDataProvider;
