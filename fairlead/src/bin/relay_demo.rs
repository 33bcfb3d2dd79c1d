//! End-to-end relay demo.
//!
//! A simulated engine thread drives one request's callback sequence
//! through a session into a tokio mailbox. The receiver decodes typed
//! events and submits its "engine-visible" reactions to the serializing
//! executor, the way a consuming runtime would. Exit code 1 if the
//! delivered sequence is not the one the engine emitted.

use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use fairlead::{
    CallbackEvent, CallbackMessage, EngineApi, EngineRef, EngineSession, RequestHandle,
    SerializingExecutor,
};

fn demo_api() -> EngineApi {
    // Stand-in for the engine's allocator: hands out consecutive refs.
    let next_buffer = Arc::new(AtomicU64::new(0xB000));
    EngineApi::builder()
        .buffer_create(move || EngineRef::new(next_buffer.fetch_add(1, Ordering::SeqCst)))
        .buffer_init_with_alloc(|buffer, size| {
            tracing::debug!(%buffer, size, "engine buffer sized");
        })
        .engine_shutdown(|_engine| true)
        .engine_destroy(|_engine| {})
        .install()
        .expect("demo table is complete")
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    eprintln!("=== Engine Relay Demo ===");

    let session = EngineSession::new(EngineRef::new(0xE6), demo_api());
    let executor = Arc::new(SerializingExecutor::named("engine-loop"));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<CallbackMessage>();
    let request = RequestHandle::new(0x51);
    session.register_endpoint(request, Arc::new(tx));

    let callbacks = session.callbacks();
    let upload = session
        .upload_provider(request, 3_072)
        .expect("demo length is valid");

    let info = EngineRef::new(0x1F0);
    let sink = EngineRef::new(0x510);
    let engine = thread::spawn(move || {
        // Body upload first: one pull, then the engine closes the body.
        upload.read(sink, EngineRef::new(0xA100));
        upload.close();

        callbacks.on_redirect_received(request, info, "https://example.com/moved");
        callbacks.on_response_started(request, info);
        for chunk in 0..3u64 {
            callbacks.on_read_completed(request, info, EngineRef::new(0xB000), 1_024 * (chunk + 1));
        }
        callbacks.on_succeeded(request, info);
    });

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("failed to build local runtime");

    let reactor = Arc::clone(&executor);
    let delivered = runtime.block_on(async move {
        let mut log = Vec::new();
        while let Some(message) = rx.recv().await {
            let event = match message.decode() {
                Ok(event) => event,
                Err(error) => {
                    eprintln!("FAILED: undecodable message: {error}");
                    process::exit(1);
                }
            };
            eprintln!("  delivered: {}", event.kind());
            match &event {
                CallbackEvent::ResponseStarted { read_buffer, .. }
                | CallbackEvent::ReadCompleted {
                    buffer: read_buffer,
                    ..
                } => {
                    // The next engine read must come from the one worker.
                    let buffer = *read_buffer;
                    reactor.submit(move || {
                        tracing::info!(%buffer, "engine read started from worker");
                    });
                }
                CallbackEvent::RedirectReceived { new_location, .. } => {
                    let location = new_location.clone();
                    reactor.submit(move || {
                        tracing::info!(%location, "redirect followed from worker");
                    });
                }
                _ => {}
            }
            let terminal = event.kind().is_terminal();
            log.push(event.kind());
            if terminal {
                break;
            }
        }
        log
    });

    engine.join().expect("engine thread exited cleanly");
    executor.shutdown();

    let expected: Vec<_> = [
        "ReadFunc",
        "CloseFunc",
        "OnRedirectReceived",
        "OnResponseStarted",
        "OnReadCompleted",
        "OnReadCompleted",
        "OnReadCompleted",
        "OnSucceeded",
    ]
    .iter()
    .map(|name| name.parse::<fairlead::EventKind>().expect("known event"))
    .collect();

    if delivered != expected {
        eprintln!("FAILED: delivered {delivered:?}, expected {expected:?}");
        process::exit(1);
    }
    eprintln!("PASSED: {} events relayed in order", delivered.len());
}
