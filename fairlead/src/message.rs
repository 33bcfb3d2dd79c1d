//! Callback messages crossing the runtime boundary.
//!
//! Every engine callback becomes one [`CallbackMessage`]: an event kind plus
//! a payload of tagged arguments whose ownership transfers to the receiver.
//! The set of events and their argument schemas is fixed; a message is
//! validated against its schema when built and again when decoded, so the
//! receiver matches on the event name instead of reinterpreting raw words.
//!
//! Payload release is tied to `Drop`: whether a message is delivered and
//! decoded, or dropped on the floor because its receiver is gone, the
//! attached release hook fires exactly once.

use std::fmt;
use std::str::FromStr;

use crate::error::MessageError;
use crate::handle::EngineRef;

/// Tag describing one argument position in an event schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    /// An opaque engine object address.
    Ptr,
    /// An unsigned 64-bit scalar.
    Uint,
    /// An owned UTF-8 string.
    Str,
}

impl fmt::Display for ArgShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArgShape::Ptr => "ptr",
            ArgShape::Uint => "uint",
            ArgShape::Str => "str",
        };
        f.write_str(name)
    }
}

/// One tagged argument value inside a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackArg {
    /// Reference to an engine-owned object.
    Ptr(EngineRef),
    /// Unsigned scalar, e.g. a byte count.
    Uint(u64),
    /// String duplicated into its own allocation at build time.
    Str(String),
}

impl CallbackArg {
    /// Returns the tag for this value.
    pub fn shape(&self) -> ArgShape {
        match self {
            CallbackArg::Ptr(_) => ArgShape::Ptr,
            CallbackArg::Uint(_) => ArgShape::Uint,
            CallbackArg::Str(_) => ArgShape::Str,
        }
    }
}

/// The fixed set of callback events crossing the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The engine is following a redirect; carries the new location.
    RedirectReceived,
    /// Response headers arrived; carries the response info and a fresh
    /// read buffer.
    ResponseStarted,
    /// One read finished; carries request, info, buffer, and byte count.
    ReadCompleted,
    /// Terminal: the request finished cleanly.
    Succeeded,
    /// Terminal: the request failed; carries the engine's error message.
    Failed,
    /// Terminal: the request was canceled.
    Canceled,
    /// The engine wants the next upload chunk written into a buffer.
    UploadRead,
    /// The engine wants the upload body restarted from the beginning.
    UploadRewind,
    /// The engine is done with the upload body.
    UploadClose,
}

impl EventKind {
    /// Argument tags this event's payload carries, in order.
    pub const fn schema(&self) -> &'static [ArgShape] {
        match self {
            EventKind::RedirectReceived => &[ArgShape::Str, ArgShape::Ptr],
            EventKind::ResponseStarted => &[ArgShape::Ptr, ArgShape::Ptr],
            EventKind::ReadCompleted => &[
                ArgShape::Ptr,
                ArgShape::Ptr,
                ArgShape::Ptr,
                ArgShape::Uint,
            ],
            EventKind::Succeeded => &[ArgShape::Ptr],
            EventKind::Failed => &[ArgShape::Str],
            EventKind::Canceled => &[],
            EventKind::UploadRead => &[ArgShape::Ptr, ArgShape::Ptr],
            EventKind::UploadRewind => &[ArgShape::Ptr],
            EventKind::UploadClose => &[],
        }
    }

    /// True for events after which the engine emits nothing further for
    /// the request.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventKind::Succeeded | EventKind::Failed | EventKind::Canceled
        )
    }

    /// Wire name as the consuming runtime sees it.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::RedirectReceived => "OnRedirectReceived",
            EventKind::ResponseStarted => "OnResponseStarted",
            EventKind::ReadCompleted => "OnReadCompleted",
            EventKind::Succeeded => "OnSucceeded",
            EventKind::Failed => "OnFailed",
            EventKind::Canceled => "OnCanceled",
            EventKind::UploadRead => "ReadFunc",
            EventKind::UploadRewind => "RewindFunc",
            EventKind::UploadClose => "CloseFunc",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OnRedirectReceived" => Ok(EventKind::RedirectReceived),
            "OnResponseStarted" => Ok(EventKind::ResponseStarted),
            "OnReadCompleted" => Ok(EventKind::ReadCompleted),
            "OnSucceeded" => Ok(EventKind::Succeeded),
            "OnFailed" => Ok(EventKind::Failed),
            "OnCanceled" => Ok(EventKind::Canceled),
            "ReadFunc" => Ok(EventKind::UploadRead),
            "RewindFunc" => Ok(EventKind::UploadRewind),
            "CloseFunc" => Ok(EventKind::UploadClose),
            other => Err(MessageError::UnknownEvent(other.to_string())),
        }
    }
}

/// Callback fired exactly once when a payload is consumed or destroyed.
pub type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Owned argument list for one delivered callback.
///
/// Ownership transfers to the receiver at delivery; the payload releases
/// itself when dropped, firing the attached hook at most once. Zero-argument
/// events still carry a valid, empty payload so the decode path stays
/// uniform.
pub struct Payload {
    args: Vec<CallbackArg>,
    release: Option<ReleaseHook>,
}

impl Payload {
    pub(crate) fn new(args: Vec<CallbackArg>, release: Option<ReleaseHook>) -> Self {
        Self { args, release }
    }

    /// Arguments in schema order.
    pub fn args(&self) -> &[CallbackArg] {
        &self.args
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// True for zero-argument payloads.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("args", &self.args)
            .field("release_pending", &self.release.is_some())
            .finish()
    }
}

impl Drop for Payload {
    fn drop(&mut self) {
        // Taking the hook out of its slot is what makes release single-shot.
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// An `(event, payload)` pair delivered once per callback occurrence.
///
/// Built by [`MessageBuilder`], routed by the dispatch bridge, and consumed
/// by the receiver either as the raw tagged arguments or through
/// [`CallbackMessage::decode`].
#[derive(Debug)]
pub struct CallbackMessage {
    event: EventKind,
    payload: Payload,
}

impl CallbackMessage {
    /// The event this message describes.
    pub fn event(&self) -> EventKind {
        self.event
    }

    /// Arguments in schema order.
    pub fn args(&self) -> &[CallbackArg] {
        self.payload.args()
    }

    /// Decodes into the typed event view, consuming the message.
    ///
    /// The payload's release hook fires once the typed view has been built,
    /// and also when decoding fails, so no path leaks the payload.
    ///
    /// # Errors
    ///
    /// [`MessageError::ArityMismatch`] or [`MessageError::ShapeMismatch`]
    /// if the arguments do not match the event's schema.
    pub fn decode(self) -> Result<CallbackEvent, MessageError> {
        let CallbackMessage { event, mut payload } = self;
        let args = std::mem::take(&mut payload.args);
        let decoded = decode_args(event, args);
        // The hook fires here, after the arguments have been taken.
        drop(payload);
        decoded
    }
}

/// Typed view of a delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackEvent {
    /// The engine is following a redirect.
    RedirectReceived {
        /// Where the request is being redirected to.
        new_location: String,
        /// Response info for the redirecting response.
        info: EngineRef,
    },
    /// Response headers arrived.
    ResponseStarted {
        /// Response info for the started response.
        info: EngineRef,
        /// Freshly created buffer for the first read.
        read_buffer: EngineRef,
    },
    /// One read finished.
    ReadCompleted {
        /// The request the read belongs to.
        request: EngineRef,
        /// Response info for the in-flight response.
        info: EngineRef,
        /// Buffer holding the bytes that were read.
        buffer: EngineRef,
        /// How many bytes landed in the buffer.
        bytes_read: u64,
    },
    /// Terminal: the request finished cleanly.
    Succeeded {
        /// Response info for the finished response.
        info: EngineRef,
    },
    /// Terminal: the request failed.
    Failed {
        /// The engine's error message.
        error: String,
    },
    /// Terminal: the request was canceled.
    Canceled,
    /// The engine wants the next upload chunk.
    UploadRead {
        /// Sink to notify once the chunk is written.
        sink: EngineRef,
        /// Buffer to write the chunk into.
        buffer: EngineRef,
    },
    /// The engine wants the upload body restarted.
    UploadRewind {
        /// Sink to notify once the rewind is done.
        sink: EngineRef,
    },
    /// The engine is done with the upload body.
    UploadClose,
}

impl CallbackEvent {
    /// The event kind this view was decoded from.
    pub fn kind(&self) -> EventKind {
        match self {
            CallbackEvent::RedirectReceived { .. } => EventKind::RedirectReceived,
            CallbackEvent::ResponseStarted { .. } => EventKind::ResponseStarted,
            CallbackEvent::ReadCompleted { .. } => EventKind::ReadCompleted,
            CallbackEvent::Succeeded { .. } => EventKind::Succeeded,
            CallbackEvent::Failed { .. } => EventKind::Failed,
            CallbackEvent::Canceled => EventKind::Canceled,
            CallbackEvent::UploadRead { .. } => EventKind::UploadRead,
            CallbackEvent::UploadRewind { .. } => EventKind::UploadRewind,
            CallbackEvent::UploadClose => EventKind::UploadClose,
        }
    }
}

/// Walks a payload's arguments against the schema, producing precise errors.
struct ArgReader {
    event: EventKind,
    index: usize,
    args: std::vec::IntoIter<CallbackArg>,
}

impl ArgReader {
    fn new(event: EventKind, args: Vec<CallbackArg>) -> Self {
        Self {
            event,
            index: 0,
            args: args.into_iter(),
        }
    }

    fn take(&mut self) -> Result<CallbackArg, MessageError> {
        self.args.next().ok_or(MessageError::ArityMismatch {
            event: self.event,
            expected: self.event.schema().len(),
            actual: self.index,
        })
    }

    fn mismatch(&self, expected: ArgShape, actual: &CallbackArg) -> MessageError {
        MessageError::ShapeMismatch {
            event: self.event,
            index: self.index,
            expected,
            actual: actual.shape(),
        }
    }

    fn ptr(&mut self) -> Result<EngineRef, MessageError> {
        let value = match self.take()? {
            CallbackArg::Ptr(value) => value,
            other => return Err(self.mismatch(ArgShape::Ptr, &other)),
        };
        self.index += 1;
        Ok(value)
    }

    fn uint(&mut self) -> Result<u64, MessageError> {
        let value = match self.take()? {
            CallbackArg::Uint(value) => value,
            other => return Err(self.mismatch(ArgShape::Uint, &other)),
        };
        self.index += 1;
        Ok(value)
    }

    fn str(&mut self) -> Result<String, MessageError> {
        let value = match self.take()? {
            CallbackArg::Str(value) => value,
            other => return Err(self.mismatch(ArgShape::Str, &other)),
        };
        self.index += 1;
        Ok(value)
    }

    fn finish(mut self) -> Result<(), MessageError> {
        if self.args.next().is_none() {
            return Ok(());
        }
        Err(MessageError::ArityMismatch {
            event: self.event,
            expected: self.event.schema().len(),
            actual: self.index + 1 + self.args.len(),
        })
    }
}

fn decode_args(event: EventKind, args: Vec<CallbackArg>) -> Result<CallbackEvent, MessageError> {
    let mut read = ArgReader::new(event, args);
    let decoded = match event {
        EventKind::RedirectReceived => CallbackEvent::RedirectReceived {
            new_location: read.str()?,
            info: read.ptr()?,
        },
        EventKind::ResponseStarted => CallbackEvent::ResponseStarted {
            info: read.ptr()?,
            read_buffer: read.ptr()?,
        },
        EventKind::ReadCompleted => CallbackEvent::ReadCompleted {
            request: read.ptr()?,
            info: read.ptr()?,
            buffer: read.ptr()?,
            bytes_read: read.uint()?,
        },
        EventKind::Succeeded => CallbackEvent::Succeeded { info: read.ptr()? },
        EventKind::Failed => CallbackEvent::Failed { error: read.str()? },
        EventKind::Canceled => CallbackEvent::Canceled,
        EventKind::UploadRead => CallbackEvent::UploadRead {
            sink: read.ptr()?,
            buffer: read.ptr()?,
        },
        EventKind::UploadRewind => CallbackEvent::UploadRewind { sink: read.ptr()? },
        EventKind::UploadClose => CallbackEvent::UploadClose,
    };
    read.finish()?;
    Ok(decoded)
}

/// Collects tagged arguments for one event and produces the message.
///
/// String arguments are duplicated at push time because the source string's
/// lifetime is not guaranteed to outlive the asynchronous hand-off; the
/// duplicate rides inside the payload and dies with it.
///
/// # Example
///
/// ```rust
/// use fairlead::{CallbackEvent, EngineRef, EventKind, MessageBuilder};
///
/// let message = MessageBuilder::new(EventKind::Succeeded)
///     .ptr(EngineRef::new(0x7000))
///     .build()
///     .expect("matches the OnSucceeded schema");
/// assert_eq!(
///     message.decode(),
///     Ok(CallbackEvent::Succeeded {
///         info: EngineRef::new(0x7000)
///     })
/// );
/// ```
pub struct MessageBuilder {
    event: EventKind,
    args: Vec<CallbackArg>,
    release: Option<ReleaseHook>,
}

impl MessageBuilder {
    /// Starts a message for `event`.
    pub fn new(event: EventKind) -> Self {
        Self {
            event,
            args: Vec::with_capacity(event.schema().len()),
            release: None,
        }
    }

    /// Appends an engine object reference.
    pub fn ptr(mut self, value: EngineRef) -> Self {
        self.args.push(CallbackArg::Ptr(value));
        self
    }

    /// Appends an unsigned scalar.
    pub fn uint(mut self, value: u64) -> Self {
        self.args.push(CallbackArg::Uint(value));
        self
    }

    /// Appends a string, duplicating it into its own owned allocation.
    pub fn str(mut self, value: &str) -> Self {
        self.args.push(CallbackArg::Str(value.to_owned()));
        self
    }

    /// Attaches the hook fired exactly once when the payload is consumed or
    /// destroyed.
    pub fn release_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(hook));
        self
    }

    /// Validates the collected arguments against the event's schema and
    /// produces the message.
    ///
    /// Zero-argument events build a valid, empty payload.
    ///
    /// # Errors
    ///
    /// [`MessageError::ArityMismatch`] or [`MessageError::ShapeMismatch`]
    /// if the arguments do not match the schema. A refused message never
    /// forms, so its release hook fires right here.
    pub fn build(mut self) -> Result<CallbackMessage, MessageError> {
        if let Err(error) = self.validate() {
            if let Some(release) = self.release.take() {
                release();
            }
            return Err(error);
        }
        Ok(CallbackMessage {
            event: self.event,
            payload: Payload::new(self.args, self.release),
        })
    }

    fn validate(&self) -> Result<(), MessageError> {
        let schema = self.event.schema();
        if self.args.len() != schema.len() {
            return Err(MessageError::ArityMismatch {
                event: self.event,
                expected: schema.len(),
                actual: self.args.len(),
            });
        }
        if let Some(index) = self
            .args
            .iter()
            .zip(schema)
            .position(|(arg, shape)| arg.shape() != *shape)
        {
            return Err(MessageError::ShapeMismatch {
                event: self.event,
                index,
                expected: schema[index],
                actual: self.args[index].shape(),
            });
        }
        Ok(())
    }
}
