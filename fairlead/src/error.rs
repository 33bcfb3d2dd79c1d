//! Error types for message schemas and engine initialization.

use thiserror::Error;

use crate::message::{ArgShape, EventKind};

/// Errors raised while building or decoding callback messages.
///
/// Every callback event carries a fixed argument schema; a message that
/// does not match it is refused at the build site rather than handed to a
/// receiver that cannot decode it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// The event name does not belong to any known callback.
    #[error("unknown callback event `{0}`")]
    UnknownEvent(String),

    /// The argument count does not match the event's schema.
    #[error("{event} carries {expected} argument(s), got {actual}")]
    ArityMismatch {
        /// Event whose schema was violated.
        event: EventKind,
        /// Argument count the schema requires.
        expected: usize,
        /// Argument count actually supplied.
        actual: usize,
    },

    /// An argument's tag does not match the schema at its position.
    #[error("{event} argument {index} must be {expected}, got {actual}")]
    ShapeMismatch {
        /// Event whose schema was violated.
        event: EventKind,
        /// Zero-based position of the offending argument.
        index: usize,
        /// Tag the schema requires at this position.
        expected: ArgShape,
        /// Tag actually supplied.
        actual: ArgShape,
    },
}

/// Errors raised while installing engine entry points or initializing a
/// provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    /// A required engine entry point was absent from the table. Nothing is
    /// installed when this is returned; whatever table was in place before
    /// stays in place.
    #[error("engine entry-point table is missing `{name}`")]
    MissingFunction {
        /// Name of the absent entry point.
        name: &'static str,
    },

    /// The declared upload body length is negative. The provider is not
    /// created and nothing is dispatched.
    #[error("invalid declared upload length {length}")]
    InvalidLength {
        /// Length passed to the init call.
        length: i64,
    },
}
