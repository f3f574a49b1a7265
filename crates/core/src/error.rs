use crate::state::StateRef;

/// Why a wire-level request could not be turned into a [`CheckRequest`],
/// or why a [`CheckRequest`] is structurally invalid.
///
/// These never escape the checker as Rust errors: they become
/// `CheckError::MalformedRequest` results.
///
/// [`CheckRequest`]: crate::CheckRequest
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("invalid secure hash '{input}': {reason}")]
    InvalidHash { input: String, reason: String },

    #[error("invalid state ref '{input}': {reason}")]
    InvalidStateRef { input: String, reason: String },

    #[error("number of output states cannot be negative (got {0})")]
    NegativeOutputCount(i32),

    #[error("{count} output states exceed the limit of {max}")]
    TooManyOutputStates { count: u32, max: u32 },

    #[error("duplicate input state {0}")]
    DuplicateInputState(StateRef),

    #[error("duplicate reference state {0}")]
    DuplicateReferenceState(StateRef),

    /// A state listed both as an input and as a reference.
    #[error("state {0} is listed as both an input and a reference state")]
    OverlappingState(StateRef),
}
