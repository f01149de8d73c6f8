//! Host-facing error taxonomy

use thiserror::Error;

/// Alias for `Result<T, PlayerError>`.
pub type PlayerResult<T> = Result<T, PlayerError>;

/// Errors surfaced by the playback controller.
///
/// Malformed state and failed navigation always leave the previous valid
/// position untouched; nothing here is retried internally.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// Content or state could not be read or written
    #[error("i/o error on '{path}': {source}")]
    Io {
        /// The logical path handed to the host filesystem
        path: String,
        /// Underlying error from the host filesystem
        #[source]
        source: std::io::Error,
    },

    /// The engine rejected the story content
    #[error("story content rejected: {0}")]
    Parse(String),

    /// The engine reported a runtime failure
    #[error("engine error: {0}")]
    Engine(String),

    /// The operation requires an active story execution
    #[error("no story loaded")]
    NoStoryLoaded,

    /// Choice index outside the current choice list
    #[error("choice index {index} out of range (current choices: {len})")]
    IndexOutOfRange {
        /// The rejected index
        index: usize,
        /// Number of currently pending choices
        len: usize,
    },

    /// A path jump failed; the prior position is intact
    #[error("cannot navigate to '{path}': {message}")]
    Navigation {
        /// The content address that was requested
        path: String,
        /// Engine-reported reason
        message: String,
    },

    /// A state snapshot could not be parsed or applied
    #[error("malformed state snapshot: {0}")]
    MalformedState(String),

    /// An external function name is already bound
    #[error("external function '{0}' is already bound")]
    DuplicateBinding(String),
}

impl PlayerError {
    /// Wrap a host filesystem error with the logical path it occurred on
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
