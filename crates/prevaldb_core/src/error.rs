//! Error types for the PrevalDB engine.

use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// A failure reported by a user command or query.
///
/// Commands signal failure by returning this type; the kernel reacts by
/// discarding the mutation and journaling a rollback marker, then surfaces
/// the failure to the caller as [`EngineError::CommandFailed`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
}

impl CommandError {
    /// Creates a new command error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors that can occur in PrevalDB engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] prevaldb_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the codec failure.
        message: String,
    },

    /// The engine location or snapshot location is invalid.
    ///
    /// Raised for missing/non-empty directories, unparseable store file
    /// names, and a missing initial snapshot. Never retried automatically.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration violation.
        message: String,
    },

    /// The journal is corrupted or inconsistent.
    ///
    /// Raised for rollback markers with no matching command span and for
    /// entries that fail to decode or replay. Recovery never returns a
    /// partial model after this error.
    #[error("journal corruption: {message}")]
    JournalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// A user command failed during execution.
    ///
    /// The mutation was discarded and a rollback marker journaled; the
    /// model still reflects the pre-command state.
    #[error("command failed: {0}")]
    CommandFailed(#[source] CommandError),

    /// The background journal writer has failed or exited.
    ///
    /// No further commands are accepted; the engine must be closed.
    #[error("journal writer failed: {message}")]
    JournalWriterFailed {
        /// Description of the writer failure.
        message: String,
    },

    /// The engine has been closed.
    #[error("engine is closed")]
    EngineClosed,
}

impl EngineError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a journal corruption error.
    pub fn journal_corruption(message: impl Into<String>) -> Self {
        Self::JournalCorruption {
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a journal writer failure error.
    pub fn journal_writer_failed(message: impl Into<String>) -> Self {
        Self::JournalWriterFailed {
            message: message.into(),
        }
    }
}

impl From<CommandError> for EngineError {
    fn from(err: CommandError) -> Self {
        Self::CommandFailed(err)
    }
}
