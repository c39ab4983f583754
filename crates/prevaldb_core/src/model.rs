//! Model, command, and query traits.
//!
//! The model is the application's live object graph. Exactly one
//! authoritative in-memory instance exists per engine, and its state is
//! always equal to "latest snapshot ⊕ committed journal entries after the
//! snapshot watermark, in id order" - whether reached by recovery replay
//! or by live execution.

use crate::error::CommandError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// The application's in-memory domain model.
///
/// A model is an opaque, serializable object graph. The engine never
/// inspects it; it only snapshots it, restores it, and hands it to
/// commands and queries under the kernel's lock discipline.
///
/// `Clone` is required so the optimistic kernel can execute commands
/// against a working copy before publishing, and is typically a derive
/// next to the serde derives.
pub trait Model: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The command type that mutates this model.
    ///
    /// In practice this is an enum with one variant per operation, so a
    /// single serializable type covers the whole command vocabulary.
    type Command: Command<Self>;
}

/// A state-mutating command, executed through the kernel and recorded in
/// the journal.
///
/// # Contract
///
/// A command must only mutate the model on its success path. When
/// `execute` returns an error the kernel journals a rollback marker and
/// promises callers that the pre-command state is still visible; a command
/// that mutates and then fails breaks that promise under the pessimistic
/// kernel (the optimistic kernel discards the working copy either way).
pub trait Command<M>: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The value produced by a successful execution.
    type Output;

    /// Executes the command against the model.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] to signal failure; the mutation is then
    /// discarded and the failure surfaced to the `execute` caller.
    fn execute(&self, model: &mut M) -> Result<Self::Output, CommandError>;
}

/// A read-only query.
///
/// Queries never mutate the model and are never journaled. Under the
/// pessimistic kernel they share a read lock with other queries; under the
/// optimistic kernel they read the live model while commands run on a
/// working copy.
pub trait Query<M> {
    /// The value produced by the query.
    type Output;

    /// Executes the query against a shared view of the model.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] if the query cannot be answered.
    fn execute(&self, model: &M) -> Result<Self::Output, CommandError>;
}
