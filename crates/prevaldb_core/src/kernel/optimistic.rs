//! Optimistic kernel: working-copy execution.

use crate::error::CommandError;
use crate::kernel::CommandOutput;
use crate::model::{Command, Model, Query};
use parking_lot::{Mutex, RwLock};

/// Kernel that executes commands against a working copy of the model.
///
/// A command clones the model, mutates the clone, and on success publishes
/// it under a brief write lock. Queries keep reading the live model for
/// the whole command execution and only block during the publish swap. On
/// failure the working copy is dropped, so even a command that mutates
/// before failing leaves no trace.
///
/// Commands are still serialized against each other through an admission
/// lock; the strategy trades clone cost for query availability, not for
/// concurrent writers.
pub struct OptimisticKernel<M> {
    model: RwLock<M>,
    admission: Mutex<()>,
}

impl<M: Model> OptimisticKernel<M> {
    /// Wraps a live model.
    pub fn new(model: M) -> Self {
        Self {
            model: RwLock::new(model),
            admission: Mutex::new(()),
        }
    }

    /// Executes a command on a working copy, publishing on success.
    ///
    /// # Errors
    ///
    /// Returns the command's own failure; the live model is untouched.
    pub fn execute_command(&self, command: &M::Command) -> Result<CommandOutput<M>, CommandError> {
        let _admitted = self.admission.lock();
        let mut working = self.model.read().clone();
        let output = command.execute(&mut working)?;
        *self.model.write() = working;
        Ok(output)
    }

    /// Executes a query against the live model.
    ///
    /// # Errors
    ///
    /// Returns the query's own failure.
    pub fn execute_query<Q: Query<M>>(&self, query: &Q) -> Result<Q::Output, CommandError> {
        let model = self.model.read();
        query.execute(&model)
    }

    /// Runs a closure over a shared view of the model.
    pub fn with_model<R>(&self, f: impl FnOnce(&M) -> R) -> R {
        f(&self.model.read())
    }
}
