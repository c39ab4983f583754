//! Pessimistic kernel: writer-exclusive locking.

use crate::error::CommandError;
use crate::kernel::CommandOutput;
use crate::model::{Command, Model, Query};
use parking_lot::RwLock;

/// Kernel that guards the model with a single readers-writer lock.
///
/// A command holds the write lock for its entire execution, so it never
/// observes or races a query. Queries share the read lock with each
/// other. Commands execute in place; the command contract (mutate only on
/// the success path) is what keeps a failed command invisible.
pub struct PessimisticKernel<M> {
    model: RwLock<M>,
}

impl<M: Model> PessimisticKernel<M> {
    /// Wraps a live model.
    pub fn new(model: M) -> Self {
        Self {
            model: RwLock::new(model),
        }
    }

    /// Executes a command under the exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns the command's own failure.
    pub fn execute_command(&self, command: &M::Command) -> Result<CommandOutput<M>, CommandError> {
        let mut model = self.model.write();
        command.execute(&mut model)
    }

    /// Executes a query under the shared lock.
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
