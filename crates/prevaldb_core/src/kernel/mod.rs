//! Concurrency kernels governing access to the live model.
//!
//! A kernel owns the authoritative in-memory model instance and enforces
//! an isolation policy while commands and queries run against it. Two
//! strategies exist: [`PessimisticKernel`] holds a writer-exclusive lock
//! for the whole command execution, [`OptimisticKernel`] executes on a
//! working copy and publishes on success.
//!
//! Kernels do not journal; the engine appends the command entry before
//! asking the kernel to execute, and appends a rollback marker if the
//! kernel reports failure.

mod optimistic;
mod pessimistic;

pub use optimistic::OptimisticKernel;
pub use pessimistic::PessimisticKernel;

use crate::config::KernelStrategy;
use crate::error::CommandError;
use crate::model::{Command, Model, Query};

/// The output type of a model's command vocabulary.
pub type CommandOutput<M> = <<M as Model>::Command as Command<M>>::Output;

/// A kernel of either strategy, dispatched statically.
pub enum Kernel<M: Model> {
    /// Writer-exclusive locking for the duration of each command.
    Pessimistic(PessimisticKernel<M>),
    /// Working-copy execution, published on success.
    Optimistic(OptimisticKernel<M>),
}

impl<M: Model> Kernel<M> {
    /// Creates a kernel of the configured strategy around a live model.
    pub fn new(strategy: KernelStrategy, model: M) -> Self {
        match strategy {
            KernelStrategy::Pessimistic => Self::Pessimistic(PessimisticKernel::new(model)),
            KernelStrategy::Optimistic => Self::Optimistic(OptimisticKernel::new(model)),
        }
    }

    /// Executes a command under the kernel's isolation policy.
    ///
    /// # Errors
    ///
    /// Returns the command's own failure; the kernel guarantees the
    /// pre-command state is what callers observe afterwards.
    pub fn execute_command(&self, command: &M::Command) -> Result<CommandOutput<M>, CommandError> {
        match self {
            Self::Pessimistic(kernel) => kernel.execute_command(command),
            Self::Optimistic(kernel) => kernel.execute_command(command),
        }
    }

    /// Executes a read-only query against a shared view of the model.
    ///
    /// # Errors
    ///
    /// Returns the query's own failure.
    pub fn execute_query<Q: Query<M>>(&self, query: &Q) -> Result<Q::Output, CommandError> {
        match self {
            Self::Pessimistic(kernel) => kernel.execute_query(query),
            Self::Optimistic(kernel) => kernel.execute_query(query),
        }
    }

    /// Runs a closure over a shared view of the model.
    ///
    /// Used by the engine to snapshot the model without cloning it.
    pub fn with_model<R>(&self, f: impl FnOnce(&M) -> R) -> R {
        match self {
            Self::Pessimistic(kernel) => kernel.with_model(f),
            Self::Optimistic(kernel) => kernel.with_model(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CounterCommand, CounterModel, CounterValue};

    #[test]
    fn strategy_selects_variant() {
        let pessimistic = Kernel::new(KernelStrategy::Pessimistic, CounterModel::default());
        assert!(matches!(pessimistic, Kernel::Pessimistic(_)));

        let optimistic = Kernel::new(KernelStrategy::Optimistic, CounterModel::default());
        assert!(matches!(optimistic, Kernel::Optimistic(_)));
    }

    #[test]
    fn both_strategies_agree_on_success_path() {
        for strategy in [KernelStrategy::Pessimistic, KernelStrategy::Optimistic] {
            let kernel = Kernel::new(strategy, CounterModel::default());
            assert_eq!(kernel.execute_command(&CounterCommand::Add(3)).unwrap(), 3);
            assert_eq!(kernel.execute_command(&CounterCommand::Add(4)).unwrap(), 7);
            assert_eq!(kernel.execute_query(&CounterValue).unwrap(), 7);
        }
    }
}
