//! Test fixtures shared across unit tests.

use crate::error::CommandError;
use crate::model::{Command, Model, Query};
use serde::{Deserialize, Serialize};

/// Minimal domain model for tests: a counter with an append-only history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterModel {
    /// Current counter value.
    pub value: u64,
    /// Every amount ever added, in execution order.
    pub history: Vec<u64>,
}

impl Model for CounterModel {
    type Command = CounterCommand;
}

/// Commands over [`CounterModel`], including deliberately failing ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CounterCommand {
    /// Adds the amount to the counter.
    Add(u64),
    /// Fails without touching the model.
    Reject,
    /// Mutates the model and then fails. Violates the command contract;
    /// used to show the optimistic kernel discarding the working copy.
    AddThenFail(u64),
    /// Adds the amount after sleeping, to hold the command path open while
    /// another thread queries.
    SlowAdd(u64),
}

impl Command<CounterModel> for CounterCommand {
    type Output = u64;

    fn execute(&self, model: &mut CounterModel) -> Result<u64, CommandError> {
        match self {
            Self::Add(amount) => {
                model.value += amount;
                model.history.push(*amount);
                Ok(model.value)
            }
            Self::Reject => Err(CommandError::new("rejected")),
            Self::AddThenFail(amount) => {
                model.value += amount;
                model.history.push(*amount);
                Err(CommandError::new("failed after mutating"))
            }
            Self::SlowAdd(amount) => {
                std::thread::sleep(std::time::Duration::from_millis(100));
                model.value += amount;
                model.history.push(*amount);
                Ok(model.value)
            }
        }
    }
}

/// Reads the current counter value.
#[derive(Debug, Clone, Copy)]
pub struct CounterValue;

impl Query<CounterModel> for CounterValue {
    type Output = u64;

    fn execute(&self, model: &CounterModel) -> Result<u64, CommandError> {
        Ok(model.value)
    }
}
