//! PrevalDB engine: an in-process object database.
//!
//! The application's domain model lives in memory as one authoritative
//! object graph; every mutation goes through a recorded command. The
//! engine provides durability (command journal plus snapshots), crash
//! recovery (snapshot load plus journal replay), and controlled
//! concurrency (pessimistic or optimistic kernels).
//!
//! # Example
//!
//! ```no_run
//! use prevaldb_core::{CommandError, Engine, EngineConfig};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Counter {
//!     value: u64,
//! }
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Add(u64);
//!
//! impl prevaldb_core::Command<Counter> for Add {
//!     type Output = u64;
//!
//!     fn execute(&self, model: &mut Counter) -> Result<u64, CommandError> {
//!         model.value += self.0;
//!         Ok(model.value)
//!     }
//! }
//!
//! impl prevaldb_core::Model for Counter {
//!     type Command = Add;
//! }
//!
//! # fn main() -> Result<(), prevaldb_core::EngineError> {
//! let engine = Engine::create(EngineConfig::new("/var/lib/counter"), Counter::default())?;
//! engine.execute(&Add(5))?;
//! engine.close()?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod journal;
pub mod kernel;
pub mod model;
pub mod serializer;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{EngineConfig, JournalMode, KernelStrategy};
pub use engine::Engine;
pub use error::{CommandError, EngineError, EngineResult};
pub use kernel::Kernel;
pub use model::{Command, Model, Query};
pub use serializer::{CborSerializer, Serializer};
pub use store::{FileStore, InMemoryStore, Store};
pub use types::SequenceNumber;
