//! Engine façade: the public entry point tying store, journal, and kernel
//! together.

use crate::config::{EngineConfig, KernelStrategy};
use crate::error::{EngineError, EngineResult};
use crate::journal::JournalAppender;
use crate::kernel::{CommandOutput, Kernel};
use crate::model::{Command, Model, Query};
use crate::store::{FileStore, Store};
use parking_lot::Mutex;
use tracing::{debug, info};

/// An in-process object database engine over one model instance.
///
/// The engine owns one store, one kernel, and one journal appender for its
/// lifetime. Every committed command is durable in the journal before its
/// effect is acknowledged; every failed command leaves a rollback marker
/// and the pre-command state.
///
/// A command's lifecycle is: admit (commands are serialized), append the
/// command entry to the journal, execute through the kernel, then either
/// acknowledge or append a rollback marker carrying the same id. A crash
/// after the append but before execution is indistinguishable, on replay,
/// from a crash just after acknowledgement - by design, since the entry is
/// the commitment.
pub struct Engine<M: Model, St: Store<M> = FileStore> {
    store: St,
    kernel: Kernel<M>,
    appender: Mutex<Option<JournalAppender<M::Command>>>,
}

impl<M: Model> Engine<M, FileStore> {
    /// Creates a new file-backed database and returns a running engine.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error if the location is not empty.
    pub fn create(config: EngineConfig, initial: M) -> EngineResult<Self> {
        let strategy = config.kernel;
        let store = FileStore::new(config);
        Self::create_with_store(store, initial, strategy)
    }

    /// Loads an existing file-backed database and returns a running
    /// engine, replaying the journal on top of the latest snapshot.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error if the store cannot be loaded and
    /// with a journal corruption error if replay fails.
    pub fn load(config: EngineConfig) -> EngineResult<Self> {
        let strategy = config.kernel;
        let store = FileStore::new(config);
        Self::load_with_store(store, strategy)
    }
}

impl<M: Model, St: Store<M>> Engine<M, St> {
    /// Creates a new database in an explicit store.
    ///
    /// # Errors
    ///
    /// Fails if the store already holds data.
    pub fn create_with_store(store: St, initial: M, strategy: KernelStrategy) -> EngineResult<Self> {
        store.create(&initial)?;
        Self::load_with_store(store, strategy)
    }

    /// Loads a database from an explicit store.
    ///
    /// This is the sole path to a live model: load the most recent
    /// snapshot, replay the committed entries after its watermark, then
    /// open a fresh journal segment continuing after the highest raw id so
    /// cancelled ids are never reused.
    ///
    /// # Errors
    ///
    /// Configuration errors for an unloadable store; journal corruption
    /// for undecodable entries, unmatched rollback markers, or a command
    /// that fails during replay. No partial model is ever returned.
    pub fn load_with_store(store: St, strategy: KernelStrategy) -> EngineResult<Self> {
        store.verify_can_load()?;
        store.load()?;

        let (mut model, watermark) = store.load_most_recent_snapshot()?;
        let entries = store.committed_entries_from(watermark.next())?;
        let last_raw = entries.last_sequence().max(watermark);

        let mut replayed = 0u64;
        for entry in entries {
            let entry = entry?;
            let id = entry.id;
            let command = entry.into_command().ok_or_else(|| {
                EngineError::journal_corruption(format!(
                    "committed stream yielded a non-command entry at {id}"
                ))
            })?;
            command.execute(&mut model).map_err(|e| {
                EngineError::journal_corruption(format!("replay of entry {id} failed: {e}"))
            })?;
            replayed += 1;
        }
        info!(%watermark, replayed, "restored model");

        let writer = store.create_journal_writer(last_raw.next())?;
        let appender = JournalAppender::new(last_raw.next(), writer);

        Ok(Self {
            store,
            kernel: Kernel::new(strategy, model),
            appender: Mutex::new(Some(appender)),
        })
    }

    /// Executes a command: journal first, then apply through the kernel.
    ///
    /// # Errors
    ///
    /// [`EngineError::CommandFailed`] when the command itself fails (a
    /// rollback marker is journaled and the pre-command state preserved);
    /// durability errors when the journal rejects the entry, in which case
    /// the command was not executed; [`EngineError::EngineClosed`] after
    /// `close`.
    pub fn execute(&self, command: &M::Command) -> EngineResult<CommandOutput<M>> {
        let mut guard = self.appender.lock();
        let appender = guard.as_mut().ok_or(EngineError::EngineClosed)?;

        let id = appender.append_command(command)?;
        match self.kernel.execute_command(command) {
            Ok(output) => Ok(output),
            Err(failure) => {
                appender.append_rollback(id)?;
                debug!(%id, "command rolled back");
                Err(EngineError::CommandFailed(failure))
            }
        }
    }

    /// Executes a read-only query. Never journaled.
    ///
    /// # Errors
    ///
    /// [`EngineError::CommandFailed`] when the query itself fails;
    /// [`EngineError::EngineClosed`] after `close`.
    pub fn query<Q: Query<M>>(&self, query: &Q) -> EngineResult<Q::Output> {
        if self.appender.lock().is_none() {
            return Err(EngineError::EngineClosed);
        }
        self.kernel
            .execute_query(query)
            .map_err(EngineError::CommandFailed)
    }

    /// Writes a snapshot of the current model at the current watermark.
    ///
    /// Commands are held off for the duration; queries keep running.
    ///
    /// # Errors
    ///
    /// Propagates store failures; [`EngineError::EngineClosed`] after
    /// `close`.
    pub fn write_snapshot(&self) -> EngineResult<()> {
        let mut guard = self.appender.lock();
        let appender = guard.as_mut().ok_or(EngineError::EngineClosed)?;
        let watermark = appender.last_sequence();
        self.kernel
            .with_model(|model| self.store.write_snapshot(model, watermark))
    }

    /// Closes the engine: flushes and closes the journal writer.
    ///
    /// An asynchronous journal drains fully before this returns. Further
    /// commands and queries fail with [`EngineError::EngineClosed`].
    /// Idempotent.
    ///
    /// # Errors
    ///
    /// Propagates the journal writer's close failure.
    pub fn close(&self) -> EngineResult<()> {
        match self.appender.lock().take() {
            Some(mut appender) => {
                let result = appender.close();
                info!("engine closed");
                result
            }
            None => Ok(()),
        }
    }
}

impl<M: Model, St: Store<M>> Drop for Engine<M, St> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
