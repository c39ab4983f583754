//! Asynchronous journal writer decorator.

use super::{JournalEntry, JournalWriter};
use crate::error::{EngineError, EngineResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use tracing::error;

/// Decorator that moves journal writes onto a background thread.
///
/// `append` pushes the entry onto an unbounded queue and returns
/// immediately; a single dedicated worker drains the queue strictly in
/// enqueue order into the decorated writer. Faster response times and
/// burst absorption, at the cost of a window where acknowledged commands
/// are not yet durable if the process crashes before the queue drains.
///
/// # Failure semantics
///
/// If the decorated writer fails mid-drain the worker stops and raises a
/// failure flag; every subsequent `append` returns
/// [`EngineError::JournalWriterFailed`] so the engine never keeps
/// acknowledging commands over a dead journal. `close` drops the queue's
/// sender, blocks until the worker has drained everything already
/// enqueued, then closes the decorated writer. Closing twice is a no-op.
pub struct AsyncJournalWriter<C: Send + 'static> {
    sender: Option<mpsc::Sender<JournalEntry<C>>>,
    worker: Option<JoinHandle<Result<Box<dyn JournalWriter<C>>, EngineError>>>,
    failed: Arc<AtomicBool>,
}

impl<C: Send + 'static> AsyncJournalWriter<C> {
    /// Wraps a writer, spawning the background drain thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn new(inner: Box<dyn JournalWriter<C>>) -> EngineResult<Self> {
        let (sender, receiver) = mpsc::channel::<JournalEntry<C>>();
        let failed = Arc::new(AtomicBool::new(false));

        let worker_failed = Arc::clone(&failed);
        let worker = std::thread::Builder::new()
            .name("prevaldb-journal".into())
            .spawn(move || {
                let mut inner = inner;
                while let Ok(entry) = receiver.recv() {
                    if let Err(e) = inner.append(entry) {
                        worker_failed.store(true, Ordering::SeqCst);
                        error!(error = %e, "background journal writer failed");
                        return Err(e);
                    }
                }
                Ok(inner)
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            failed,
        })
    }

    /// Whether the background writer has failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}

impl<C: Send + 'static> JournalWriter<C> for AsyncJournalWriter<C> {
    fn append(&mut self, entry: JournalEntry<C>) -> EngineResult<()> {
        if self.is_failed() {
            return Err(EngineError::journal_writer_failed(
                "background journal writer has failed; no further entries accepted",
            ));
        }
        let sender = self.sender.as_ref().ok_or(EngineError::EngineClosed)?;
        sender.send(entry).map_err(|_| {
            EngineError::journal_writer_failed("background journal writer has exited")
        })
    }

    fn close(&mut self) -> EngineResult<()> {
        let Some(sender) = self.sender.take() else {
            return Ok(());
        };
        // Dropping the sender closes the queue; the worker drains what is
        // left and exits.
        drop(sender);

        match self.worker.take() {
            Some(handle) => match handle.join() {
                Ok(Ok(mut inner)) => inner.close(),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(EngineError::journal_writer_failed(
                    "background journal writer panicked",
                )),
            },
            None => Ok(()),
        }
    }
}

impl<C: Send + 'static> Drop for AsyncJournalWriter<C> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SequenceNumber;
    use parking_lot::Mutex;

    /// Records appended entries; optionally fails after a set number.
    struct RecordingWriter {
        entries: Arc<Mutex<Vec<JournalEntry<u64>>>>,
        closed: Arc<AtomicBool>,
        fail_after: Option<usize>,
    }

    impl JournalWriter<u64> for RecordingWriter {
        fn append(&mut self, entry: JournalEntry<u64>) -> EngineResult<()> {
            let mut entries = self.entries.lock();
            if let Some(limit) = self.fail_after {
                if entries.len() >= limit {
                    return Err(EngineError::journal_writer_failed("disk full"));
                }
            }
            entries.push(entry);
            Ok(())
        }

        fn close(&mut self) -> EngineResult<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn recording_writer(
        fail_after: Option<usize>,
    ) -> (Box<dyn JournalWriter<u64>>, Arc<Mutex<Vec<JournalEntry<u64>>>>, Arc<AtomicBool>) {
        let entries = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let writer = RecordingWriter {
            entries: Arc::clone(&entries),
            closed: Arc::clone(&closed),
            fail_after,
        };
        (Box::new(writer), entries, closed)
    }

    #[test]
    fn close_drains_all_entries_in_order() {
        for m in [0usize, 1, 5, 100] {
            let (inner, entries, closed) = recording_writer(None);
            let mut writer = AsyncJournalWriter::new(inner).unwrap();

            for i in 0..m {
                writer
                    .append(JournalEntry::command(
                        SequenceNumber::new(i as u64 + 1),
                        i as u64,
                    ))
                    .unwrap();
            }
            writer.close().unwrap();

            let entries = entries.lock();
            assert_eq!(entries.len(), m, "M = {m}");
            for (i, entry) in entries.iter().enumerate() {
                assert_eq!(entry.id, SequenceNumber::new(i as u64 + 1));
            }
            assert!(closed.load(Ordering::SeqCst));
        }
    }

    #[test]
    fn close_twice_is_noop() {
        let (inner, _, _) = recording_writer(None);
        let mut writer = AsyncJournalWriter::new(inner).unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn inner_failure_poisons_subsequent_appends() {
        let (inner, entries, _) = recording_writer(Some(2));
        let mut writer = AsyncJournalWriter::new(inner).unwrap();

        for i in 1..=3u64 {
            // Enqueue always succeeds until the failure is observed.
            let _ = writer.append(JournalEntry::command(SequenceNumber::new(i), i));
        }

        // Wait for the worker to hit the failure.
        for _ in 0..100 {
            if writer.is_failed() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(writer.is_failed());

        let result = writer.append(JournalEntry::command(SequenceNumber::new(4), 4));
        assert!(matches!(
            result,
            Err(EngineError::JournalWriterFailed { .. })
        ));
        assert_eq!(entries.lock().len(), 2);

        let close_result = writer.close();
        assert!(matches!(
            close_result,
            Err(EngineError::JournalWriterFailed { .. })
        ));
    }
}
