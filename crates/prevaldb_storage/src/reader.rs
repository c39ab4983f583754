//! `io::Read` adapter over a storage backend.

use crate::backend::StorageBackend;
use std::io;

/// A forward-only [`io::Read`] view over a [`StorageBackend`].
///
/// Deserializers consume `io::Read`, while backends expose positioned
/// `read_at`. This adapter bridges the two by tracking a cursor, so a
/// journal segment or snapshot can be decoded as a byte stream without
/// loading it into memory at once.
pub struct BackendReader {
    backend: Box<dyn StorageBackend>,
    pos: u64,
}

impl BackendReader {
    /// Creates a reader positioned at the start of the backend.
    #[must_use]
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self { backend, pos: 0 }
    }

    /// Returns the current read position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }
}

impl io::Read for BackendReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let size = self.backend.size().map_err(io::Error::other)?;
        let remaining = size.saturating_sub(self.pos);
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let len = buf.len().min(remaining as usize);
        let data = self
            .backend
            .read_at(self.pos, len)
            .map_err(io::Error::other)?;
        buf[..len].copy_from_slice(&data);
        self.pos += len as u64;
        Ok(len)
    }
}
