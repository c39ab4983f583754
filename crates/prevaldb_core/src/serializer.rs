//! Serializer boundary.
//!
//! The engine is generic over an injected serializer capability: it can
//! write a value to a stream, read one back, and lazily decode a sequence
//! of concatenated values. No assumption is made about the encoding beyond
//! a deterministic round-trip. The default implementation is CBOR via
//! `ciborium`.

use crate::error::{EngineError, EngineResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{ErrorKind, Read, Write};
use std::marker::PhantomData;

/// Capability contract for turning models and journal entries into bytes
/// and back.
pub trait Serializer: Send + Sync + 'static {
    /// Writes one value to the output stream.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Serialization`] if encoding fails and
    /// [`EngineError::Io`] if the underlying write fails.
    fn write<T: Serialize>(&self, value: &T, out: &mut dyn Write) -> EngineResult<()>;

    /// Reads one value from the input stream.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Serialization`] if decoding fails.
    fn read<T: DeserializeOwned>(&self, input: &mut dyn Read) -> EngineResult<T>;

    /// Lazily decodes concatenated values from the stream until clean EOF.
    ///
    /// A truncated or malformed value mid-stream yields an error item; it
    /// is never treated as a silent end of input.
    fn read_sequence<T, R>(&self, input: R) -> ValueSequence<'_, Self, R, T>
    where
        T: DeserializeOwned,
        R: Read,
        Self: Sized,
    {
        ValueSequence::new(self, input)
    }
}

/// Iterator over concatenated serialized values in a stream.
///
/// Stops at clean EOF (stream exhausted exactly on a value boundary).
/// After the first error the iterator is fused.
pub struct ValueSequence<'a, S, R, T> {
    serializer: &'a S,
    input: R,
    done: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, S, R, T> ValueSequence<'a, S, R, T>
where
    S: Serializer,
    R: Read,
    T: DeserializeOwned,
{
    fn new(serializer: &'a S, input: R) -> Self {
        Self {
            serializer,
            input,
            done: false,
            _marker: PhantomData,
        }
    }
}

impl<S, R, T> Iterator for ValueSequence<'_, S, R, T>
where
    S: Serializer,
    R: Read,
    T: DeserializeOwned,
{
    type Item = EngineResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        // Probe one byte to distinguish clean EOF from a value boundary.
        let mut first = [0u8; 1];
        loop {
            match self.input.read(&mut first) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }

        let mut chained = first.as_slice().chain(&mut self.input);
        match self.serializer.read(&mut chained) {
            Ok(value) => Some(Ok(value)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// CBOR serializer backed by `ciborium`.
///
/// CBOR is self-delimiting, which is what makes [`Serializer::read_sequence`]
/// work over plain concatenation without a framing envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborSerializer;

impl CborSerializer {
    /// Creates a new CBOR serializer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Serializer for CborSerializer {
    fn write<T: Serialize>(&self, value: &T, out: &mut dyn Write) -> EngineResult<()> {
        ciborium::into_writer(value, out)
            .map_err(|e| EngineError::serialization(e.to_string()))
    }

    fn read<T: DeserializeOwned>(&self, input: &mut dyn Read) -> EngineResult<T> {
        ciborium::from_reader(input).map_err(|e| EngineError::serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Cursor;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        id: u64,
        name: String,
    }

    #[test]
    fn value_round_trip() {
        let serializer = CborSerializer::new();
        let record = Record {
            id: 7,
            name: "seven".into(),
        };

        let mut buf = Vec::new();
        serializer.write(&record, &mut buf).unwrap();

        let decoded: Record = serializer.read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn sequence_reads_concatenated_values() {
        let serializer = CborSerializer::new();
        let mut buf = Vec::new();
        for id in 0..5u64 {
            serializer
                .write(
                    &Record {
                        id,
                        name: format!("r{id}"),
                    },
                    &mut buf,
                )
                .unwrap();
        }

        let records: Vec<Record> = serializer
            .read_sequence(Cursor::new(buf))
            .collect::<EngineResult<_>>()
            .unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[4].id, 4);
    }

    #[test]
    fn sequence_on_empty_stream_is_empty() {
        let serializer = CborSerializer::new();
        let records: Vec<EngineResult<Record>> =
            serializer.read_sequence(Cursor::new(Vec::new())).collect();
        assert!(records.is_empty());
    }

    #[test]
    fn truncated_value_is_an_error_not_eof() {
        let serializer = CborSerializer::new();
        let mut buf = Vec::new();
        serializer
            .write(
                &Record {
                    id: 1,
                    name: "x".into(),
                },
                &mut buf,
            )
            .unwrap();
        buf.truncate(buf.len() - 1);

        let items: Vec<EngineResult<Record>> =
            serializer.read_sequence(Cursor::new(buf)).collect();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }
}
