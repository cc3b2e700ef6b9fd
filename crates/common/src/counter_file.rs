//! Read/write protocol of a counter file
//!
//! Reading a counter file yields its value as decimal text followed by a
//! newline, and advances the counter. Writing decimal text replaces the value.
//!
//! # Read sequences
//!
//! A read at offset 0 starts a new sequence: it reports the current value `v`
//! and increments the counter once. A caller with a small buffer continues at
//! a non-zero offset; those continuation reads format `get() - 1`, which is
//! again `v` because the counter moved by exactly one in between. Each open
//! handle therefore sees one consistent value per sequence even though the
//! counter itself keeps moving.
//!
//! # Staging buffer
//!
//! All text crosses the caller boundary through a fixed [`STAGING_CAPACITY`]
//! byte buffer, one byte of which is reserved for a terminator. Writes of
//! `STAGING_CAPACITY` bytes or more are rejected.

use std::fmt::{self, Write as _};

use crate::counter_store::{CounterEntry, CounterId, CounterStore};
use crate::node::Node;

/// Size of the scratch buffer used for formatting and parsing
pub const STAGING_CAPACITY: usize = 64;

/// The byte copy between caller memory and the staging buffer failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("bad address")]
pub struct TransferError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CounterFileError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error("is a directory")]
    IsADirectory,
    #[error("{0} is not bound to this instance")]
    Unbound(CounterId),
}

/// Caller memory that read data is copied into
pub trait TransferSink {
    fn copy_out(&mut self, src: &[u8]) -> Result<(), TransferError>;
}

/// Caller memory that written data is copied from
pub trait TransferSource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `dst` from the start of the source; `dst.len() <= self.len()`
    fn copy_in(&self, dst: &mut [u8]) -> Result<(), TransferError>;
}

impl TransferSink for Vec<u8> {
    fn copy_out(&mut self, src: &[u8]) -> Result<(), TransferError> {
        self.extend_from_slice(src);
        Ok(())
    }
}

/// Fixed caller buffer: copies that do not fit fail
impl TransferSink for [u8] {
    fn copy_out(&mut self, src: &[u8]) -> Result<(), TransferError> {
        self.get_mut(..src.len())
            .ok_or(TransferError)?
            .copy_from_slice(src);
        Ok(())
    }
}

impl TransferSource for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_in(&self, dst: &mut [u8]) -> Result<(), TransferError> {
        dst.copy_from_slice(self.get(..dst.len()).ok_or(TransferError)?);
        Ok(())
    }
}

/// Bounded scratch buffer holding formatted counter text
#[derive(Debug)]
pub struct StagingBuffer {
    bytes: [u8; STAGING_CAPACITY],
    len: usize,
}

impl Default for StagingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl StagingBuffer {
    pub fn new() -> Self {
        Self {
            bytes: [0; STAGING_CAPACITY],
            len: 0,
        }
    }

    /// Format `value` as decimal digits and a newline, replacing the contents
    pub fn format(&mut self, value: i64) -> Result<usize, fmt::Error> {
        self.bytes = [0; STAGING_CAPACITY];
        self.len = 0;
        writeln!(self, "{}", value)?;
        Ok(self.len)
    }

    /// Formatted bytes, excluding the terminator
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Write for StagingBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // Keep room for the terminator
        let end = self.len + s.len();
        if end >= STAGING_CAPACITY {
            return Err(fmt::Error);
        }
        self.bytes[self.len..end].copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}

/// Parse a base-10 integer the way `simple_strtol` does.
///
/// An optional sign is followed by the longest run of digits. No digits
/// yields 0, anything after the digits is ignored, and overflow wraps.
pub fn parse_decimal(bytes: &[u8]) -> i64 {
    let (negative, digits) = match bytes.first() {
        Some(b'-') => (true, &bytes[1..]),
        Some(b'+') => (false, &bytes[1..]),
        _ => (false, bytes),
    };

    let magnitude = digits
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .fold(0i64, |acc, b| {
            acc.wrapping_mul(10).wrapping_add(i64::from(b - b'0'))
        });

    if negative {
        magnitude.wrapping_neg()
    } else {
        magnitude
    }
}

/// Per-open state of a counter file
#[derive(Debug, Clone)]
pub struct CounterHandle {
    entry: CounterEntry,
    offset: u64,
}

impl CounterHandle {
    /// Bind a handle to the counter behind `node`
    pub fn open(node: &Node, store: &CounterStore) -> Result<Self, CounterFileError> {
        let id = node.counter().ok_or(CounterFileError::IsADirectory)?;
        let entry = store.entry(id).ok_or(CounterFileError::Unbound(id))?;
        Ok(Self::bind(entry.clone()))
    }

    pub fn bind(entry: CounterEntry) -> Self {
        Self { entry, offset: 0 }
    }

    /* Getters */

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn entry(&self) -> &CounterEntry {
        &self.entry
    }

    /// Move to a caller-supplied position
    pub fn seek(&mut self, offset: u64) {
        self.offset = offset;
    }

    /// Copy up to `count` bytes of the counter text into `sink`.
    ///
    /// Returns the number of bytes copied; 0 means end of data. Nothing is
    /// mutated when the copy fails.
    pub fn read<S>(&mut self, sink: &mut S, count: usize) -> Result<usize, CounterFileError>
    where
        S: TransferSink + ?Sized,
    {
        let fresh = self.offset == 0;
        let current = self.entry.get();
        let value = if fresh {
            current
        } else {
            current.wrapping_sub(1)
        };

        let mut staging = StagingBuffer::new();
        let len = staging
            .format(value)
            .map_err(|_| CounterFileError::InvalidArgument("value exceeds staging buffer"))?
            as u64;

        if self.offset >= len {
            return Ok(0);
        }

        let start = self.offset as usize;
        let copied = count.min(len as usize - start);
        sink.copy_out(&staging.as_bytes()[start..start + copied])?;

        if fresh {
            self.entry.increment();
        }
        self.offset += copied as u64;
        Ok(copied)
    }

    /// Replace the counter with the integer parsed from `src`.
    ///
    /// Only whole writes at offset 0 that fit the staging buffer are
    /// accepted. Returns the number of bytes consumed.
    pub fn write<S>(&mut self, src: &S) -> Result<usize, CounterFileError>
    where
        S: TransferSource + ?Sized,
    {
        if self.offset != 0 {
            return Err(CounterFileError::InvalidArgument(
                "writes must start at offset 0",
            ));
        }

        let count = src.len();
        if count >= STAGING_CAPACITY {
            return Err(CounterFileError::InvalidArgument(
                "write exceeds staging buffer",
            ));
        }

        let mut staging = [0u8; STAGING_CAPACITY];
        src.copy_in(&mut staging[..count])?;

        self.entry.set(parse_decimal(&staging));
        Ok(count)
    }
}
