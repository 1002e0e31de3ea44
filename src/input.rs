//! Sources of bytes for the pull-based `Tokenizer`.
//!
//! Input arrives in chunks so that a large document read from a socket is
//! never buffered whole. A slice hands out views into itself, which lets
//! atoms borrow from the input; a reader reuses one buffer, so anything the
//! tokenizer keeps from it is copied.

use std::borrow::Cow;
use std::io;
use std::ops::Range;

use crate::error::{Error, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 4096;

pub trait Input<'de>: private::Sealed {
    /// Advances to the next chunk.
    fn next_chunk(&mut self) -> Result<InputChunk<'_>>;

    /// The chunk `next_chunk` last returned, empty once the input is done.
    fn last_chunk<'s>(&'s self) -> InputRef<'de, 's>;
}

mod private {
    pub trait Sealed {}
}

pub enum InputChunk<'t> {
    Data(&'t [u8]),
    Eof,
}

/// Bytes that either live as long as the whole input (`'de`) or only until
/// the next chunk is read (`'t`).
#[derive(Debug)]
pub enum InputRef<'de, 't> {
    Borrowed(&'de [u8]),
    Transient(&'t [u8]),
}

impl<'de, 't> InputRef<'de, 't> {
    pub fn index(&self, range: Range<usize>) -> InputRef<'de, 't> {
        match *self {
            InputRef::Borrowed(bytes) => InputRef::Borrowed(&bytes[range]),
            InputRef::Transient(bytes) => InputRef::Transient(&bytes[range]),
        }
    }

    pub fn into_cow(self) -> Cow<'de, [u8]> {
        match self {
            InputRef::Borrowed(bytes) => Cow::Borrowed(bytes),
            InputRef::Transient(bytes) => Cow::Owned(bytes.to_vec()),
        }
    }
}

/// Walks a byte slice `chunk_size` bytes at a time.
pub struct SliceInput<'de> {
    bytes: &'de [u8],
    chunk_size: usize,
    // Range of `bytes` returned by the last `next_chunk`.
    start: usize,
    end: usize,
    done: bool,
}

impl<'de> SliceInput<'de> {
    pub fn new(bytes: &'de [u8]) -> Self {
        Self::new_with_chunk_size(bytes, DEFAULT_CHUNK_SIZE)
    }

    /// Panics if `chunk_size` is zero.
    pub fn new_with_chunk_size(bytes: &'de [u8], chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "SliceInput chunk size must be non-zero");

        SliceInput {
            bytes,
            chunk_size,
            start: 0,
            end: 0,
            done: false,
        }
    }
}

impl private::Sealed for SliceInput<'_> {}

impl<'de> Input<'de> for SliceInput<'de> {
    fn next_chunk(&mut self) -> Result<InputChunk<'_>> {
        if self.done || self.end == self.bytes.len() {
            self.done = true;
            self.start = self.end;
            return Ok(InputChunk::Eof);
        }

        self.start = self.end;
        self.end = usize::min(self.start + self.chunk_size, self.bytes.len());
        Ok(InputChunk::Data(&self.bytes[self.start..self.end]))
    }

    fn last_chunk<'s>(&'s self) -> InputRef<'de, 's> {
        InputRef::Borrowed(&self.bytes[self.start..self.end])
    }
}

/// Reads an `io::Read` into a reused buffer of `chunk_size` bytes.
pub struct ReadInput<R> {
    reader: R,
    buffer: Vec<u8>,
    filled: usize,
    done: bool,
}

impl<R: io::Read> ReadInput<R> {
    pub fn new(reader: R) -> Self {
        Self::new_with_chunk_size(reader, DEFAULT_CHUNK_SIZE)
    }

    /// Panics if `chunk_size` is zero.
    pub fn new_with_chunk_size(reader: R, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "ReadInput chunk size must be non-zero");

        ReadInput {
            reader,
            buffer: vec![0; chunk_size],
            filled: 0,
            done: false,
        }
    }
}

impl<R> private::Sealed for ReadInput<R> {}

impl<'de, R: io::Read> Input<'de> for ReadInput<R> {
    fn next_chunk(&mut self) -> Result<InputChunk<'_>> {
        self.filled = 0;
        if self.done {
            return Ok(InputChunk::Eof);
        }

        let n = loop {
            match self.reader.read(&mut self.buffer) {
                Ok(n) => break n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(Error::Io(err)),
            }
        };

        if n == 0 {
            self.done = true;
            return Ok(InputChunk::Eof);
        }
        self.filled = n;
        Ok(InputChunk::Data(&self.buffer[..n]))
    }

    fn last_chunk<'s>(&'s self) -> InputRef<'de, 's> {
        InputRef::Transient(&self.buffer[..self.filled])
    }
}
