//! Flow-controlled in-memory byte stream.
//!
//! A [`ByteStream`] is a bounded FIFO of bytes with a writer side and a
//! reader side.  The writer appends bytes and eventually signals
//! end-of-input; the reader peeks, pops, and observes EOF once the input has
//! ended *and* the buffer has drained.  Both halves of a TCP connection are
//! built on top of this: the send side segments its outbound [`ByteStream`],
//! and the receive side's reassembler writes into an inbound one.
//!
//! The stream never blocks.  `write` accepts as many bytes as fit in the
//! remaining capacity and reports how many it took; the caller decides what
//! to do with the rest.

use std::collections::VecDeque;

use thiserror::Error;

/// Errors arising from byte-stream API misuse.
///
/// Network input never produces these; they indicate a caller bug.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    /// `pop_output` was asked to remove more bytes than are buffered.
    #[error("cannot pop {requested} bytes, only {buffered} buffered")]
    PopExceedsBuffer { requested: usize, buffered: usize },
}

/// A bounded byte FIFO with end-of-input and error latches.
#[derive(Debug)]
pub struct ByteStream {
    buffer: VecDeque<u8>,
    capacity: usize,
    bytes_written: u64,
    bytes_read: u64,
    input_ended: bool,
    error: bool,
}

impl ByteStream {
    /// Create a stream that buffers at most `capacity` bytes at a time.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            bytes_written: 0,
            bytes_read: 0,
            input_ended: false,
            error: false,
        }
    }

    // -----------------------------------------------------------------------
    // Writer side
    // -----------------------------------------------------------------------

    /// Append as much of `data` as fits in the remaining capacity.
    ///
    /// Returns the number of bytes accepted.  Returns 0 once the input has
    /// ended or the stream has errored.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if self.input_ended || self.error {
            return 0;
        }
        let n = data.len().min(self.remaining_capacity());
        self.buffer.extend(&data[..n]);
        self.bytes_written += n as u64;
        n
    }

    /// Signal that nothing more will be written.  Idempotent.
    pub fn end_input(&mut self) {
        self.input_ended = true;
    }

    /// Put the stream into the error state.  Idempotent and one-way.
    pub fn set_error(&mut self) {
        self.error = true;
    }

    // -----------------------------------------------------------------------
    // Reader side
    // -----------------------------------------------------------------------

    /// Copy out up to `len` bytes from the head of the buffer without
    /// removing them.
    pub fn peek_output(&self, len: usize) -> Vec<u8> {
        let n = len.min(self.buffer.len());
        self.buffer.iter().take(n).copied().collect()
    }

    /// Remove `len` bytes from the head of the buffer.
    ///
    /// Fails when `len` exceeds the buffered length; the stream is left
    /// untouched in that case.
    pub fn pop_output(&mut self, len: usize) -> Result<(), StreamError> {
        if len > self.buffer.len() {
            return Err(StreamError::PopExceedsBuffer {
                requested: len,
                buffered: self.buffer.len(),
            });
        }
        self.buffer.drain(..len);
        self.bytes_read += len as u64;
        Ok(())
    }

    /// Remove and return up to `len` bytes from the head of the buffer.
    pub fn read(&mut self, len: usize) -> Vec<u8> {
        let n = len.min(self.buffer.len());
        let out: Vec<u8> = self.buffer.drain(..n).collect();
        self.bytes_read += n as u64;
        out
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Number of bytes currently buffered.
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// `true` when no bytes are buffered.
    pub fn buffer_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// `true` when the input has ended and every byte has been read.
    pub fn eof(&self) -> bool {
        self.input_ended && self.buffer.is_empty()
    }

    /// Total bytes ever accepted by `write`.  Monotonic.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Total bytes ever removed by `read`/`pop_output`.  Monotonic.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Bytes that `write` could accept right now.
    pub fn remaining_capacity(&self) -> usize {
        self.capacity - self.buffer.len()
    }

    /// `true` once `end_input` has been called.
    pub fn input_ended(&self) -> bool {
        self.input_ended
    }

    /// `true` once `set_error` has been called.
    pub fn error(&self) -> bool {
        self.error
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
