//! Holds decompressed output together with the match window the sequence
//! executor reads back-references from.

use super::ringbuffer::RingBuffer;
use alloc::vec::Vec;

pub struct Decodebuffer {
    buffer: RingBuffer,
    window_size: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodebufferError {
    #[error("offset {offset} reaches back further than the {available} bytes decoded so far")]
    OffsetTooFar { offset: usize, available: usize },
}

impl Decodebuffer {
    pub fn new(window_size: usize) -> Decodebuffer {
        Decodebuffer {
            buffer: RingBuffer::new(),
            window_size,
        }
    }

    /// Drop everything and start over with a (possibly different) window size,
    /// reusing the underlying allocation.
    pub fn reset(&mut self, window_size: usize) {
        self.buffer.clear();
        self.window_size = window_size;
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buffer.reserve(data.len());
        self.buffer.extend(data);
    }

    /// Ensure that there's space for `amount` more bytes in the buffer.
    pub fn reserve(&mut self, amount: usize) {
        self.buffer.reserve(amount);
    }

    /// Copy `len` bytes starting `offset` bytes back from the current end of
    /// the decoded stream onto the end again, implementing the sequence
    /// format's match-copy step. `offset` and `len` may overlap, in which
    /// case the copy must behave as if done one byte at a time.
    pub fn repeat(&mut self, offset: usize, len: usize) -> Result<(), DecodebufferError> {
        if offset > self.buffer.len() {
            return Err(DecodebufferError::OffsetTooFar {
                offset,
                available: self.buffer.len(),
            });
        }
        let start = self.buffer.len() - offset;
        self.buffer.extend_from_within(start, len);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// How many bytes could be returned right now if the caller no longer
    /// cared about preserving the match window (i.e. the frame is done).
    pub fn can_drain(&self) -> usize {
        self.buffer.len()
    }

    /// How many bytes can be handed to the caller while still keeping the
    /// trailing `window_size` bytes available for future match copies.
    pub fn can_drain_to_window_size(&self) -> Option<usize> {
        if self.buffer.len() > self.window_size {
            Some(self.buffer.len() - self.window_size)
        } else {
            None
        }
    }

    /// Drain as much as possible while keeping enough history to satisfy the
    /// window size. Best called only once a "high" number of bytes is
    /// reported by [`Self::can_drain_to_window_size`], to reduce allocations.
    pub fn drain_to_window_size(&mut self) -> Option<Vec<u8>> {
        let can_drain = self.can_drain_to_window_size()?;
        Some(self.drain_n(can_drain))
    }

    /// Drain the buffer completely, forgetting any match history.
    pub fn drain(&mut self) -> Vec<u8> {
        let len = self.buffer.len();
        self.drain_n(len)
    }

    fn drain_n(&mut self, amount: usize) -> Vec<u8> {
        let (first, second) = self.buffer.as_slices();
        let mut out = Vec::with_capacity(amount);
        if amount <= first.len() {
            out.extend_from_slice(&first[..amount]);
        } else {
            out.extend_from_slice(first);
            out.extend_from_slice(&second[..amount - first.len()]);
        }
        self.buffer.drop_first_n(amount);
        out
    }

    /// Copy as many bytes as fit into `buf` off the front of the buffer,
    /// dropping them from the window in the process, and return the count.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let amount = buf.len().min(self.buffer.len());
        let drained = self.drain_n(amount);
        buf[..amount].copy_from_slice(&drained);
        amount
    }
}
