//! Modules used for compressing/encoding data into the Zstd format.

pub mod bit_writer;
pub mod block_header;
pub mod frame_compressor;
pub mod frame_header;
pub(crate) mod match_generator;
pub(crate) mod util;

use alloc::vec::Vec;
pub(crate) use match_generator::Sequence;

/// A source of literal/match sequences for a block, abstracting over how a
/// matcher buffers and reuses the working space it matches against.
pub(crate) trait Matcher {
    /// Get a (possibly reused) buffer to fill with the next chunk of input.
    fn get_next_space(&mut self) -> Vec<u8>;
    /// Hand a filled buffer back to the matcher, adding it to its window.
    fn commit_space(&mut self, space: Vec<u8>);
    /// Drain every sequence the matcher can produce for the most recently
    /// committed space, calling `handle_sequence` once per sequence.
    fn start_matching(&mut self, handle_sequence: impl for<'a> FnMut(Sequence<'a>));
    /// Mark the most recently committed space as all-literal without
    /// spending time looking for matches in it.
    fn skip_matching(&mut self);
}
