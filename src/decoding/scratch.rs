//! Reusable decode-side workspace, kept across blocks (and across frames,
//! via [`crate::frame_decoder::FrameDecoder::reset`]) so repeated decodes
//! don't repeatedly reallocate tables and buffers.

use super::decodebuffer::Decodebuffer;
use crate::blocks::sequence_section::Sequence;
use crate::fse::FSETable;
use crate::huff0::HuffmanTable;
use alloc::vec::Vec;

pub struct HuffmanScratch {
    pub table: HuffmanTable,
}

impl Default for HuffmanScratch {
    fn default() -> Self {
        Self::new()
    }
}

impl HuffmanScratch {
    pub fn new() -> HuffmanScratch {
        HuffmanScratch {
            table: HuffmanTable::new(),
        }
    }
}

pub struct FSEScratch {
    pub offsets: FSETable,
    pub match_lengths: FSETable,
    pub literal_lengths: FSETable,
}

impl Default for FSEScratch {
    fn default() -> Self {
        Self::new()
    }
}

impl FSEScratch {
    pub fn new() -> FSEScratch {
        FSEScratch {
            offsets: FSETable::new(),
            match_lengths: FSETable::new(),
            literal_lengths: FSETable::new(),
        }
    }
}

pub struct DecoderScratch {
    pub buffer: Decodebuffer,
    pub literals_buffer: Vec<u8>,
    pub block_content_buffer: Vec<u8>,
    pub sequences: Vec<Sequence>,
    pub offset_hist: [u32; 3],
    pub huf: HuffmanScratch,
    pub fse: FSEScratch,
}

impl DecoderScratch {
    pub fn new(window_size: usize) -> DecoderScratch {
        DecoderScratch {
            buffer: Decodebuffer::new(window_size),
            literals_buffer: Vec::new(),
            block_content_buffer: Vec::new(),
            sequences: Vec::new(),
            offset_hist: [1, 4, 8],
            huf: HuffmanScratch::new(),
            fse: FSEScratch::new(),
        }
    }

    /// Reset everything that must not survive into a new frame, while
    /// keeping the `Vec`/table allocations around for reuse.
    pub fn reset(&mut self, window_size: usize) {
        self.buffer.reset(window_size);
        self.literals_buffer.clear();
        self.block_content_buffer.clear();
        self.sequences.clear();
        self.offset_hist = [1, 4, 8];
        self.huf.table.reset();
        self.fse.offsets.reset();
        self.fse.match_lengths.reset();
        self.fse.literal_lengths.reset();
    }
}
