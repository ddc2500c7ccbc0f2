//! Drives block splitting, matching and entropy coding to turn a byte slice
//! into a single Zstandard frame.

use crate::blocks::block::BlockType;
use crate::blocks::sequence_section::{ll_code, ml_code, of_code, Sequence as WireSequence};
use crate::blocks::MAX_BLOCK_SIZE;
use crate::encoding::bit_writer::BitWriter;
use crate::encoding::block_header::BlockHeader;
use crate::encoding::frame_header::FrameHeader;
use crate::encoding::match_generator::MatchGeneratorDriver;
use crate::encoding::{Matcher, Sequence};
use crate::fse::fse_encoder;
use crate::huff0::huff0_encoder::HuffmanTable;
use alloc::vec::Vec;

/// The compression mode used impacts the speed of compression and the
/// resulting compression ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    /// Wraps the data in a valid Zstandard frame without looking for matches.
    Uncompressed,
    /// Runs this crate's single greedy/lazy matcher and entropy-codes its
    /// output with predefined FSE tables and a Huffman-coded literals stream.
    #[default]
    Fastest,
}

/// Knobs for [`FrameCompressor::compress`] and [`crate::mt::compress`].
#[derive(Debug, Clone, Copy)]
pub struct CompressionParameters {
    pub level: CompressionLevel,
    /// `log2` of the match window. Clamped to at least 10 (1KiB).
    pub window_log: u8,
    /// Whether to append a 4-byte XXH64-derived content checksum. Has no
    /// effect if this crate was built without the `hash` feature.
    pub checksum: bool,
    /// How much of the window adjacent [`crate::mt`] jobs share as match
    /// history, `0..=9`. `0` shares `window_size / 256`, `9` shares the full
    /// window; see [`overlap_size`]. Unused outside the `mt` feature.
    pub overlap_log: u8,
    /// Whether [`crate::mt`] should cut jobs at content-defined boundaries
    /// instead of fixed sizes, so a shared suffix/prefix between two inputs
    /// tends to reproduce matching job boundaries. Unused outside the `mt`
    /// feature.
    pub rsyncable: bool,
}

impl Default for CompressionParameters {
    fn default() -> Self {
        CompressionParameters {
            level: CompressionLevel::default(),
            window_log: 17,
            checksum: false,
            overlap_log: 6,
            rsyncable: false,
        }
    }
}

/// The number of trailing bytes of one [`crate::mt`] job's input that the
/// next job's matcher is primed with, derived from `overlap_log` (`0..=9`)
/// and the frame's `window_size`.
///
/// `overlap_log` selects a fraction of the window on a geometric scale:
/// `0` maps to `window_size / 256`, and each step up halves the divisor,
/// so `8` and `9` both saturate at the full window.
pub(crate) fn overlap_size(window_size: u64, overlap_log: u8) -> usize {
    let divisor = 256u64 >> overlap_log.min(8);
    (window_size / divisor.max(1)) as usize
}

/// Compresses a single in-memory buffer into a single Zstandard frame.
pub struct FrameCompressor<'input> {
    uncompressed_data: &'input [u8],
    params: CompressionParameters,
}

impl<'input> FrameCompressor<'input> {
    pub fn new(uncompressed_data: &'input [u8], params: CompressionParameters) -> Self {
        FrameCompressor {
            uncompressed_data,
            params,
        }
    }

    /// Compress into a freshly allocated buffer holding a complete Zstandard frame.
    pub fn compress(&self) -> Vec<u8> {
        let mut output = Vec::new();

        // Clamped below 29 so every reachable match offset's code fits the
        // 29-entry Predefined offset distribution this crate encodes with.
        let window_log = self.params.window_log.clamp(10, 28);
        let window_size = 1u64 << window_log;
        let total = self.uncompressed_data.len() as u64;
        let emit_checksum = self.params.checksum && cfg!(feature = "hash");

        let header = FrameHeader {
            frame_content_size: Some(total),
            single_segment: total <= window_size,
            content_checksum: emit_checksum,
            dictionary_id: None,
            window_size: Some(window_size),
        };
        header.serialize(&mut output);

        if self.uncompressed_data.is_empty() {
            let bh = BlockHeader {
                last_block: true,
                block_type: BlockType::Raw,
                block_size: 0,
            };
            output.extend_from_slice(&bh.serialize().expect("zero always fits"));
        } else {
            match self.params.level {
                CompressionLevel::Uncompressed => self.compress_stored(&mut output),
                CompressionLevel::Fastest => self.compress_matched(window_size, &mut output),
            }
        }

        if emit_checksum {
            #[cfg(feature = "hash")]
            {
                let hash = twox_hash::XxHash64::oneshot(0, self.uncompressed_data);
                output.extend_from_slice(&(hash as u32).to_le_bytes());
            }
        }

        output
    }

    fn compress_stored(&self, output: &mut Vec<u8>) {
        compress_stored_blocks(self.uncompressed_data, true, output);
    }

    fn compress_matched(&self, window_size: u64, output: &mut Vec<u8>) {
        compress_matched_blocks(self.uncompressed_data, &[], window_size, true, output);
    }
}

/// Stores `data` as a run of Raw blocks, without looking for matches.
///
/// `final_chunk` marks whether `data` is the last (or only) piece of a frame,
/// so only its final block gets `last_block` set — used both by
/// [`FrameCompressor`] itself and by [`crate::mt`]'s per-job compression.
pub(crate) fn compress_stored_blocks(data: &[u8], final_chunk: bool, output: &mut Vec<u8>) {
    let block_size = MAX_BLOCK_SIZE as usize;
    let total = data.len();
    let mut offset = 0;
    while offset < total {
        let this_len = block_size.min(total - offset);
        let last_block = final_chunk && offset + this_len >= total;
        let bh = BlockHeader {
            last_block,
            block_type: BlockType::Raw,
            block_size: this_len as u32,
        };
        output.extend_from_slice(&bh.serialize().expect("bounded by MAX_BLOCK_SIZE"));
        output.extend_from_slice(&data[offset..offset + this_len]);
        offset += this_len;
    }
}

/// Matches and entropy-codes `data` into a run of blocks. See
/// [`compress_stored_blocks`] for the meaning of `final_chunk`.
///
/// `prefix` primes the matcher's window with bytes that exist in the output
/// stream immediately before `data` (the previous [`crate::mt`] job's tail)
/// without emitting any sequences for them, so matches found in `data` can
/// legally reach back into `prefix` on decode. Pass `&[]` outside `mt`.
pub(crate) fn compress_matched_blocks(
    data: &[u8],
    prefix: &[u8],
    window_size: u64,
    final_chunk: bool,
    output: &mut Vec<u8>,
) {
    let total = data.len();
    let block_size = (MAX_BLOCK_SIZE as usize)
        .min(window_size as usize)
        .min(total.max(1));
    let max_window = (window_size as usize)
        .max(block_size)
        .max(prefix.len());
    let mut driver = MatchGeneratorDriver::new(block_size, max_window);

    if !prefix.is_empty() {
        let mut space = driver.get_next_space();
        space.resize(prefix.len(), 0);
        space.copy_from_slice(prefix);
        driver.commit_space(space);
        driver.skip_matching();
    }

    let mut offset = 0;
    while offset < total {
        let this_len = block_size.min(total - offset);
        let last_block = final_chunk && offset + this_len >= total;
        let raw_block = &data[offset..offset + this_len];

        let mut space = driver.get_next_space();
        space.resize(this_len, 0);
        space.copy_from_slice(raw_block);
        driver.commit_space(space);

        let mut literals = Vec::new();
        let mut sequences = Vec::new();
        driver.start_matching(|seq| match seq {
            Sequence::Triple {
                literals: lits,
                offset: match_offset,
                match_len,
            } => {
                literals.extend_from_slice(lits);
                sequences.push(WireSequence {
                    ll: lits.len() as u32,
                    ml: match_len as u32,
                    of: (match_offset + 3) as u32,
                });
            }
            Sequence::Literals { literals: lits } => literals.extend_from_slice(lits),
        });

        write_block(raw_block, &literals, &sequences, last_block, output);
        offset += this_len;
    }
}

/// Builds one block's literals and sequences sections, falling back to a
/// stored (uncompressed) block if that turns out smaller.
fn write_block(
    raw_block: &[u8],
    literals: &[u8],
    sequences: &[WireSequence],
    last_block: bool,
    output: &mut Vec<u8>,
) {
    let mut content = Vec::new();
    write_literals_section(literals, &mut content);
    write_sequences_section(sequences, &mut content);

    if content.len() >= raw_block.len() {
        let bh = BlockHeader {
            last_block,
            block_type: BlockType::Raw,
            block_size: raw_block.len() as u32,
        };
        output.extend_from_slice(&bh.serialize().expect("bounded by MAX_BLOCK_SIZE"));
        output.extend_from_slice(raw_block);
    } else {
        let bh = BlockHeader {
            last_block,
            block_type: BlockType::Compressed,
            block_size: content.len() as u32,
        };
        output.extend_from_slice(&bh.serialize().expect("bounded by MAX_BLOCK_SIZE"));
        output.extend_from_slice(&content);
    }
}

/// Single-stream Huffman coding is only attempted below this size, since the
/// Compressed literals header this encoder writes only has 10 bits for each
/// of the regenerated/compressed sizes.
const MAX_SINGLE_STREAM_LITERALS: usize = 1023;

fn write_literals_section(literals: &[u8], out: &mut Vec<u8>) {
    if !literals.is_empty() && literals.iter().all(|&b| b == literals[0]) {
        write_raw_or_rle_header(1, literals.len() as u32, out);
        out.push(literals[0]);
        return;
    }

    if !literals.is_empty() && literals.len() <= MAX_SINGLE_STREAM_LITERALS {
        let mut counts = [0u32; 256];
        for &b in literals {
            counts[b as usize] += 1;
        }
        let (table, weights) = HuffmanTable::build_from_counts(&counts);

        let mut bw = BitWriter::new();
        table.encode(literals, &mut bw);
        let body = bw.close();

        let mut header_tables = Vec::new();
        HuffmanTable::write_header(&weights, &mut header_tables);

        let compressed_size = header_tables.len() + body.len();
        if compressed_size < literals.len() {
            write_compressed_header(literals.len() as u32, compressed_size as u32, out);
            out.extend_from_slice(&header_tables);
            out.extend_from_slice(&body);
            return;
        }
    }

    write_raw_or_rle_header(0, literals.len() as u32, out);
    out.extend_from_slice(literals);
}

/// Shared header layout of the Raw (`ty = 0`) and RLE (`ty = 1`) literals
/// section types, mirroring [`crate::blocks::literals_section::LiteralsSection::parse_from_header`].
fn write_raw_or_rle_header(ty: u8, regen: u32, out: &mut Vec<u8>) {
    if regen < 32 {
        out.push(ty | ((regen as u8) << 3));
    } else if regen < 4096 {
        out.push(ty | (1 << 2) | (((regen & 0xF) as u8) << 4));
        out.push(((regen >> 4) & 0xFF) as u8);
    } else {
        out.push(ty | (3 << 2) | (((regen & 0xF) as u8) << 4));
        out.push(((regen >> 4) & 0xFF) as u8);
        out.push(((regen >> 12) & 0xFF) as u8);
    }
}

/// The Compressed literals header (`ty = 2`), always written with
/// `size_format = 0` (a single Huffman stream), so both sizes are limited to
/// 10 bits each.
fn write_compressed_header(regen: u32, compressed: u32, out: &mut Vec<u8>) {
    out.push(2 | (((regen & 0xF) as u8) << 4));
    out.push((((regen >> 4) & 0x3F) as u8) | (((compressed & 0x3) as u8) << 6));
    out.push(((compressed >> 2) & 0xFF) as u8);
}

fn write_sequences_section(sequences: &[WireSequence], out: &mut Vec<u8>) {
    write_num_sequences(sequences.len() as u32, out);
    if sequences.is_empty() {
        return;
    }
    out.push(0); // compression modes: Predefined for literal lengths, offsets and match lengths
    out.extend_from_slice(&write_sequences_body(sequences));
}

/// Mirrors [`crate::blocks::sequence_section::SequencesHeader::parse_from_header`] in reverse.
fn write_num_sequences(n: u32, out: &mut Vec<u8>) {
    if n == 0 {
        out.push(0);
    } else if n < 128 {
        out.push(n as u8);
    } else if n < 0x7F00 {
        out.push((128 + (n >> 8)) as u8);
        out.push((n & 0xFF) as u8);
    } else {
        out.push(255);
        let rem = n - 0x7F00;
        out.push((rem & 0xFF) as u8);
        out.push(((rem >> 8) & 0xFF) as u8);
    }
}

/// Interleaves the three Predefined-mode FSE bitstreams the way
/// [`crate::decoding::sequence_section_decoder::decode_sequences`] expects to
/// read them back: sequences are folded in from last to first, each
/// contributing its extra bits (literal length, offset, match length) and
/// then its FSE symbols (literal length, offset, match length), and the
/// three final states are flushed (literal length, offset, match length)
/// once every sequence has been folded in.
fn write_sequences_body(sequences: &[WireSequence]) -> Vec<u8> {
    let mut ll_enc = fse_encoder::default_ll_table();
    let mut of_enc = fse_encoder::default_of_table();
    let mut ml_enc = fse_encoder::default_ml_table();
    let mut bw = BitWriter::new();

    for seq in sequences.iter().rev() {
        let (ll_symbol, ll_bits, ll_extra) = ll_code(seq.ll);
        let (of_symbol, of_bits, of_extra) = of_code(seq.of);
        let (ml_symbol, ml_bits, ml_extra) = ml_code(seq.ml);

        bw.write_bits(ll_extra as u64, ll_bits as usize);
        bw.write_bits(of_extra as u64, of_bits as usize);
        bw.write_bits(ml_extra as u64, ml_bits as usize);

        ll_enc.encode_symbol(ll_symbol, &mut bw);
        of_enc.encode_symbol(of_symbol, &mut bw);
        ml_enc.encode_symbol(ml_symbol, &mut bw);
    }

    ll_enc.flush_state(&mut bw);
    of_enc.flush_state(&mut bw);
    ml_enc.flush_state(&mut bw);

    bw.close()
}

#[cfg(test)]
mod tests {
    use super::{CompressionLevel, CompressionParameters, FrameCompressor};
    use crate::frame::MAGIC_NUM;
    use crate::{BlockDecodingStrategy, FrameDecoder};
    use alloc::vec;
    use alloc::vec::Vec;

    fn roundtrip(data: &[u8], params: CompressionParameters) {
        let compressed = FrameCompressor::new(data, params).compress();
        let mut cursor = &compressed[..];
        let mut decoder = FrameDecoder::new();
        decoder.init(&mut cursor).unwrap();
        decoder
            .decode_blocks(&mut cursor, BlockDecodingStrategy::All)
            .unwrap();
        assert_eq!(decoder.collect(), data);
    }

    #[test]
    fn frame_starts_with_magic_num() {
        let compressed =
            FrameCompressor::new(&[1, 2, 3], CompressionParameters::default()).compress();
        assert!(compressed.starts_with(&MAGIC_NUM.to_le_bytes()));
    }

    #[test]
    fn roundtrip_empty_uncompressed() {
        roundtrip(
            &[],
            CompressionParameters {
                level: CompressionLevel::Uncompressed,
                ..Default::default()
            },
        );
    }

    #[test]
    fn roundtrip_stored() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        roundtrip(
            &data,
            CompressionParameters {
                level: CompressionLevel::Uncompressed,
                ..Default::default()
            },
        );
    }

    #[test]
    fn roundtrip_matched_small() {
        roundtrip(
            b"the quick brown fox jumps over the lazy dog",
            CompressionParameters::default(),
        );
    }

    #[test]
    fn roundtrip_matched_repetitive() {
        let data = vec![b'A'; 1 << 18];
        let compressed = FrameCompressor::new(&data, CompressionParameters::default()).compress();
        assert!(compressed.len() < 200);
        roundtrip(&data, CompressionParameters::default());
    }

    #[test]
    fn roundtrip_matched_multi_block() {
        let mut data = Vec::new();
        for i in 0..400_000u32 {
            data.push((i % 200) as u8);
        }
        roundtrip(&data, CompressionParameters::default());
    }

    #[test]
    fn roundtrip_with_checksum() {
        roundtrip(
            b"checksum me please",
            CompressionParameters {
                checksum: true,
                ..Default::default()
            },
        );
    }
}
