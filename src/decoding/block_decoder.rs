//! Reads block headers and decodes block bodies (Raw, RLE, Compressed) into
//! a [`DecoderScratch`]'s decode buffer.
//!
//! <https://github.com/facebook/zstd/blob/dev/doc/zstd_compression_format.md#blocks>

use super::literals_section_decoder::{decode_literals, DecompressLiteralsError};
use super::scratch::DecoderScratch;
use super::sequence_execution::{execute_sequences, SequenceExecutionError};
use super::sequence_section_decoder::{decode_sequences, SequenceDecodeError};
use crate::blocks::block::{BlockHeader, BlockType};
use crate::blocks::literals_section::{LiteralsSection, LiteralsSectionParseError, LiteralsSectionType};
use crate::blocks::sequence_section::{SequencesHeader, SequencesHeaderParseError};
use crate::blocks::MAX_BLOCK_SIZE;
use crate::io::Read;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BlockDecodeError {
    #[error("tried to decode a block body while a previous error left the decoder unusable")]
    PreviousErrorOccurred,
    #[error("tried to decode a block body while still expecting a header")]
    ExpectedHeader,
    #[error("error reading block content: {0}")]
    ReadError(crate::io::Error),
    #[error("block declares a reserved type, which is considered corruption by the format")]
    ReservedBlocktype,
    #[error("block content size {got} is bigger than the absolute maximum of {max} bytes")]
    BlockTooBig { got: u32, max: u32 },
    #[error(transparent)]
    LiteralsSectionParseError(#[from] LiteralsSectionParseError),
    #[error(transparent)]
    SequencesHeaderParseError(#[from] SequencesHeaderParseError),
    #[error(transparent)]
    DecompressLiteralsError(#[from] DecompressLiteralsError),
    #[error(transparent)]
    SequenceDecodeError(#[from] SequenceDecodeError),
    #[error(transparent)]
    SequenceExecutionError(#[from] SequenceExecutionError),
    #[error("literals section claims {declared} bytes but only {available} remain in the block")]
    NotEnoughBytesForLiterals { declared: usize, available: usize },
    #[error("block content size accounting is inconsistent: parsed {parsed} bytes out of {total}")]
    SizeMismatch { parsed: u32, total: u32 },
}

pub struct BlockDecoder {
    header_buffer: [u8; 3],
    internal_state: DecoderState,
}

enum DecoderState {
    ReadyToDecodeNextHeader,
    ReadyToDecodeNextBody,
    Failed,
}

impl Default for BlockDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDecoder {
    pub fn new() -> BlockDecoder {
        BlockDecoder {
            internal_state: DecoderState::ReadyToDecodeNextHeader,
            header_buffer: [0u8; 3],
        }
    }

    pub fn decode_block_content(
        &mut self,
        header: &BlockHeader,
        workspace: &mut DecoderScratch,
        source: &mut dyn Read,
    ) -> Result<u64, BlockDecodeError> {
        match self.internal_state {
            DecoderState::ReadyToDecodeNextBody => { /* happy */ }
            DecoderState::Failed => return Err(BlockDecodeError::PreviousErrorOccurred),
            DecoderState::ReadyToDecodeNextHeader => return Err(BlockDecodeError::ExpectedHeader),
        }

        let result = self.decode_block_content_inner(header, workspace, source);
        if result.is_err() {
            self.internal_state = DecoderState::Failed;
        } else {
            self.internal_state = DecoderState::ReadyToDecodeNextHeader;
        }
        result
    }

    fn decode_block_content_inner(
        &mut self,
        header: &BlockHeader,
        workspace: &mut DecoderScratch,
        source: &mut dyn Read,
    ) -> Result<u64, BlockDecodeError> {
        match header.block_type {
            BlockType::RLE => {
                let mut byte = [0u8; 1];
                source
                    .read_exact(&mut byte)
                    .map_err(BlockDecodeError::ReadError)?;
                workspace.buffer.reserve(header.decompressed_size as usize);
                const BATCH_SIZE: usize = 512;
                let buf = [byte[0]; BATCH_SIZE];
                let mut remaining = header.decompressed_size as usize;
                while remaining >= BATCH_SIZE {
                    workspace.buffer.push(&buf);
                    remaining -= BATCH_SIZE;
                }
                workspace.buffer.push(&buf[..remaining]);

                Ok(1)
            }
            BlockType::Raw => {
                workspace.block_content_buffer.resize(header.content_size as usize, 0);
                source
                    .read_exact(&mut workspace.block_content_buffer)
                    .map_err(BlockDecodeError::ReadError)?;
                workspace.buffer.push(&workspace.block_content_buffer);
                Ok(header.decompressed_size as u64)
            }

            BlockType::Reserved => Err(BlockDecodeError::ReservedBlocktype),

            BlockType::Compressed => {
                self.decompress_block(header, workspace, source)?;
                Ok(header.content_size as u64)
            }
        }
    }

    fn decompress_block(
        &mut self,
        header: &BlockHeader,
        workspace: &mut DecoderScratch,
        source: &mut dyn Read,
    ) -> Result<(), BlockDecodeError> {
        workspace
            .block_content_buffer
            .resize(header.content_size as usize, 0);
        source
            .read_exact(workspace.block_content_buffer.as_mut_slice())
            .map_err(BlockDecodeError::ReadError)?;

        let raw = workspace.block_content_buffer.as_slice();

        let mut section = LiteralsSection::new();
        let bytes_in_literals_header = section.parse_from_header(raw)?;
        let raw = &raw[bytes_in_literals_header as usize..];
        tracing::trace!(
            ls_type = %section.ls_type,
            regenerated_size = section.regenerated_size,
            compressed_size = ?section.compressed_size,
            "parsed literals section header"
        );

        let upper_limit_for_literals = match section.compressed_size {
            Some(x) => x as usize,
            None => match section.ls_type {
                LiteralsSectionType::RLE => 1,
                LiteralsSectionType::Raw => section.regenerated_size as usize,
                _ => unreachable!("RLE/Raw are the only types without a declared compressed_size"),
            },
        };

        if raw.len() < upper_limit_for_literals {
            return Err(BlockDecodeError::NotEnoughBytesForLiterals {
                declared: upper_limit_for_literals,
                available: raw.len(),
            });
        }

        let raw_literals = &raw[..upper_limit_for_literals];

        workspace.literals_buffer.clear();
        let bytes_used_in_literals_section = decode_literals(
            &section,
            &mut workspace.huf,
            raw_literals,
            &mut workspace.literals_buffer,
        )?;
        debug_assert_eq!(section.regenerated_size, workspace.literals_buffer.len() as u32);
        debug_assert_eq!(bytes_used_in_literals_section, upper_limit_for_literals as u32);

        let raw = &raw[upper_limit_for_literals..];

        let mut seq_section = SequencesHeader::new();
        let bytes_in_sequence_header = seq_section.parse_from_header(raw)?;
        let raw = &raw[bytes_in_sequence_header as usize..];
        tracing::trace!(
            num_sequences = seq_section.num_sequences,
            remaining_bytes = raw.len(),
            "parsed sequences section header"
        );

        let parsed = bytes_in_literals_header as u32
            + bytes_used_in_literals_section
            + bytes_in_sequence_header as u32
            + raw.len() as u32;
        if parsed != header.content_size {
            return Err(BlockDecodeError::SizeMismatch {
                parsed,
                total: header.content_size,
            });
        }

        if seq_section.num_sequences != 0 {
            decode_sequences(&seq_section, raw, &mut workspace.fse, &mut workspace.sequences)?;
            execute_sequences(workspace)?;
        } else {
            workspace.buffer.push(&workspace.literals_buffer);
            workspace.sequences.clear();
        }

        Ok(())
    }

    pub fn read_block_header(
        &mut self,
        r: &mut dyn Read,
    ) -> Result<(BlockHeader, u8), BlockDecodeError> {
        r.read_exact(&mut self.header_buffer)
            .map_err(BlockDecodeError::ReadError)?;

        let btype = match self.block_type() {
            BlockType::Reserved => return Err(BlockDecodeError::ReservedBlocktype),
            t => t,
        };

        let block_size = self.block_content_size()?;
        let decompressed_size = match btype {
            BlockType::Raw | BlockType::RLE => block_size,
            // unknown until decompressed, but bounded by MAX_BLOCK_SIZE (or a
            // smaller window size)
            BlockType::Compressed | BlockType::Reserved => 0,
        };
        let content_size = match btype {
            BlockType::Raw | BlockType::Compressed => block_size,
            BlockType::RLE => 1,
            BlockType::Reserved => 0,
        };

        let last_block = self.is_last();

        self.reset_buffer();
        self.internal_state = DecoderState::ReadyToDecodeNextBody;

        Ok((
            BlockHeader {
                last_block,
                block_type: btype,
                decompressed_size,
                content_size,
            },
            3,
        ))
    }

    fn reset_buffer(&mut self) {
        self.header_buffer = [0u8; 3];
    }

    fn is_last(&self) -> bool {
        self.header_buffer[0] & 0x1 == 1
    }

    fn block_type(&self) -> BlockType {
        match (self.header_buffer[0] >> 1) & 0x3 {
            0 => BlockType::Raw,
            1 => BlockType::RLE,
            2 => BlockType::Compressed,
            _ => BlockType::Reserved,
        }
    }

    fn block_content_size(&self) -> Result<u32, BlockDecodeError> {
        let val = self.block_content_size_unchecked();
        if val > MAX_BLOCK_SIZE {
            Err(BlockDecodeError::BlockTooBig {
                got: val,
                max: MAX_BLOCK_SIZE,
            })
        } else {
            Ok(val)
        }
    }

    fn block_content_size_unchecked(&self) -> u32 {
        ((self.header_buffer[0] >> 3) as u32)
            | ((self.header_buffer[1] as u32) << 5)
            | ((self.header_buffer[2] as u32) << 13)
    }
}
