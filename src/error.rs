//! Crate-wide error taxonomy.
//!
//! Each subsystem defines its own `thiserror`-derived error enum close to
//! where it is raised (`fse::FSETableError`, `huff0::HuffmanTableError`,
//! `blocks::LiteralsSectionParseError`, `blocks::SequencesHeaderParseError`,
//! `frame::FrameHeaderError`, `frame_decoder::FrameDecoderError`,
//! `encoding::frame_compressor::FrameCompressorError`). [`ZstdError`]
//! aggregates them for callers that only need a single top-level error
//! type, mirroring the tag taxonomy of the reference implementation
//! (`prefix_unknown`, `corruption_detected`, `dictionary_wrong`, ...)
//! without its sentinel-integer encoding.

use crate::blocks::{LiteralsSectionParseError, SequencesHeaderParseError};
use crate::frame::{FrameDescriptorError, FrameHeaderError};
use crate::frame_decoder::FrameDecoderError;
use crate::fse::FSETableError;
use crate::huff0::HuffmanTableError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ZstdError {
    #[error(transparent)]
    FrameHeader(#[from] FrameHeaderError),
    #[error(transparent)]
    FrameDescriptor(#[from] FrameDescriptorError),
    #[error(transparent)]
    FrameDecoder(#[from] FrameDecoderError),
    #[error(transparent)]
    LiteralsSection(#[from] LiteralsSectionParseError),
    #[error(transparent)]
    SequencesHeader(#[from] SequencesHeaderParseError),
    #[error(transparent)]
    FSETable(#[from] FSETableError),
    #[error(transparent)]
    HuffmanTable(#[from] HuffmanTableError),
    #[error("frame is corrupted: {0}")]
    Corruption(alloc::string::String),
    #[error("checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    ChecksumWrong { expected: u32, computed: u32 },
    #[error("declared dictionary id {declared:#010x} does not match the attached dictionary's id {attached:#010x}")]
    DictionaryWrong { declared: u32, attached: u32 },
}
