//! Block- and section-level representations shared between the encoder and
//! the decoder: block headers, literals sections, and sequence sections.
//!
//! <https://github.com/facebook/zstd/blob/dev/doc/zstd_compression_format.md#blocks>

pub mod block;
pub mod literals_section;
pub mod sequence_section;

pub use literals_section::LiteralsSectionParseError;
pub use sequence_section::SequencesHeaderParseError;

/// Blocks cannot be larger than 128KB in size, regardless of window size.
pub const MAX_BLOCK_SIZE: u32 = 128 * 1024;
