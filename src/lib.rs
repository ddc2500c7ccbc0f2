//! Core Zstandard (v1.4.4) frame/block codec.
//!
//! This crate implements the frame and block format, the FSE and Huffman
//! entropy coders, the sequence execution engine, and (with the `mt`
//! feature) a multi-worker compression scheduler. Match-finder heuristics
//! beyond a single conforming matcher, compression-level preset tables,
//! a CLI surface, dictionary training and legacy format support are not
//! part of this crate.
#![deny(trivial_casts, trivial_numeric_casts, rust_2018_idioms)]

extern crate alloc;

pub mod blocks;
pub mod decoding;
pub mod dictionary;
pub mod encoding;
pub mod error;
pub mod frame;
pub mod frame_decoder;
pub mod fse;
pub mod huff0;
pub mod io;
#[cfg(feature = "mt")]
pub mod mt;
pub mod streaming_decoder;

pub(crate) const VERBOSE: bool = false;

pub use encoding::frame_compressor::{CompressionParameters, FrameCompressor};
pub use error::ZstdError;
pub use frame_decoder::{BlockDecodingStrategy, FrameDecoder};
pub use streaming_decoder::StreamingDecoder;

/// Decompress a single Zstandard frame held entirely in memory.
pub fn decompress(src: &[u8]) -> Result<alloc::vec::Vec<u8>, ZstdError> {
    let mut decoder = FrameDecoder::new();
    let mut cursor = src;
    decoder.init(&mut cursor)?;
    decoder.decode_blocks(&mut cursor, BlockDecodingStrategy::All)?;
    Ok(decoder.collect())
}

/// Compress a byte slice into a single Zstandard frame using the given parameters.
pub fn compress(src: &[u8], params: CompressionParameters) -> alloc::vec::Vec<u8> {
    FrameCompressor::new(src, params).compress()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::frame_compressor::CompressionParameters;

    #[test]
    fn roundtrip_empty() {
        let c = compress(b"", CompressionParameters::default());
        assert_eq!(decompress(&c).unwrap(), b"");
    }

    #[test]
    fn roundtrip_small() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let c = compress(data, CompressionParameters::default());
        assert_eq!(decompress(&c).unwrap(), data);
    }

    #[test]
    fn roundtrip_repetitive() {
        let data = vec![b'A'; 100_000];
        let c = compress(&data, CompressionParameters::default());
        assert!(c.len() < 200);
        assert_eq!(decompress(&c).unwrap(), data);
    }
}
