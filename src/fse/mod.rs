//! FSE, short for Finite State Entropy, is an encoding technique
//! that assigns shorter codes to symbols that appear more frequently in data,
//! and longer codes to less frequent symbols.
//!
//! FSE works by mutating a state and using that state to index into a table.
//!
//! Zstandard uses two different kinds of entropy encoding: FSE, and Huffman coding.
//! Huffman is used to compress literals,
//! while FSE is used for all other symbols (literal length code, match length code, offset code).
//!
//! <https://github.com/facebook/zstd/blob/dev/doc/zstd_compression_format.md#fse>
//!
//! <https://arxiv.org/pdf/1311.2540>

mod fse_decoder;

pub use fse_decoder::*;
pub mod fse_encoder;

// Canonical default distributions (RFC 8878 section 3.1.1.3.2.2.2), shared
// between the encode side (which builds an encode table from them) and the
// decode side (which builds a decode table from them for Predefined mode).
pub(crate) const LL_DEFAULT_DIST: [i32; 36] = [
    4, 3, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 3, 2, 1, 1, 1, 1, 1,
    -1, -1, -1, -1,
];
pub(crate) const LL_DEFAULT_LOG: u8 = 6;

pub(crate) const ML_DEFAULT_DIST: [i32; 53] = [
    1, 4, 3, 2, 2, 2, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1,
];
pub(crate) const ML_DEFAULT_LOG: u8 = 6;

pub(crate) const OF_DEFAULT_DIST: [i32; 29] = [
    1, 1, 1, 1, 1, 1, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1,
];
pub(crate) const OF_DEFAULT_LOG: u8 = 5;

/// Build the decode-side table for the Predefined Literals_Length mode.
pub(crate) fn default_ll_decode_table() -> FSETable {
    let mut t = FSETable::new();
    t.build_from_probabilities(LL_DEFAULT_LOG, &LL_DEFAULT_DIST)
        .expect("predefined distribution is always valid");
    t
}

/// Build the decode-side table for the Predefined Match_Length mode.
pub(crate) fn default_ml_decode_table() -> FSETable {
    let mut t = FSETable::new();
    t.build_from_probabilities(ML_DEFAULT_LOG, &ML_DEFAULT_DIST)
        .expect("predefined distribution is always valid");
    t
}

/// Build the decode-side table for the Predefined Offset mode.
pub(crate) fn default_of_decode_table() -> FSETable {
    let mut t = FSETable::new();
    t.build_from_probabilities(OF_DEFAULT_LOG, &OF_DEFAULT_DIST)
        .expect("predefined distribution is always valid");
    t
}

#[test]
fn tables_agree_on_accuracy_log() {
    let probs = &[0, 0, -1, 3, 2, 2, (1 << 6) - 8];
    let mut dec_table = FSETable::new();
    dec_table.build_from_probabilities(6, probs).unwrap();
    let enc_table = fse_encoder::FSETable::build_table_from_probabilities(probs, 6);

    assert_eq!(enc_table.table_log(), dec_table.accuracy_log);
    assert_eq!(dec_table.decode.len(), 1 << dec_table.accuracy_log);
}
