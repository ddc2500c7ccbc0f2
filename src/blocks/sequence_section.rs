//! Utilities and representations for the second half of a block, the sequence section.
//! This section copies literals from the literals section into the decompressed output.

pub struct SequencesHeader {
    pub num_sequences: u32,
    pub modes: Option<CompressionModes>,
}

/// A sequence represents potentially redundant data, and it can be broken up into 2 steps:
/// - A copy step, where data is copied from the literals section to the decompressed output
/// - A *match* copy step that copies data from within the previously decompressed output.
///
/// <https://github.com/facebook/zstd/blob/dev/doc/zstd_compression_format.md#sequence-execution>
#[derive(Clone, Copy)]
pub struct Sequence {
    /// Literal length, or the number of bytes to be copied from the literals section
    /// in the copy step.
    pub ll: u32,
    /// The length of the match to make during the match copy step.
    pub ml: u32,
    /// How far back to go in the decompressed data to read from the match copy step.
    /// If this value is greater than 3, then the offset is `of -3`. If `of` is from 1-3,
    /// then it has special handling:
    ///
    /// The first 3 values define 3 different repeated offsets, with 1 referring to the most
    /// recent, 2 the second recent, and so on. When the current sequence has a literal length of 0,
    /// then the repeated offsets are shifted by 1. So an offset value of 1 refers to 2, 2 refers to 3,
    /// and 3 refers to the most recent offset minus one. If that value is equal to zero, the data
    /// is considered corrupted.
    pub of: u32,
}

impl core::fmt::Display for Sequence {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        write!(f, "LL: {}, ML: {}, OF: {}", self.ll, self.ml, self.of)
    }
}

/// This byte defines the compression mode of each symbol type
#[derive(Copy, Clone)]
pub struct CompressionModes(u8);
/// The compression mode used for symbol compression
pub enum ModeType {
    /// A predefined FSE distribution table is used, and no distribution table
    /// will be present.
    Predefined,
    /// The table consists of a single byte, which contains the symbol's value.
    RLE,
    /// Standard FSE compression, a distribution table will be present. This
    /// mode should not be used when only one symbol is present.
    FSECompressed,
    /// The table used in the previous compressed block with at least one sequence
    /// will be used again. If this is the first block, the table in the dictionary will
    /// be used.
    Repeat,
}

impl CompressionModes {
    /// Deserialize a two bit mode value into a [ModeType]
    pub fn decode_mode(m: u8) -> ModeType {
        match m {
            0 => ModeType::Predefined,
            1 => ModeType::RLE,
            2 => ModeType::FSECompressed,
            3 => ModeType::Repeat,
            _ => panic!("This can never happen"),
        }
    }
    /// Read the compression mode of the literal lengths field.
    pub fn ll_mode(self) -> ModeType {
        Self::decode_mode(self.0 >> 6)
    }

    /// Read the compression mode of the offset value field.
    pub fn of_mode(self) -> ModeType {
        Self::decode_mode((self.0 >> 4) & 0x3)
    }

    /// Read the compression mode of the match lengths field.
    pub fn ml_mode(self) -> ModeType {
        Self::decode_mode((self.0 >> 2) & 0x3)
    }
}

impl Default for SequencesHeader {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SequencesHeaderParseError {
    #[error("source must have at least {need_at_least} bytes to parse header; got {got} bytes")]
    NotEnoughBytes { need_at_least: u8, got: usize },
}

impl SequencesHeader {
    /// Create a new [SequencesHeader].
    pub fn new() -> SequencesHeader {
        SequencesHeader {
            num_sequences: 0,
            modes: None,
        }
    }

    /// Attempt to deserialize the provided buffer into `self`, returning the number of bytes read.
    pub fn parse_from_header(&mut self, source: &[u8]) -> Result<u8, SequencesHeaderParseError> {
        let mut bytes_read = 0;
        if source.is_empty() {
            return Err(SequencesHeaderParseError::NotEnoughBytes {
                need_at_least: 1,
                got: 0,
            });
        }

        let source = match source[0] {
            0 => {
                self.num_sequences = 0;
                return Ok(1);
            }
            1..=127 => {
                if source.len() < 2 {
                    return Err(SequencesHeaderParseError::NotEnoughBytes {
                        need_at_least: 2,
                        got: source.len(),
                    });
                }
                self.num_sequences = u32::from(source[0]);
                bytes_read += 1;
                &source[1..]
            }
            128..=254 => {
                if source.len() < 3 {
                    return Err(SequencesHeaderParseError::NotEnoughBytes {
                        need_at_least: 3,
                        got: source.len(),
                    });
                }
                self.num_sequences = ((u32::from(source[0]) - 128) << 8) + u32::from(source[1]);
                bytes_read += 2;
                &source[2..]
            }
            255 => {
                if source.len() < 4 {
                    return Err(SequencesHeaderParseError::NotEnoughBytes {
                        need_at_least: 4,
                        got: source.len(),
                    });
                }
                self.num_sequences = u32::from(source[1]) + (u32::from(source[2]) << 8) + 0x7F00;
                bytes_read += 3;
                &source[3..]
            }
        };

        self.modes = Some(CompressionModes(source[0]));
        bytes_read += 1;

        Ok(bytes_read)
    }
}

/// `(baseline, extra_bits)` for every Literals_Length_Code, indexed by code.
///
/// <https://github.com/facebook/zstd/blob/dev/doc/zstd_compression_format.md#literals-length-codes>
pub(crate) const LL_CODE_TABLE: [(u32, u8); 36] = [
    (0, 0), (1, 0), (2, 0), (3, 0), (4, 0), (5, 0), (6, 0), (7, 0),
    (8, 0), (9, 0), (10, 0), (11, 0), (12, 0), (13, 0), (14, 0), (15, 0),
    (16, 1), (18, 1), (20, 1), (22, 1), (24, 2), (28, 2), (32, 3), (40, 3),
    (48, 4), (64, 6), (128, 7), (256, 8), (512, 9), (1024, 10), (2048, 11),
    (4096, 12), (8192, 13), (16384, 14), (32768, 15), (65536, 16),
];

/// `(baseline, extra_bits)` for every Match_Length_Code, indexed by code.
///
/// <https://github.com/facebook/zstd/blob/dev/doc/zstd_compression_format.md#match-length-codes>
pub(crate) const ML_CODE_TABLE: [(u32, u8); 53] = [
    (3, 0), (4, 0), (5, 0), (6, 0), (7, 0), (8, 0), (9, 0), (10, 0),
    (11, 0), (12, 0), (13, 0), (14, 0), (15, 0), (16, 0), (17, 0), (18, 0),
    (19, 0), (20, 0), (21, 0), (22, 0), (23, 0), (24, 0), (25, 0), (26, 0),
    (27, 0), (28, 0), (29, 0), (30, 0), (31, 0), (32, 0), (33, 0), (34, 0),
    (35, 1), (37, 1), (39, 1), (41, 1), (43, 2), (47, 2), (51, 3), (59, 3),
    (67, 4), (83, 4), (99, 5), (131, 7), (259, 8), (515, 9), (1027, 10),
    (2051, 11), (4099, 12), (8195, 13), (16387, 14), (32771, 15), (65539, 16),
];

/// The number of extra bits read for Offset_Code `n` is `n` itself, and the
/// baseline is `1 << n`. Offset codes have no fixed-size table since the
/// window size bounds how many codes are meaningful.
pub(crate) fn offset_code_baseline_bits(code: u8) -> (u32, u8) {
    (1u32 << code, code)
}

/// Find the smallest code whose `[baseline, baseline + 2^extra_bits)` range
/// contains `value`, returning `(code, extra_bits, extra_bits_value)`.
fn find_code(table: &[(u32, u8)], value: u32) -> (u8, u8, u32) {
    let mut code = 0usize;
    for (idx, &(baseline, bits)) in table.iter().enumerate() {
        if baseline <= value {
            code = idx;
        } else {
            break;
        }
    }
    let (baseline, bits) = table[code];
    (code as u8, bits, value - baseline)
}

/// Encode a literal length into `(code, extra_bits, extra_bits_value)`.
pub(crate) fn ll_code(value: u32) -> (u8, u8, u32) {
    find_code(&LL_CODE_TABLE, value)
}

/// Encode a match length into `(code, extra_bits, extra_bits_value)`.
pub(crate) fn ml_code(value: u32) -> (u8, u8, u32) {
    find_code(&ML_CODE_TABLE, value)
}

/// Encode a raw offset value into `(code, extra_bits, extra_bits_value)`.
/// `code` is simply the position of the highest set bit of `value`.
pub(crate) fn of_code(value: u32) -> (u8, u8, u32) {
    let code = 32 - value.leading_zeros() - 1;
    let (baseline, bits) = offset_code_baseline_bits(code as u8);
    (code as u8, bits, value - baseline)
}

#[cfg(test)]
mod code_table_tests {
    use super::*;

    #[test]
    fn ll_code_roundtrips() {
        for value in [0u32, 1, 15, 16, 17, 65535, 65536, 131_071] {
            let (code, bits, extra) = ll_code(value);
            let (baseline, table_bits) = LL_CODE_TABLE[code as usize];
            assert_eq!(bits, table_bits);
            assert_eq!(baseline + extra, value);
        }
    }

    #[test]
    fn ml_code_roundtrips() {
        for value in [3u32, 34, 35, 67, 131_074] {
            let (code, bits, extra) = ml_code(value);
            let (baseline, table_bits) = ML_CODE_TABLE[code as usize];
            assert_eq!(bits, table_bits);
            assert_eq!(baseline + extra, value);
        }
    }

    #[test]
    fn of_code_roundtrips() {
        for value in [1u32, 2, 3, 4, 1023, 1024, 1_000_000] {
            let (code, bits, extra) = of_code(value);
            let (baseline, table_bits) = offset_code_baseline_bits(code);
            assert_eq!(bits, table_bits);
            assert_eq!(baseline + extra, value);
        }
    }
}
