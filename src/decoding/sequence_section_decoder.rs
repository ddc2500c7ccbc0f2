//! Decodes a block's sequence section: the three interleaved FSE bitstreams
//! (Literals_Length_Code, Offset_Code, Match_Length_Code) that, together with
//! the literals section, drive [`super::sequence_execution`].
//!
//! <https://github.com/facebook/zstd/blob/dev/doc/zstd_compression_format.md#sequences-section>

use super::bit_reader_reverse::{BitReaderReversed, GetBitsError};
use super::scratch::FSEScratch;
use crate::blocks::sequence_section::{
    CompressionModes, ModeType, Sequence, SequencesHeader, LL_CODE_TABLE, ML_CODE_TABLE,
};
use crate::fse::{FSEDecoder, FSETable, FSETableError};
use alloc::vec;
use alloc::vec::Vec;

/// Maximum accuracy log allowed for a custom Literals_Length_Code table.
pub(crate) const LL_MAX_LOG: u8 = 9;
/// Maximum accuracy log allowed for a custom Match_Length_Code table.
pub(crate) const ML_MAX_LOG: u8 = 9;
/// Maximum accuracy log allowed for a custom Offset_Code table.
pub(crate) const OF_MAX_LOG: u8 = 8;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SequenceDecodeError {
    #[error("sequence section has no compression modes byte but declares {num_sequences} sequences")]
    MissingModes { num_sequences: u32 },
    #[error("Repeat mode used for {field} before any table was ever built for it")]
    RepeatBeforeFirstUse { field: &'static str },
    #[error(transparent)]
    FSETableError(#[from] FSETableError),
    #[error(transparent)]
    GetBits(#[from] GetBitsError),
    #[error("source has {got} bytes left, needs at least {need} to read an RLE symbol")]
    MissingRleByte { got: usize, need: usize },
    #[error("offset code {code} decodes to a value with no corresponding highest bit")]
    OffsetCodeOverflow { code: u8 },
}

/// Brings `persistent` up to date for one of the three symbol types of this
/// block, consuming bytes from `source` if the mode requires reading a fresh
/// table, and returns the number of bytes consumed.
fn build_table(
    mode: ModeType,
    field: &'static str,
    source: &[u8],
    persistent: &mut FSETable,
    predefined: FSETable,
    max_log: u8,
) -> Result<usize, SequenceDecodeError> {
    match mode {
        ModeType::Predefined => {
            *persistent = predefined;
            Ok(0)
        }
        ModeType::RLE => {
            if source.is_empty() {
                return Err(SequenceDecodeError::MissingRleByte { got: 0, need: 1 });
            }
            let symbol = source[0];
            let mut probs = vec![0i32; symbol as usize + 1];
            probs[symbol as usize] = 2;
            persistent.build_from_probabilities(1, &probs)?;
            Ok(1)
        }
        ModeType::FSECompressed => Ok(persistent.build_decoder(source, max_log)?),
        ModeType::Repeat => {
            if persistent.accuracy_log == 0 {
                return Err(SequenceDecodeError::RepeatBeforeFirstUse { field });
            }
            Ok(0)
        }
    }
}

/// Decode all sequences described by `header` out of `source`, appending them
/// to `sequences`. `source` must start right after the sequences header byte
/// and run to the end of the block.
pub(crate) fn decode_sequences(
    header: &SequencesHeader,
    source: &[u8],
    scratch: &mut FSEScratch,
    sequences: &mut Vec<Sequence>,
) -> Result<(), SequenceDecodeError> {
    sequences.clear();
    if header.num_sequences == 0 {
        return Ok(());
    }

    let modes: CompressionModes = header
        .modes
        .ok_or(SequenceDecodeError::MissingModes {
            num_sequences: header.num_sequences,
        })?;

    let mut cursor = source;

    let read = build_table(
        modes.ll_mode(),
        "literal lengths",
        cursor,
        &mut scratch.literal_lengths,
        crate::fse::default_ll_decode_table(),
        LL_MAX_LOG,
    )?;
    cursor = &cursor[read..];

    let read = build_table(
        modes.of_mode(),
        "offsets",
        cursor,
        &mut scratch.offsets,
        crate::fse::default_of_decode_table(),
        OF_MAX_LOG,
    )?;
    cursor = &cursor[read..];

    let read = build_table(
        modes.ml_mode(),
        "match lengths",
        cursor,
        &mut scratch.match_lengths,
        crate::fse::default_ml_decode_table(),
        ML_MAX_LOG,
    )?;
    cursor = &cursor[read..];

    let mut br = BitReaderReversed::new(cursor);

    // skip the closing marker bit (and the zero padding before it) that
    // `BitWriter::close` appended on the encode side
    loop {
        let bit = br.get_bits(1)?;
        if bit == 1 || br.bits_remaining() <= 0 {
            break;
        }
    }

    let mut ll_dec = FSEDecoder::new(&scratch.literal_lengths);
    let mut of_dec = FSEDecoder::new(&scratch.offsets);
    let mut ml_dec = FSEDecoder::new(&scratch.match_lengths);

    // states are written last-to-first as (ll, of, ml), so they must be
    // read back in the opposite order: ml, of, ll
    ml_dec.init_state(&mut br)?;
    of_dec.init_state(&mut br)?;
    ll_dec.init_state(&mut br)?;

    for _ in 0..header.num_sequences {
        let ll_code_val = ll_dec.decode_symbol();
        let of_code_val = of_dec.decode_symbol();
        let ml_code_val = ml_dec.decode_symbol();

        ml_dec.update_state(&mut br)?;
        of_dec.update_state(&mut br)?;
        ll_dec.update_state(&mut br)?;

        let ml_extra_bits = ML_CODE_TABLE
            .get(ml_code_val as usize)
            .map(|&(_, bits)| bits)
            .unwrap_or(0);
        let ml_extra = br.get_bits(ml_extra_bits as usize)? as u32;

        let of_extra_bits = of_code_val;
        let of_extra = br.get_bits(of_extra_bits as usize)? as u32;

        let ll_extra_bits = LL_CODE_TABLE
            .get(ll_code_val as usize)
            .map(|&(_, bits)| bits)
            .unwrap_or(0);
        let ll_extra = br.get_bits(ll_extra_bits as usize)? as u32;

        let ll = LL_CODE_TABLE
            .get(ll_code_val as usize)
            .map(|&(baseline, _)| baseline + ll_extra)
            .unwrap_or(ll_extra);
        let ml = ML_CODE_TABLE
            .get(ml_code_val as usize)
            .map(|&(baseline, _)| baseline + ml_extra)
            .unwrap_or(ml_extra);
        let of_baseline = 1u32
            .checked_shl(of_code_val as u32)
            .ok_or(SequenceDecodeError::OffsetCodeOverflow { code: of_code_val })?;
        let of = of_baseline + of_extra;

        sequences.push(Sequence { ll, ml, of });
    }

    Ok(())
}
