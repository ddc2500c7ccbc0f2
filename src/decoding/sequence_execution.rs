//! Walks the sequences decoded for a block, copying literals and matches
//! into the decode buffer in the order the format prescribes.
//!
//! <https://github.com/facebook/zstd/blob/dev/doc/zstd_compression_format.md#sequence-execution>

use super::decodebuffer::DecodebufferError;
use super::scratch::DecoderScratch;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SequenceExecutionError {
    #[error("sequence wants {wanted} literals but only {available} remain in the literals buffer")]
    NotEnoughLiterals { wanted: usize, available: usize },
    #[error("sequence has a match length of {ml} but an offset of zero")]
    ZeroOffsetWithMatch { ml: u32 },
    #[error("repeat-offset history underflowed to zero, the only reserved invalid offset")]
    CorruptRepeatOffset,
    #[error(transparent)]
    Decodebuffer(#[from] DecodebufferError),
}

pub fn execute_sequences(scratch: &mut DecoderScratch) -> Result<(), SequenceExecutionError> {
    let mut literals_copy_counter = 0;
    for seq in &scratch.sequences {
        if seq.ll > 0 {
            let wanted = literals_copy_counter + seq.ll as usize;
            if wanted > scratch.literals_buffer.len() {
                return Err(SequenceExecutionError::NotEnoughLiterals {
                    wanted,
                    available: scratch.literals_buffer.len(),
                });
            }
            let literals = &scratch.literals_buffer[literals_copy_counter..wanted];
            literals_copy_counter = wanted;
            scratch.buffer.push(literals);
        }

        if seq.ml > 0 {
            if seq.of == 0 {
                return Err(SequenceExecutionError::ZeroOffsetWithMatch { ml: seq.ml });
            }
            let actual_offset = do_offset_history(seq.of, seq.ll, &mut scratch.offset_hist)?;
            scratch.buffer.repeat(actual_offset as usize, seq.ml as usize)?;
        }
    }
    if literals_copy_counter < scratch.literals_buffer.len() {
        let rest_literals = &scratch.literals_buffer[literals_copy_counter..];
        scratch.buffer.push(rest_literals);
    }
    Ok(())
}

/// Resolves a raw `offset_value` against the repeat-offset history, updating
/// the history for the next sequence, and returns the actual match distance.
///
/// <https://github.com/facebook/zstd/blob/dev/doc/zstd_compression_format.md#repeat-offsets>
fn do_offset_history(
    offset_value: u32,
    lit_len: u32,
    rep: &mut [u32; 3],
) -> Result<u32, SequenceExecutionError> {
    if offset_value > 3 {
        let actual_offset = offset_value - 3;
        rep[2] = rep[1];
        rep[1] = rep[0];
        rep[0] = actual_offset;
        return Ok(actual_offset);
    }

    // a literal length of zero shifts the repeat-offset codes by one, per
    // the format's special case for back-to-back matches
    let code = if lit_len == 0 {
        offset_value + 1
    } else {
        offset_value
    };

    let actual_offset = match code {
        1 => rep[0],
        2 => rep[1],
        3 => rep[2],
        4 => rep[0]
            .checked_sub(1)
            .ok_or(SequenceExecutionError::CorruptRepeatOffset)?,
        _ => unreachable!("offset_value <= 3 and lit_len == 0 only ever yields code in 1..=4"),
    };

    if code != 1 {
        if code == 3 || code == 4 {
            rep[2] = rep[1];
        }
        rep[1] = rep[0];
        rep[0] = actual_offset;
    }

    Ok(actual_offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_offset_is_pushed_to_front() {
        let mut rep = [1, 4, 8];
        let actual = do_offset_history(10, 1, &mut rep).unwrap();
        assert_eq!(actual, 7);
        assert_eq!(rep, [7, 1, 4]);
    }

    #[test]
    fn repeat_offset_one_leaves_history_untouched() {
        let mut rep = [1, 4, 8];
        let actual = do_offset_history(1, 1, &mut rep).unwrap();
        assert_eq!(actual, 1);
        assert_eq!(rep, [1, 4, 8]);
    }

    #[test]
    fn repeat_offset_two_promotes_to_front() {
        let mut rep = [1, 4, 8];
        let actual = do_offset_history(2, 1, &mut rep).unwrap();
        assert_eq!(actual, 4);
        assert_eq!(rep, [4, 1, 8]);
    }

    #[test]
    fn zero_literal_length_shifts_codes() {
        let mut rep = [1, 4, 8];
        // code 1 with lit_len == 0 behaves like code 2 with lit_len != 0
        let actual = do_offset_history(1, 0, &mut rep).unwrap();
        assert_eq!(actual, 4);
        assert_eq!(rep, [4, 1, 8]);
    }

    #[test]
    fn zero_literal_length_code_three_is_minus_one() {
        let mut rep = [5, 4, 8];
        let actual = do_offset_history(3, 0, &mut rep).unwrap();
        assert_eq!(actual, 4);
        assert_eq!(rep, [4, 5, 4]);
    }
}
