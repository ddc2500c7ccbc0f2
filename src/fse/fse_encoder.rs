//! FSE encode-table construction and symbol encoding.
//!
//! Mirrors the spreading algorithm in [`crate::fse::fse_decoder`] so that an
//! encode table and a decode table built from the same normalized
//! probabilities agree on every state transition.

use crate::encoding::bit_writer::BitWriter;
use alloc::vec;
use alloc::vec::Vec;

const ACC_LOG_OFFSET: u8 = 5;

fn highest_bit_set(x: u32) -> u32 {
    assert!(x > 0);
    32 - x.leading_zeros()
}

struct SymbolTransform {
    delta_nb_bits: i64,
    delta_find_state: i64,
}

pub struct FSETable {
    next_state: Vec<u32>,
    symbol_tt: Vec<SymbolTransform>,
    probabilities: Vec<i32>,
    table_log: u8,
    state: usize,
}

impl FSETable {
    pub fn table_log(&self) -> u8 {
        self.table_log
    }

    /// Build directly from a set of normalized probabilities (used for the
    /// predefined default distributions and for Repeat mode, where the
    /// previous block's table is reused verbatim).
    pub fn build_table_from_probabilities(probabilities: &[i32], table_log: u8) -> Self {
        let table_size = 1usize << table_log;
        let mut table_symbol = vec![0u8; table_size];
        let mut cumul = vec![0i32; probabilities.len() + 1];

        let mut high_threshold = table_size - 1;
        for (s, &p) in probabilities.iter().enumerate() {
            if p == -1 {
                table_symbol[high_threshold] = s as u8;
                high_threshold -= 1;
                cumul[s + 1] = cumul[s] + 1;
            } else {
                cumul[s + 1] = cumul[s] + p;
            }
        }

        let step = (table_size >> 1) + (table_size >> 3) + 3;
        let mask = table_size - 1;
        let mut position = 0usize;
        for (s, &p) in probabilities.iter().enumerate() {
            for _ in 0..p.max(0) {
                table_symbol[position] = s as u8;
                loop {
                    position = (position + step) & mask;
                    if position <= high_threshold {
                        break;
                    }
                }
            }
        }

        let mut next_state = vec![0u32; table_size];
        let mut cursor = cumul.clone();
        for (u, &s) in table_symbol.iter().enumerate() {
            let slot = &mut cursor[s as usize];
            next_state[*slot as usize] = (table_size + u) as u32;
            *slot += 1;
        }

        let mut symbol_tt = Vec::with_capacity(probabilities.len());
        let mut total = 0i64;
        for &p in probabilities {
            match p {
                0 => symbol_tt.push(SymbolTransform {
                    delta_nb_bits: 0,
                    delta_find_state: 0,
                }),
                -1 | 1 => {
                    symbol_tt.push(SymbolTransform {
                        delta_nb_bits: ((table_log as i64) << 16) - (1i64 << table_log),
                        delta_find_state: total - 1,
                    });
                    total += 1;
                }
                p => {
                    let max_bits_out = table_log as u32 - highest_bit_set((p - 1) as u32);
                    let min_state_plus = (p as i64) << max_bits_out;
                    symbol_tt.push(SymbolTransform {
                        delta_nb_bits: ((max_bits_out as i64) << 16) - min_state_plus,
                        delta_find_state: total - p as i64,
                    });
                    total += p as i64;
                }
            }
        }

        Self {
            next_state,
            symbol_tt,
            probabilities: probabilities.to_vec(),
            table_log,
            state: table_size,
        }
    }

    /// Normalize raw symbol frequency counts into a probability distribution
    /// summing to `1 << table_log`, then build the encode table from it.
    pub fn build_table_from_counts(counts: &[u32], table_log: u8) -> Self {
        let probabilities = normalize_counts(counts, table_log);
        Self::build_table_from_probabilities(&probabilities, table_log)
    }

    /// Reset to the initial state, ready for a fresh [`Self::encode`] or a
    /// fresh interleaved run of [`Self::encode_symbol`]/[`Self::flush_state`].
    pub(crate) fn reset_state(&mut self) {
        self.state = 1usize << self.table_log;
    }

    /// Encode `data` (reading it in reverse, as required so the reverse bit
    /// reader decodes it forward) into `writer`, finishing with the raw
    /// final state written as `table_log` bits.
    pub fn encode(&mut self, data: &[u8], writer: &mut BitWriter) {
        self.reset_state();
        for &symbol in data.iter().rev() {
            self.encode_symbol(symbol, writer);
        }
        self.flush_state(writer);
    }

    /// Write the raw current state as `table_log` bits, the way [`Self::encode`]
    /// finishes a single-stream encode. Used directly by callers (such as the
    /// sequence section encoder) that interleave several tables into one
    /// bitstream instead of encoding one array at a time.
    pub(crate) fn flush_state(&self, writer: &mut BitWriter) {
        let table_size = 1usize << self.table_log;
        writer.write_bits((self.state & (table_size - 1)) as u64, self.table_log as usize);
    }

    /// Encode a single symbol, advancing the table's internal state. Data
    /// must be fed in the reverse of the order it should decode in.
    pub(crate) fn encode_symbol(&mut self, symbol: u8, writer: &mut BitWriter) {
        let tt = &self.symbol_tt[symbol as usize];
        let nb_bits_out = ((self.state as i64 + tt.delta_nb_bits) >> 16) as usize;
        writer.write_bits(self.state as u64, nb_bits_out);
        let idx = ((self.state >> nb_bits_out) as i64 + tt.delta_find_state) as usize;
        self.state = self.next_state[idx] as usize;
    }

    /// Serialize the NCount header for this table's distribution, as read
    /// back by [`crate::fse::FSETable::build_decoder`].
    pub fn write_table(&self, output: &mut Vec<u8>) {
        let mut bw = BitWriter::new();
        bw.write_bits((self.table_log - ACC_LOG_OFFSET) as u64, 4);

        let probability_sum = 1i32 << self.table_log;
        let mut remaining = probability_sum;
        let mut symbol = 0usize;
        while symbol < self.probabilities.len() {
            let prob = self.probabilities[symbol];
            let value = (prob + 1) as u32;
            encode_ncount_value(&mut bw, value, remaining);
            if prob > 0 {
                remaining -= prob;
            } else if prob == -1 {
                remaining -= 1;
            }
            symbol += 1;

            if prob == 0 {
                let mut extra_zeros = 0u32;
                while symbol < self.probabilities.len() && self.probabilities[symbol] == 0 {
                    extra_zeros += 1;
                    symbol += 1;
                }
                let mut rem = extra_zeros;
                while rem >= 3 {
                    bw.write_bits(3u8, 2);
                    rem -= 3;
                }
                bw.write_bits(rem as u8, 2);
            }
        }

        output.extend_from_slice(&bw.close());
    }
}

fn encode_ncount_value(bw: &mut BitWriter, value: u32, remaining: i32) {
    let max_remaining_value = (remaining + 1) as u32;
    let bits_to_read = highest_bit_set(max_remaining_value);
    let low_threshold = ((1u32 << bits_to_read) - 1) - max_remaining_value;

    if value < low_threshold {
        bw.write_bits(value as u64, (bits_to_read - 1) as usize);
    } else {
        let mask = (1u32 << (bits_to_read - 1)) - 1;
        if value > mask {
            bw.write_bits((value + low_threshold) as u64, bits_to_read as usize);
        } else {
            bw.write_bits(value as u64, bits_to_read as usize);
        }
    }
}

/// Proportional-scaling normalization: every nonzero-count symbol gets at
/// least one slot (or the `-1` "low probability" sentinel when its share
/// would otherwise round to zero), and the single most frequent symbol
/// absorbs the rounding remainder so the distribution sums exactly to
/// `1 << table_log`.
fn normalize_counts(counts: &[u32], table_log: u8) -> Vec<i32> {
    let table_size = 1i64 << table_log;
    let total: u64 = counts.iter().map(|&c| c as u64).sum();
    let mut norm = vec![0i32; counts.len()];
    if total == 0 {
        return norm;
    }

    let mut covered: i64 = 0;
    let mut largest_idx = 0usize;
    let mut largest_count = 0u32;
    for (i, &c) in counts.iter().enumerate() {
        if c == 0 {
            continue;
        }
        if c > largest_count {
            largest_count = c;
            largest_idx = i;
        }
        let scaled = ((c as u64 * table_size as u64) / total) as i64;
        let n = if scaled == 0 { -1 } else { scaled };
        norm[i] = n as i32;
        covered += if n > 0 { n } else { 1 };
    }

    let diff = table_size - covered;
    if diff != 0 {
        norm[largest_idx] += diff as i32;
        debug_assert!(norm[largest_idx] > 0);
    }

    norm
}

// Canonical default distributions (RFC 8878 section 3.1.1.3.2.2.2).

pub fn default_ll_table() -> FSETable {
    FSETable::build_table_from_probabilities(&super::LL_DEFAULT_DIST, super::LL_DEFAULT_LOG)
}

pub fn default_ml_table() -> FSETable {
    FSETable::build_table_from_probabilities(&super::ML_DEFAULT_DIST, super::ML_DEFAULT_LOG)
}

pub fn default_of_table() -> FSETable {
    FSETable::build_table_from_probabilities(&super::OF_DEFAULT_DIST, super::OF_DEFAULT_LOG)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoding::bit_reader_reverse::BitReaderReversed;
    use crate::fse::fse_decoder::FSETable as DecodeTable;
    use crate::fse::FSEDecoder;

    #[test]
    fn roundtrip_through_default_ll_table() {
        let data: Vec<u8> = (0..20).map(|i| (i % 6) as u8).collect();
        let mut enc = default_ll_table();
        let mut bw = BitWriter::new();
        enc.encode(&data, &mut bw);
        let bytes = bw.close();

        let mut dec = DecodeTable::new();
        dec.build_from_probabilities(super::super::LL_DEFAULT_LOG, &super::super::LL_DEFAULT_DIST)
            .unwrap();

        let mut br = BitReaderReversed::new(&bytes);
        let mut skipped = 0;
        loop {
            let bit = br.get_bits(1).unwrap();
            skipped += 1;
            if bit == 1 || skipped > 8 {
                break;
            }
        }
        let mut decoder = FSEDecoder::new(&dec);
        decoder.init_state(&mut br).unwrap();

        let mut decoded = Vec::new();
        loop {
            decoded.push(decoder.decode_symbol());
            if br.bits_remaining() <= 0 {
                break;
            }
            decoder.update_state(&mut br).unwrap();
        }
        assert_eq!(decoded, data);
    }
}
