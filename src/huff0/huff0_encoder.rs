use crate::encoding::bit_writer::BitWriter;
use crate::fse::fse_encoder;
use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Ordering;

pub struct HuffmanTable {
    /// Index is the symbol, values are the bitstring in the lower bits of the u32 and the amount of bits in the u8
    codes: Vec<(u32, u8)>,
    max_num_bits: u8,
}

impl HuffmanTable {
    pub fn build(weights: &[usize]) -> Self {
        let mut sorted = Vec::with_capacity(weights.len());
        struct SortEntry {
            symbol: u8,
            weight: usize,
        }
        for (symbol, weight) in weights.iter().copied().enumerate() {
            if weight > 0 {
                sorted.push(SortEntry {
                    symbol: symbol as u8,
                    weight,
                });
            }
        }
        sorted.sort_by(|left, right| match left.weight.cmp(&right.weight) {
            Ordering::Equal => left.symbol.cmp(&right.symbol),
            other => other,
        });

        let mut table = HuffmanTable {
            codes: Vec::with_capacity(weights.len()),
            max_num_bits: 0,
        };
        for _ in 0..weights.len() {
            table.codes.push((0, 0));
        }

        if sorted.is_empty() {
            return table;
        }

        let weight_sum = sorted.iter().map(|e| 1 << (e.weight - 1)).sum::<usize>();
        if !weight_sum.is_power_of_two() {
            panic!("This is an internal error");
        }
        let max_num_bits = highest_bit_set(weight_sum) - 1; // this is a log_2 of a clean power of two
        table.max_num_bits = max_num_bits as u8;

        let mut current_weight = sorted.last().unwrap().weight;
        let mut current_num_bits = max_num_bits + 1 - current_weight;
        let mut code: u32 = (1 << current_num_bits) - 1;
        for idx in (0..sorted.len()).rev() {
            if current_weight != sorted[idx].weight {
                current_weight = sorted[idx].weight;
                let next_num_bits = max_num_bits + 1 - current_weight;
                code = (1 << (next_num_bits - current_num_bits)) - 1;
                current_num_bits = next_num_bits;
            }
            table.codes[sorted[idx].symbol as usize] = (code, current_num_bits as u8);
            code = code.saturating_sub(1);
        }

        table
    }

    /// Derive weights for each symbol with a nonzero count, build a table
    /// from them, and hand back the weights alongside so the caller can
    /// serialize the header.
    pub fn build_from_counts(counts: &[u32]) -> (Self, Vec<usize>) {
        let amount = counts.iter().filter(|&&c| c > 0).count().max(2);
        let mut weights = distribute_weights(amount);
        redistribute_weights(&mut weights, counts.len().max(2).ilog2() as usize + 1);

        let mut full_weights = vec![0usize; counts.len()];
        let mut ranked: Vec<(usize, u32)> = counts
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, c)| c > 0)
            .collect();
        ranked.sort_by(|a, b| a.1.cmp(&b.1));
        for (rank, (symbol, _)) in ranked.into_iter().enumerate() {
            full_weights[symbol] = weights[rank];
        }

        (Self::build(&full_weights), full_weights)
    }

    pub fn max_num_bits(&self) -> u8 {
        self.max_num_bits
    }

    pub fn code_for(&self, symbol: u8) -> (u32, u8) {
        self.codes[symbol as usize]
    }

    /// Encode `data` into `writer`, last symbol first, terminated with the
    /// standard padding bit so a [`crate::huff0::HuffmanDecoder`] reading
    /// from the other end can recover every symbol.
    pub fn encode(&self, data: &[u8], writer: &mut BitWriter) {
        for &symbol in data.iter().rev() {
            let (code, num_bits) = self.codes[symbol as usize];
            writer.write_bits(code as u64, num_bits as usize);
        }
    }

    /// Serialize the weight header the way [`crate::huff0::HuffmanTable::build_decoder`]
    /// expects: a direct 4-bit-packed table if it is smaller, otherwise an
    /// FSE-compressed one preceded by a length byte.
    pub fn write_header(weights: &[usize], output: &mut Vec<u8>) {
        let num_weights = weights.len() - 1; // last weight is implicit
        let direct_len = 1 + (num_weights + 1) / 2;

        let counts = count_weights(weights);
        let mut fse_table = fse_encoder::FSETable::build_table_from_counts(&counts, 6);
        let mut fse_body = Vec::new();
        let mut bw = BitWriter::new();
        fse_table.encode(&weights_as_bytes(weights)[..num_weights], &mut bw);
        fse_body.extend_from_slice(&bw.close());
        let mut fse_header = Vec::new();
        fse_table.write_table(&mut fse_header);
        let fse_len = fse_header.len() + fse_body.len();

        if fse_len + 1 < direct_len || num_weights > 127 {
            output.push(fse_len as u8);
            output.extend_from_slice(&fse_header);
            output.extend_from_slice(&fse_body);
        } else {
            output.push(127 + (num_weights as u8) + 1);
            let mut idx = 0;
            while idx < num_weights {
                let hi = weights[idx] as u8;
                let lo = if idx + 1 < num_weights {
                    weights[idx + 1] as u8
                } else {
                    0
                };
                output.push((hi << 4) | lo);
                idx += 2;
            }
        }
    }
}

fn weights_as_bytes(weights: &[usize]) -> Vec<u8> {
    weights.iter().map(|&w| w as u8).collect()
}

fn count_weights(weights: &[usize]) -> Vec<u32> {
    let max = weights.iter().copied().max().unwrap_or(0);
    let mut counts = vec![0u32; max + 1];
    for &w in &weights[..weights.len().saturating_sub(1)] {
        counts[w] += 1;
    }
    counts
}

/// Assert that the provided value is greater than zero, and returns index of the first set bit
fn highest_bit_set(x: usize) -> usize {
    assert!(x > 0);
    usize::BITS as usize - x.leading_zeros() as usize
}

#[test]
fn huffman() {
    let table = HuffmanTable::build(&[2, 2, 2, 1, 1]);
    assert_eq!(table.codes[0], (1, 2));
    assert_eq!(table.codes[1], (2, 2));
    assert_eq!(table.codes[2], (3, 2));
    assert_eq!(table.codes[3], (0, 3));
    assert_eq!(table.codes[4], (1, 3));

    let table = HuffmanTable::build(&[4, 3, 2, 0, 1, 1]);
    assert_eq!(table.codes[0], (1, 1));
    assert_eq!(table.codes[1], (1, 2));
    assert_eq!(table.codes[2], (1, 3));
    assert_eq!(table.codes[3], (0, 0));
    assert_eq!(table.codes[4], (0, 4));
    assert_eq!(table.codes[5], (1, 4));
}

fn distribute_weights(amount: usize) -> Vec<usize> {
    assert!(amount >= 2);
    assert!(amount <= 256);
    let mut weights = Vec::new();
    let mut target_weight = 1;
    let mut weight_counter = 2;

    weights.push(1);
    weights.push(1);

    while weights.len() < amount {
        let mut add_new = 1 << (weight_counter - target_weight);
        let available_space = amount - weights.len();

        if add_new > available_space {
            target_weight = weight_counter;
            add_new = 1;
        }

        for _ in 0..add_new {
            weights.push(target_weight);
        }
        weight_counter += 1;
    }

    weights
}

fn redistribute_weights(weights: &mut [usize], max_weight: usize) {
    let max_weight_data = *weights.last().unwrap();
    if max_weight_data <= max_weight {
        return;
    }
    let max_weight = max_weight_data - max_weight;
    let mut added_weights = 0;
    for weight in weights.iter_mut() {
        if *weight < max_weight {
            for add in *weight..max_weight {
                added_weights += 1 << add;
            }
            *weight += max_weight - *weight;
        }
    }

    while added_weights > 0 {
        let mut current_idx = 0;
        let mut current_weight = 0;
        for idx in 0..weights.len() {
            if 1 << (weights[idx] - 1) > added_weights {
                break;
            }
            if weights[idx] > current_weight {
                current_weight = weights[idx];
                current_idx = idx;
            }
        }

        added_weights -= 1 << (current_weight - 1);
        weights[current_idx] -= 1;
    }

    if weights[0] > 1 {
        let offset = weights[0] - 1;
        for weight in weights.iter_mut() {
            *weight -= offset;
        }
    }
}

#[test]
fn weights() {
    for amount in 2..=256 {
        let mut weights = distribute_weights(amount);
        assert_eq!(weights.len(), amount);
        let sum = weights
            .iter()
            .copied()
            .map(|weight| 1 << weight)
            .sum::<usize>();
        assert!(sum.is_power_of_two());

        redistribute_weights(&mut weights, amount.ilog2() as usize + 1);
        let sum = weights
            .iter()
            .copied()
            .map(|weight| 1 << weight)
            .sum::<usize>();
        assert!(sum.is_power_of_two());

        let max_weight = amount.ilog2() as usize + 3;
        assert!(
            *weights.last().unwrap() <= max_weight,
            "{} {weights:?}",
            max_weight
        );
    }
}

#[cfg(test)]
mod stream_tests {
    use super::*;
    use crate::huff0::huff0_decoder::HuffmanDecoder;
    use crate::huff0::huff0_decoder::HuffmanTable as DecodeTable;

    #[test]
    fn roundtrip_direct_header() {
        let data = b"abracadabra_abracadabra_abracadabra";
        let mut counts = [0u32; 256];
        for &b in data {
            counts[b as usize] += 1;
        }
        let (enc_table, weights) = HuffmanTable::build_from_counts(&counts);

        let mut bw = BitWriter::new();
        enc_table.encode(data, &mut bw);
        let body = bw.close();

        let mut header = Vec::new();
        HuffmanTable::write_header(&weights, &mut header);

        let mut dec_table = DecodeTable::new();
        dec_table.build_decoder(&header).unwrap();

        let mut br = crate::decoding::bit_reader_reverse::BitReaderReversed::new(&body);
        let mut skipped = 0;
        loop {
            let bit = br.get_bits(1).unwrap();
            skipped += 1;
            if bit == 1 || skipped > 8 {
                break;
            }
        }
        let mut decoder = HuffmanDecoder::new(&dec_table);
        decoder.init_state(&mut br).unwrap();

        let mut decoded = Vec::new();
        loop {
            decoded.push(decoder.decode_symbol());
            if br.bits_remaining() <= 0 {
                break;
            }
            decoder.next_state(&mut br).unwrap();
        }
        assert_eq!(decoded, data);
    }
}
