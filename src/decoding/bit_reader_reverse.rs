//! Reverse (LIFO) bit reader.
//!
//! FSE and Huffman bitstreams are written forward but read backward: the
//! encoder's last-written bit is the decoder's first read. This reader
//! walks a byte slice from its end toward its start, keeping a 64-bit
//! lookahead container refilled in byte-aligned chunks.

use core::convert::TryInto;

#[derive(Debug, Clone, thiserror::Error)]
pub enum GetBitsError {
    #[error("cannot read more than 64 bits at once, requested {requested}")]
    TooManyBits { requested: usize },
}

pub struct BitReaderReversed<'s> {
    // counts bits not yet moved into the container, signed so it can go
    // negative once the stream has been fully drained and padding is read
    idx: isize,
    source: &'s [u8],

    bit_container: u64,
    bits_in_container: u8,
}

impl<'s> BitReaderReversed<'s> {
    pub fn bits_remaining(&self) -> isize {
        self.idx + self.bits_in_container as isize
    }

    pub fn new(source: &'s [u8]) -> BitReaderReversed<'s> {
        BitReaderReversed {
            idx: source.len() as isize * 8,
            source,
            bit_container: 0,
            bits_in_container: 0,
        }
    }

    fn byte_idx(&self) -> usize {
        (self.idx as usize - 1) / 8
    }

    fn refill_container(&mut self) {
        let want_to_read = 64 - self.bits_in_container as isize;
        let can_read = want_to_read.min(self.idx);

        match can_read {
            64 => {
                let start = self.byte_idx() - 7;
                let bytes = &self.source[start..start + 8];
                self.bit_container = u64::from_le_bytes(bytes.try_into().unwrap());
                self.bits_in_container += 64;
                self.idx -= 64;
            }
            48..=63 => {
                self.bit_container <<= 48;
                self.bits_in_container += 48;
                let start = self.byte_idx() - 5;
                let mut buf = [0u8; 8];
                buf[..6].copy_from_slice(&self.source[start..start + 6]);
                self.bit_container |= u64::from_le_bytes(buf);
                self.idx -= 48;
            }
            32..=47 => {
                self.bit_container <<= 32;
                self.bits_in_container += 32;
                let start = self.byte_idx() - 3;
                let bytes = &self.source[start..start + 4];
                self.bit_container |= u32::from_le_bytes(bytes.try_into().unwrap()) as u64;
                self.idx -= 32;
            }
            16..=31 => {
                self.bit_container <<= 16;
                self.bits_in_container += 16;
                let start = self.byte_idx() - 1;
                let bytes = &self.source[start..start + 2];
                self.bit_container |= u16::from_le_bytes(bytes.try_into().unwrap()) as u64;
                self.idx -= 16;
            }
            8..=15 => {
                self.bit_container <<= 8;
                self.bits_in_container += 8;
                self.bit_container |= self.source[self.byte_idx()] as u64;
                self.idx -= 8;
            }
            _ => unreachable!("refill requested with {can_read} bits available"),
        }
    }

    pub fn get_bits(&mut self, n: usize) -> Result<u64, GetBitsError> {
        if n == 0 {
            return Ok(0);
        }
        if n > 64 {
            return Err(GetBitsError::TooManyBits { requested: n });
        }

        let n = n as isize;

        if self.bits_remaining() <= 0 {
            self.idx -= n;
            return Ok(0);
        }

        if self.bits_remaining() < n {
            // stream exhausted mid-read: zero-fill the high bits, consuming
            // exactly what's left and letting idx go negative
            let emulated_read_shift = n - self.bits_remaining();
            let v = self.get_bits(self.bits_remaining() as usize)?;
            debug_assert_eq!(self.idx, 0);
            let value = v << emulated_read_shift;
            self.idx -= emulated_read_shift;
            return Ok(value);
        }

        if (self.bits_in_container as isize) < n {
            while self.bits_in_container <= 56 && (self.bits_in_container as isize) < n {
                self.refill_container();
            }
        }

        let value = self.bit_container >> (self.bits_in_container as isize - n);
        self.bits_in_container -= n as u8;
        let value_masked = if n == 64 { value } else { value & ((1u64 << n) - 1) };

        Ok(value_masked)
    }

    pub fn reset(&mut self, new_source: &'s [u8]) {
        self.idx = new_source.len() as isize * 8;
        self.source = new_source;
        self.bit_container = 0;
        self.bits_in_container = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_trailing_bits_first() {
        // single byte 0b1010_0110, high bits read first in reverse mode
        let data = [0b1010_0110];
        let mut br = BitReaderReversed::new(&data);
        assert_eq!(br.get_bits(4).unwrap(), 0b1010);
        assert_eq!(br.get_bits(4).unwrap(), 0b0110);
    }

    #[test]
    fn zero_fills_past_end() {
        let data = [0xFF];
        let mut br = BitReaderReversed::new(&data);
        br.get_bits(8).unwrap();
        assert!(br.bits_remaining() <= 0);
        assert_eq!(br.get_bits(4).unwrap(), 0);
    }

    #[test]
    fn multi_byte_refill() {
        let data = [0x12, 0x34, 0x56, 0x78];
        let mut br = BitReaderReversed::new(&data);
        let all = br.get_bits(32).unwrap();
        assert_eq!(all, 0x12345678);
    }
}
