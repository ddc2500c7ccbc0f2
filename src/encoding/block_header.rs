use crate::blocks::block::BlockType;
use alloc::vec::Vec;

pub struct BlockHeader {
    /// Signals if this block is the last one.
    /// The frame will end after this block.
    pub last_block: bool,
    /// Influences the meaning of `block_size`.
    pub block_type: BlockType,
    /// - For `Raw` blocks, this is the size of the block's
    /// content in bytes.
    /// - For `RLE` blocks, there will be a single byte follwing
    /// the header, repeated `block_size` times.
    /// - For `Compressed` blocks, this is the length of
    /// the compressed data.
    ///
    /// **This value must not be greater than 21 bits in length.**
    pub block_size: u32,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BlockHeaderError {
    #[error("block_size {got} does not fit in the header's 21 bits (max {max})")]
    AboveMaxBlockSize { got: u32, max: u32 },
}

impl BlockHeader {
    /// Returns the encoded 3-byte binary representation of this header.
    ///
    /// The layout mirrors [`crate::decoding::block_decoder::BlockDecoder`]'s
    /// `block_content_size_unchecked`: bit 0 of byte 0 is `last_block`, bits
    /// 1-2 are `block_type`, and the remaining 21 bits (5 in byte 0, 8 each
    /// in bytes 1 and 2) are `block_size`, all least-significant-bit first.
    pub fn serialize(&self) -> Result<[u8; 3], BlockHeaderError> {
        const MAX_BLOCK_SIZE: u32 = (1 << 21) - 1;
        if self.block_size > MAX_BLOCK_SIZE {
            return Err(BlockHeaderError::AboveMaxBlockSize {
                got: self.block_size,
                max: MAX_BLOCK_SIZE,
            });
        }
        let encoded_block_type: u8 = match self.block_type {
            BlockType::Raw => 0,
            BlockType::RLE => 1,
            BlockType::Compressed => 2,
            BlockType::Reserved => {
                return Err(BlockHeaderError::AboveMaxBlockSize {
                    got: self.block_size,
                    max: MAX_BLOCK_SIZE,
                })
            }
        };

        let byte0 = (self.last_block as u8) | (encoded_block_type << 1) | ((self.block_size as u8 & 0x1F) << 3);
        let byte1 = ((self.block_size >> 5) & 0xFF) as u8;
        let byte2 = ((self.block_size >> 13) & 0xFF) as u8;

        Ok([byte0, byte1, byte2])
    }

    pub fn serialize_to_vec(&self, output: &mut Vec<u8>) -> Result<(), BlockHeaderError> {
        output.extend_from_slice(&self.serialize()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::BlockHeader;
    use crate::blocks::block::BlockType;
    use crate::decoding::block_decoder::BlockDecoder;

    #[test]
    fn block_header_serialize() {
        let header = BlockHeader {
            last_block: true,
            block_type: BlockType::Compressed,
            block_size: 69,
        };
        let serialized_header = header.serialize().unwrap();
        let mut decoder = BlockDecoder::new();
        let parsed_header = decoder
            .read_block_header(&mut &serialized_header[..])
            .unwrap()
            .0;

        assert!(parsed_header.last_block);
        assert_eq!(parsed_header.block_type, BlockType::Compressed);
        assert_eq!(parsed_header.content_size, 69);
    }

    #[test]
    fn block_header_rejects_oversized_block() {
        let header = BlockHeader {
            last_block: false,
            block_type: BlockType::Raw,
            block_size: 1 << 21,
        };
        assert!(header.serialize().is_err());
    }
}
