//! Utilities and representations for a frame header.

use super::util::find_min_size;
use alloc::vec::Vec;

/// A header for a single Zstandard frame.
///
/// <https://github.com/facebook/zstd/blob/dev/doc/zstd_compression_format.md#frame_header>
pub struct FrameHeader {
    /// Optionally, the original (uncompressed) size of the data within the frame in bytes.
    pub frame_content_size: Option<u64>,
    /// If set to true, data must be regenerated within a single
    /// continuous memory segment. Forced to true if `window_size` is `None`.
    pub single_segment: bool,
    /// If set to true, a 32 bit content checksum will be present
    /// at the end of the frame.
    pub content_checksum: bool,
    /// If a dictionary ID is provided, the ID of that dictionary.
    pub dictionary_id: Option<u64>,
    /// The minimum memory buffer required to decompress a frame. Must be
    /// present unless `single_segment` is set.
    pub window_size: Option<u64>,
}

impl FrameHeader {
    /// Serialize the frame header, appending it to `output`.
    ///
    /// Mirrors [`crate::frame::read_frame_header`] in reverse: the window
    /// descriptor is always written with a mantissa of zero, so the encoded
    /// window size is the smallest power of two at or above `window_size`.
    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&crate::frame::MAGIC_NUM.to_le_bytes());

        // A content size below 256 can only be carried in the 1-byte
        // Single_Segment encoding (the 2-byte form's decoded value is
        // always offset by +256), so force it for small known sizes.
        let single_segment = self.single_segment
            || self.window_size.is_none()
            || matches!(self.frame_content_size, Some(size) if size < 256);

        let fcs_flag: u8 = match self.frame_content_size {
            None => 0,
            Some(size) if size < 256 && single_segment => 0,
            Some(size) if size < 256 + 65536 => 1,
            Some(size) if size <= u32::MAX as u64 => 2,
            Some(_) => 3,
        };

        let dict_id_len = self
            .dictionary_id
            .map(|id| find_min_size(id).min(4))
            .unwrap_or(0);
        let dict_id_flag: u8 = match dict_id_len {
            0 => 0,
            1 => 1,
            2 => 2,
            _ => 3,
        };

        let descriptor = (fcs_flag << 6)
            | ((single_segment as u8) << 5)
            | ((self.content_checksum as u8) << 2)
            | dict_id_flag;
        output.push(descriptor);

        if !single_segment {
            let window_size = self.window_size.unwrap_or(crate::frame::MIN_WINDOW_SIZE);
            let window_log = window_size
                .max(1)
                .next_power_of_two()
                .trailing_zeros()
                .max(10) as u64;
            output.push(((window_log - 10) as u8) << 3);
        }

        if let Some(id) = self.dictionary_id {
            let bytes = (id as u32).to_le_bytes();
            output.extend_from_slice(&bytes[..dict_id_len]);
        }

        if let Some(size) = self.frame_content_size {
            match fcs_flag {
                0 => output.push(size as u8),
                1 => output.extend_from_slice(&((size - 256) as u16).to_le_bytes()),
                2 => output.extend_from_slice(&(size as u32).to_le_bytes()),
                3 => output.extend_from_slice(&size.to_le_bytes()),
                _ => unreachable!(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FrameHeader;
    use crate::frame::read_frame_header;
    use alloc::vec::Vec;

    #[test]
    fn header_roundtrips_with_content_size() {
        let header = FrameHeader {
            frame_content_size: Some(12345),
            single_segment: false,
            content_checksum: true,
            dictionary_id: None,
            window_size: Some(1 << 17),
        };
        let mut out = Vec::new();
        header.serialize(&mut out);

        let (frame, _) = read_frame_header(&out[..]).unwrap();
        assert_eq!(frame.content_size(), Some(12345));
        assert!(frame.header.descriptor.content_checksum_flag());
    }

    #[test]
    fn header_roundtrips_single_segment_small() {
        let header = FrameHeader {
            frame_content_size: Some(3),
            single_segment: true,
            content_checksum: false,
            dictionary_id: None,
            window_size: None,
        };
        let mut out = Vec::new();
        header.serialize(&mut out);

        let (frame, _) = read_frame_header(&out[..]).unwrap();
        assert_eq!(frame.content_size(), Some(3));
        assert_eq!(frame.header.window_size().unwrap(), 3);
    }
}
