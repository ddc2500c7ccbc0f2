use core::borrow::BorrowMut;

use crate::frame_decoder::{BlockDecodingStrategy, FrameDecoder, FrameDecoderError};
use crate::io::{Error, ErrorKind, Read};

/// High level decoder that implements a io::Read that can be used with
/// io::Read::read_to_end / io::Read::read_exact or passing this to another library / module as a source for the decoded content
///
/// The lower level FrameDecoder by comparison allows for finer grained control but need sto have it's decode_blocks method called continously
/// to decode the zstd-frame.
///
/// ## Caveat
/// [StreamingDecoder] expects the underlying stream to only contain a single frame.
/// To decode all the frames in a finite stream, the calling code needs to recreate
/// the instance of the decoder
/// and handle
/// [crate::frame::ReadFrameHeaderError::SkipFrame]
/// errors by skipping forward the `length` amount of bytes, see <https://github.com/KillingSpark/zstd-rs/issues/57>
pub struct StreamingDecoder<READ: Read, DEC: BorrowMut<FrameDecoder>> {
    pub decoder: DEC,
    source: READ,
}

impl<READ: Read, DEC: BorrowMut<FrameDecoder>> StreamingDecoder<READ, DEC> {
    pub fn new_with_decoder(
        mut source: READ,
        mut decoder: DEC,
    ) -> Result<StreamingDecoder<READ, DEC>, FrameDecoderError> {
        decoder.borrow_mut().init(&mut source)?;
        Ok(StreamingDecoder { decoder, source })
    }
}

impl<READ: Read> StreamingDecoder<READ, FrameDecoder> {
    pub fn new(
        mut source: READ,
    ) -> Result<StreamingDecoder<READ, FrameDecoder>, FrameDecoderError> {
        let mut decoder = FrameDecoder::new();
        decoder.init(&mut source)?;
        Ok(StreamingDecoder { decoder, source })
    }
}

impl<READ: Read, DEC: BorrowMut<FrameDecoder>> StreamingDecoder<READ, DEC> {
    /// Gets a reference to the underlying reader.
    pub fn get_ref(&self) -> &READ {
        &self.source
    }

    /// Gets a mutable reference to the underlying reader.
    ///
    /// It is inadvisable to directly read from the underlying reader.
    pub fn get_mut(&mut self) -> &mut READ {
        &mut self.source
    }

    /// Destructures this object into the inner reader.
    pub fn into_inner(self) -> READ
    where
        READ: Sized,
    {
        self.source
    }

    /// Destructures this object into both the inner reader and [FrameDecoder].
    pub fn into_parts(self) -> (READ, DEC)
    where
        READ: Sized,
    {
        (self.source, self.decoder)
    }

    /// Destructures this object into the inner [FrameDecoder].
    pub fn into_frame_decoder(self) -> DEC {
        self.decoder
    }
}

/// After this many consecutive `decode_blocks` calls produce neither new
/// collectable bytes nor a finished frame, `source` is treated as stalled
/// rather than looped on forever.
///
/// `decode_blocks(UptoBytes(n))` can return `Ok(false)` without decoding
/// anything when the buffer already holds enough bytes to satisfy that call's
/// target; nothing about `self.source` or the decoder state guarantees this
/// can't repeat indefinitely, so the loop below needs its own exit condition
/// rather than trusting every call to make progress.
const MAX_NO_PROGRESS_ITERATIONS: u32 = 16;

impl<READ: Read, DEC: BorrowMut<FrameDecoder>> Read for StreamingDecoder<READ, DEC> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let decoder = self.decoder.borrow_mut();
        if decoder.is_finished() && decoder.can_collect() == 0 {
            //No more bytes can ever be decoded
            return Ok(0);
        }

        // need to loop. The UpToBytes strategy doesn't take any effort to actually reach that limit.
        // The first few calls can result in just filling the decode buffer but these bytes can not be collected.
        // So we need to call this until we can actually collect enough bytes

        // TODO add BlockDecodingStrategy::UntilCollectable(usize) that pushes this logic into the decode_blocks function
        let mut no_progress_iterations = 0u32;
        while decoder.can_collect() < buf.len() && !decoder.is_finished() {
            //More bytes can be decoded
            let collectable_before = decoder.can_collect();
            let additional_bytes_needed = buf.len() - collectable_before;
            match decoder.decode_blocks(
                &mut self.source,
                BlockDecodingStrategy::UptoBytes(additional_bytes_needed),
            ) {
                Ok(_) => { /*Nothing to do*/ }
                Err(e) => {
                    let err;
                    #[cfg(feature = "std")]
                    {
                        err = Error::new(ErrorKind::Other, e);
                    }
                    #[cfg(not(feature = "std"))]
                    {
                        err = Error::new(ErrorKind::Other, alloc::boxed::Box::new(e));
                    }
                    return Err(err);
                }
            }

            if decoder.can_collect() == collectable_before && !decoder.is_finished() {
                no_progress_iterations += 1;
                if no_progress_iterations >= MAX_NO_PROGRESS_ITERATIONS {
                    return Err(Error::new(
                        ErrorKind::Other,
                        "no forward progress: source produced no new bytes across repeated reads of an unfinished frame",
                    ));
                }
            } else {
                no_progress_iterations = 0;
            }
        }

        decoder.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::frame_compressor::{CompressionParameters, FrameCompressor};
    use alloc::vec;
    use alloc::vec::Vec;

    #[test]
    fn reads_whole_frame_in_small_chunks() {
        let data = b"the quick brown fox jumps over the lazy dog, repeatedly, over and over";
        let compressed = FrameCompressor::new(data, CompressionParameters::default()).compress();

        let mut dec = StreamingDecoder::new(compressed.as_slice()).unwrap();
        let mut out = Vec::new();
        let mut chunk = [0u8; 3];
        loop {
            let n = dec.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(out, data);
    }

    #[test]
    fn empty_frame_reads_as_eof() {
        let compressed = FrameCompressor::new(b"", CompressionParameters::default()).compress();
        let mut dec = StreamingDecoder::new(compressed.as_slice()).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(dec.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn single_large_read_matches_frame_content() {
        let data = vec![b'z'; 10_000];
        let compressed = FrameCompressor::new(&data, CompressionParameters::default()).compress();
        let mut dec = StreamingDecoder::new(compressed.as_slice()).unwrap();
        let mut buf = vec![0u8; data.len()];
        let mut total = 0;
        while total < buf.len() {
            let n = dec.read(&mut buf[total..]).unwrap();
            assert!(n > 0, "reader stalled before filling the buffer");
            total += n;
        }
        assert_eq!(buf, data);
    }
}
