//! `std::io`-compatible `Read`/`Write`/`Error` that also work without the
//! `std` feature, so the decoder and encoder can be used in `no_std`
//! environments that provide their own byte sources and sinks.

#[cfg(feature = "std")]
pub use std::io::{Error, ErrorKind, Read, Write};

#[cfg(not(feature = "std"))]
mod no_std_io {
    use alloc::boxed::Box;
    use alloc::string::String;
    use core::fmt;

    #[derive(Debug)]
    pub enum ErrorKind {
        UnexpectedEof,
        InvalidData,
        WriteZero,
        Other,
    }

    #[derive(Debug)]
    pub struct Error {
        kind: ErrorKind,
        message: String,
    }

    impl Error {
        pub fn new<E>(kind: ErrorKind, error: E) -> Error
        where
            E: Into<Box<dyn fmt::Debug + Send + Sync>>,
        {
            Error {
                kind,
                message: alloc::format!("{:?}", error.into()),
            }
        }

        pub fn kind(&self) -> &ErrorKind {
            &self.kind
        }
    }

    impl fmt::Display for Error {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}: {}", self.kind, self.message)
        }
    }

    /// A minimal, allocation-free stand-in for `std::io::Read`, covering
    /// the slice- and `Vec`-backed sources this crate actually reads from.
    pub trait Read {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error>;

        fn read_exact(&mut self, mut buf: &mut [u8]) -> Result<(), Error> {
            while !buf.is_empty() {
                match self.read(buf)? {
                    0 => {
                        return Err(Error::new(
                            ErrorKind::UnexpectedEof,
                            "failed to fill whole buffer",
                        ))
                    }
                    n => buf = &mut buf[n..],
                }
            }
            Ok(())
        }
    }

    pub trait Write {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Error>;
        fn flush(&mut self) -> Result<(), Error>;

        fn write_all(&mut self, mut buf: &[u8]) -> Result<(), Error> {
            while !buf.is_empty() {
                match self.write(buf)? {
                    0 => return Err(Error::new(ErrorKind::WriteZero, "failed to write whole buffer")),
                    n => buf = &buf[n..],
                }
            }
            Ok(())
        }
    }

    impl Read for &[u8] {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
            let amt = core::cmp::min(buf.len(), self.len());
            let (head, tail) = self.split_at(amt);
            buf[..amt].copy_from_slice(head);
            *self = tail;
            Ok(amt)
        }
    }

    impl Write for alloc::vec::Vec<u8> {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
            self.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<(), Error> {
            Ok(())
        }
    }
}

#[cfg(not(feature = "std"))]
pub use no_std_io::{Error, ErrorKind, Read, Write};
