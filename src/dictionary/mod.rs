//! Decode-side support for content dictionaries.
//!
//! Dictionary *training* (selecting the bytes a dictionary should contain
//! from a corpus) is out of scope for this crate; building a [`Dictionary`]
//! by parsing a dictionary produced elsewhere is not.

pub use crate::decoding::dictionary::{Dictionary, DictionaryDecodeError, MAGIC_NUM};
