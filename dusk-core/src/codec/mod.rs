//! Compact binary encoding for directory listings and index reports
//!
//! Values are built from two primitives: self-describing varints and
//! strings with a one-byte length prefix. See [`varint`] and [`record`]
//! for the exact layouts.

mod buffer;
mod record;
pub mod varint;

pub use buffer::{Decoder, Encoder, MAX_STRING_LEN};
pub use varint::{get_varint, put_varint};
