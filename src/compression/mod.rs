//! Compression and decompression helpers.
//!
//! The only codec in the 3DS loader path is the backwards LZSS variant
//! applied to the ExeFS `.code` section, implemented in [`lzss`]. It is a
//! pure, allocation-checked decoder with no dependencies, so unlike heavier
//! codecs it is not gated behind a Cargo feature.
//!
//! ## Choosing the right function
//!
//! * Most callers never touch this module directly:
//!   [`crate::formats::ncch::NcchReader::load_exefs_section`] decompresses
//!   `.code` automatically when the ExHeader compression flag is set.
//! * To decode a blob you already hold, use [`lzss::decompress`]; use
//!   [`lzss::decompressed_size`] first if you only need the output size.

pub mod lzss;
