//! **ctrkit** - a reusable Rust library for parsing Nintendo 3DS (CTR) binary formats.
//!
//! The entry point for most callers is [`formats::ncch::NcchReader`], which
//! binds to a backing byte source (a file or an in-memory image), locates
//! the bootable NCCH partition (unwrapping an outer NCSD dump when present),
//! and hands out ExeFS sections, the RomFS region, and program metadata.
//!
//! # Supported formats
//! | Module | Format |
//! |--------|--------|
//! | [`formats::ncsd`]     | NCSD - multi-partition card/NAND dump wrapper |
//! | [`formats::ncch`]     | NCCH - executable/content partition container |
//! | [`formats::exheader`] | ExHeader - code layout and ARM11 capability metadata |
//! | [`formats::exefs`]    | ExeFS - fixed directory of up to 8 named sections |
//! | [`formats::romfs`]    | RomFS - read-only filesystem region hand-off |
//! | [`compression::lzss`] | Backwards LZSS - `.code` section compression |
//!
//! Encrypted images are detected (ExHeader/NCCH program-id mismatch) and
//! refused with [`Error::Encrypted`]; this library performs no decryption,
//! no signature checking, and no hash verification.

pub mod compression;
pub mod error;
pub mod formats;
pub mod source;
pub mod utils;

pub use error::{Error, Result};
