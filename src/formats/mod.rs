//! Parsers for Nintendo 3DS binary formats.
//!
//! Each submodule targets one format family. All parsers follow the same
//! conventions:
//!
//! * **Generic over** [`std::io::Read`] + [`std::io::Seek`] - pass a
//!   [`std::fs::File`], a [`std::io::Cursor`], a memory-mapped region, or
//!   anything else that implements both traits. The stateful
//!   [`ncch::NcchReader`] additionally wants [`crate::source::Source`] so it
//!   can validate offsets against the backing length and spawn the
//!   independent RomFS cursor.
//! * **Metadata only** - `parse` methods read headers and build an
//!   in-memory description. Section data is read on demand, never eagerly.
//! * **Block units** - NCCH region fields are stored on disk in 0x200-byte
//!   media units; parsers convert them to byte values exactly once, so
//!   everything downstream works in plain byte offsets.
//! * **No crypto** - encrypted images are detected via the program-id
//!   consistency rule and refused with [`crate::Error::Encrypted`].
//!
//! ## Format overview
//!
//! | Module      | Format   | Description |
//! |-------------|----------|-------------|
//! | [`ncsd`]    | NCSD     | Multi-partition card/NAND dump; the first partition is the bootable NCCH |
//! | [`ncch`]    | NCCH     | Executable/content partition; header plus the stateful reader |
//! | [`exheader`]| ExHeader | Code-set layout, compression flag, ARM11 system-local capabilities |
//! | [`exefs`]   | ExeFS    | Fixed directory of up to 8 named sections (`.code`, `icon`, `banner`, `logo`) |
//! | [`romfs`]   | RomFS    | Read-only filesystem region; located and handed off, not parsed |

pub mod exefs;
pub mod exheader;
pub mod ncch;
pub mod ncsd;
pub mod romfs;
