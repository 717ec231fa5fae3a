//! NCSD (Nintendo Card Storage Device) - multi-partition outer container.
//!
//! Card dumps (`.3ds`/`.cci`) and NAND images wrap their content in an NCSD
//! header that carves the medium into up to eight partitions. Partition 0
//! is the bootable executable content and is always an NCCH.
//!
//! ## Layout
//! ```text
//! [0x000] RSA-2048 signature of the header   (0x100 bytes)
//! [0x100] Magic "NCSD"                       (4 bytes)
//! [0x104] Image size in 0x200-byte units     (u32 LE)
//! [0x108] Media ID                           (u64 LE)
//! [0x110] Partition FS types                 (8 bytes)
//! [0x118] Partition crypt types              (8 bytes)
//! [0x120] Partition table: 8 × {offset, size} in 0x200-byte units
//! [...]   Exheader hash, flags, partition ID table, ...
//! ```
//!
//! Only partition 0 is ever consumed here, and on every known card image it
//! begins at byte 0x4000; the partition table is not read.

use std::io::{Read, Seek, SeekFrom};

use crate::Result;
use crate::utils::bytesa;

/// File offset of the 4-byte container magic (NCSD and NCCH both keep it
/// behind a 0x100-byte signature).
pub const MAGIC_OFFSET: u64 = 0x100;

/// Byte offset of the first (bootable) NCCH partition inside an NCSD image.
pub const FIRST_PARTITION_OFFSET: u64 = 0x4000;

/// Outer container kind, recognised from the magic at [`MAGIC_OFFSET`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// A bare NCCH partition starting at offset 0.
    Ncch,
    /// An NCSD wrapper; the bootable NCCH starts at
    /// [`FIRST_PARTITION_OFFSET`].
    Ncsd,
}

impl Container {
    /// Sniff the container kind of `r`.
    ///
    /// Reads the 4-byte magic at [`MAGIC_OFFSET`] and returns
    /// [`crate::Error::BadMagic`] when it is neither `NCCH` nor `NCSD`.
    pub fn detect<R: Read + Seek>(r: &mut R) -> Result<Self> {
        r.seek(SeekFrom::Start(MAGIC_OFFSET))?;
        match &bytesa::<4>(r)? {
            b"NCCH" => Ok(Container::Ncch),
            b"NCSD" => Ok(Container::Ncsd),
            _ => Err(crate::Error::BadMagic),
        }
    }

    /// Byte offset of the bootable NCCH partition for this container kind.
    pub fn ncch_offset(self) -> u64 {
        match self {
            Container::Ncch => 0,
            Container::Ncsd => FIRST_PARTITION_OFFSET,
        }
    }
}
