//! RomFS - read-only filesystem region hand-off.
//!
//! The NCCH header points at a RomFS region whose first 0x1000 bytes are an
//! IVFC (hash-tree) container header; the actual level-3 filesystem image
//! starts after it. This module does not interpret the filesystem - it
//! locates the payload and hands the caller an independently-positioned
//! cursor over it, which is what the archive layer consumes.
//!
//! The cursor is independent by construction (it comes from
//! [`crate::source::Source::reopen`]): reading RomFS bytes never disturbs
//! the [`crate::formats::ncch::NcchReader`] that produced the handle.

use std::io::{Read, SeekFrom, Take};

use crate::Result;
use crate::source::Source;

/// Size of the IVFC container header preceding the level-3 payload.
pub const IVFC_HEADER_SIZE: u64 = 0x1000;

/// An independent cursor over the RomFS level-3 payload of an NCCH.
#[derive(Debug)]
pub struct RomFs<S> {
    source: S,
    offset: u64,
    size: u64,
}

impl<S: Source> RomFs<S> {
    pub(crate) fn new(source: S, offset: u64, size: u64) -> Self {
        Self {
            source,
            offset,
            size,
        }
    }

    /// Absolute byte offset of the payload within the backing file.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Seek to the start of the payload and return a reader limited to it.
    ///
    /// The borrow ends when the [`Take`] is dropped; calling this again
    /// rewinds to the payload start.
    pub fn reader(&mut self) -> Result<Take<&mut S>> {
        self.source.seek(SeekFrom::Start(self.offset))?;
        Ok(self.source.by_ref().take(self.size))
    }

    /// Consume the handle, returning the raw cursor together with the
    /// absolute payload offset and size.
    pub fn into_parts(self) -> (S, u64, u64) {
        (self.source, self.offset, self.size)
    }
}
