//! ExHeader (Extended Header) - code layout and capability metadata.
//!
//! Every NCCH with executable content carries a 0x800-byte extended header
//! immediately after the NCCH header. The front half is the System Control
//! Info (code-set layout) plus the Access Control Info (ARM11/ARM9
//! capabilities); the back half is an access descriptor that repeats the
//! ACI under an RSA signature and is not interpreted here.
//!
//! ## Layout (fields this parser consumes)
//! ```text
//! [0x000] Application title        (8 bytes, NUL-padded ASCII)
//! [0x00D] SCI flags                (1 byte; bit 0 = .code is LZSS-compressed)
//! [0x00E] Remaster version         (u16 LE)
//! [0x010] .text  {addr, pages, size}  (3 × u32 LE)
//! [0x01C] Stack size               (u32 LE)
//! [0x020] .rodata {addr, pages, size}
//! [0x030] .data  {addr, pages, size}
//! [0x03C] BSS size                 (u32 LE)
//! [0x040] Dependency list          (48 × u64, skipped)
//! [0x1C0] System info              (0x40 bytes, skipped)
//! [0x200] ARM11 program id         (u64 LE)
//! [0x208] Core version             (u32 LE)
//! [0x20C] Flag1, Flag2, Flag0      (1 byte each; Flag0 bits 4..8 = system mode)
//! [0x20F] Thread priority          (1 byte)
//! [0x36F] Resource limit category  (1 byte)
//! [0x400] Access descriptor        (0x400 bytes, skipped)
//! ```

use std::io::{Read, Seek, SeekFrom};

use crate::Result;
use crate::utils::{bytesa, le_u16, le_u32, le_u64, u8};

/// Total size of the on-disk ExHeader structure.
pub const EXHEADER_SIZE: u64 = 0x800;

/// Program-id bits that may legitimately differ between the ExHeader and
/// the NCCH header: they distinguish an update title from its base title.
pub const UPDATE_TITLE_MASK: u64 = 0x0000_000E_0000_0000;

/// One code-set region descriptor (`.text`, `.rodata`, or `.data`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeSetInfo {
    /// Virtual load address.
    pub address: u32,
    /// Region size in 0x1000-byte pages.
    pub pages: u32,
    /// Region size in bytes.
    pub size: u32,
}

impl CodeSetInfo {
    fn parse<R: Read>(r: &mut R) -> Result<Self> {
        Ok(Self {
            address: le_u32(r)?,
            pages: le_u32(r)?,
            size: le_u32(r)?,
        })
    }
}

/// Parsed ExHeader.
#[derive(Debug, Clone)]
pub struct ExHeader {
    /// Application title, NUL-padded.
    pub title: [u8; 8],
    /// SCI flags byte; bit 0 marks the `.code` section as LZSS-compressed.
    pub flags: u8,
    pub remaster_version: u16,
    /// `.text` region; its address is the process entry point.
    pub text: CodeSetInfo,
    pub stack_size: u32,
    pub rodata: CodeSetInfo,
    pub data: CodeSetInfo,
    pub bss_size: u32,
    /// Program id from the ARM11 system-local capabilities.
    pub program_id: u64,
    pub core_version: u32,
    /// Flag0 from the ARM11 system-local capabilities (ideal processor,
    /// affinity mask, system mode bitfields).
    pub flag0: u8,
    /// ARM11 main-thread priority.
    pub priority: u8,
    pub resource_limit_category: u8,
}

impl ExHeader {
    /// Parse an ExHeader from `r`.
    ///
    /// The reader must be positioned at the start of the structure. The
    /// stream is left positioned past the full 0x800 bytes.
    pub fn parse<R: Read + Seek>(r: &mut R) -> Result<Self> {
        let start = r.stream_position()?;

        let title = bytesa::<8>(r)?;
        let _reserved = bytesa::<5>(r)?;
        let flags = u8(r)?;
        let remaster_version = le_u16(r)?;
        let text = CodeSetInfo::parse(r)?;
        let stack_size = le_u32(r)?;
        let rodata = CodeSetInfo::parse(r)?;
        let _reserved = le_u32(r)?;
        let data = CodeSetInfo::parse(r)?;
        let bss_size = le_u32(r)?;

        // Dependency list and system info fill out the SCI; the ARM11
        // system-local capabilities open the ACI at +0x200.
        r.seek(SeekFrom::Start(start + 0x200))?;
        let program_id = le_u64(r)?;
        let core_version = le_u32(r)?;
        let _flag1 = u8(r)?;
        let _flag2 = u8(r)?;
        let flag0 = u8(r)?;
        let priority = u8(r)?;

        // Resource limit descriptors, storage info, and the service access
        // lists sit between here and the category byte.
        r.seek(SeekFrom::Start(start + 0x36F))?;
        let resource_limit_category = u8(r)?;

        // Kernel capabilities, ARM9 access control, and the access
        // descriptor round the structure out to 0x800 bytes.
        r.seek(SeekFrom::Start(start + EXHEADER_SIZE))?;

        Ok(Self {
            title,
            flags,
            remaster_version,
            text,
            stack_size,
            rodata,
            data,
            bss_size,
            program_id,
            core_version,
            flag0,
            priority,
            resource_limit_category,
        })
    }

    /// True when the ExeFS `.code` section is LZSS-compressed.
    pub fn is_code_compressed(&self) -> bool {
        self.flags & 1 == 1
    }

    /// System mode requested by the title (Flag0 bits 4..8).
    pub fn system_mode(&self) -> u8 {
        self.flag0 >> 4
    }

    /// Application title with the NUL padding stripped.
    pub fn title_str(&self) -> String {
        let end = self.title.iter().position(|&b| b == 0).unwrap_or(8);
        String::from_utf8_lossy(&self.title[..end]).into_owned()
    }

    /// Check this header's program id against the NCCH header's.
    ///
    /// The ids must agree outside the [`UPDATE_TITLE_MASK`] bits; a
    /// disagreement means the ExHeader bytes were read from an encrypted
    /// image.
    pub fn matches_program_id(&self, ncch_program_id: u64) -> bool {
        (self.program_id & !UPDATE_TITLE_MASK) == ncch_program_id
    }
}
