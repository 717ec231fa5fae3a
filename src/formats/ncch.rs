//! NCCH (Nintendo Content Container Header) - executable content partition.
//!
//! An NCCH packages one title's content: the extended header describing its
//! code layout and capabilities, an ExeFS holding the program image and
//! small named assets, and optionally a RomFS. Card dumps wrap the NCCH in
//! an outer NCSD; [`NcchReader`] recognises both and always works on the
//! bootable partition.
//!
//! ## Header layout (0x200 bytes; region fields in 0x200-byte units)
//! ```text
//! [0x000] RSA-2048 signature        (0x100 bytes, not verified)
//! [0x100] Magic "NCCH"              (4 bytes)
//! [0x104] Content size              (u32 LE, units)
//! [0x108] Partition id              (u64 LE)
//! [0x110] Maker code                (u16 LE)
//! [0x112] Version                   (u16 LE)
//! [0x114] Seed check word           (u32 LE)
//! [0x118] Program id                (u64 LE)
//! [0x120] Reserved                  (0x10 bytes)
//! [0x130] Logo region hash          (0x20 bytes)
//! [0x150] Product code              (0x10 bytes)
//! [0x160] ExHeader hash             (0x20 bytes)
//! [0x180] ExHeader size             (u32 LE, bytes)
//! [0x184] Reserved                  (u32)
//! [0x188] Flags                     (8 bytes)
//! [0x190] Plain region {offset, size}  (2 × u32 LE, units)
//! [0x198] Logo region {offset, size}   (2 × u32 LE, units)
//! [0x1A0] ExeFS {offset, size}         (2 × u32 LE, units)
//! [0x1A8] ExeFS hash region size       (u32 LE, units)
//! [0x1AC] Reserved                     (u32)
//! [0x1B0] RomFS {offset, size}         (2 × u32 LE, units)
//! [0x1B8] RomFS hash region size       (u32 LE, units)
//! [0x1BC] Reserved                     (u32)
//! [0x1C0] ExeFS superblock hash        (0x20 bytes)
//! [0x1E0] RomFS superblock hash        (0x20 bytes)
//! ```
//!
//! Region offsets are relative to the start of the NCCH and are converted
//! to byte values once, at parse time.

use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;

use crate::compression::lzss;
use crate::formats::exefs::{CODE_SECTION_NAME, EXEFS_HEADER_SIZE, ExeFsHeader};
use crate::formats::exheader::ExHeader;
use crate::formats::ncsd::Container;
use crate::formats::romfs::{IVFC_HEADER_SIZE, RomFs};
use crate::source::{FileSource, Source};
use crate::utils::{bytesa, bytesv, le_u16, le_u32, le_u64, magic};
use crate::{Error, Result};

/// Media unit: every NCCH region field counts these.
pub const BLOCK_SIZE: u64 = 0x200;

/// Size of the on-disk NCCH header.
pub const NCCH_HEADER_SIZE: u64 = 0x200;

/// Parsed NCCH header.
///
/// Region fields are byte values relative to the start of the NCCH.
#[derive(Debug, Clone)]
pub struct NcchHeader {
    /// Total content size in bytes.
    pub content_size: u64,
    pub partition_id: u64,
    pub maker_code: u16,
    pub version: u16,
    /// Title/program id.
    pub program_id: u64,
    /// Product code, NUL-padded (e.g. `CTR-P-XXXX`).
    pub product_code: [u8; 16],
    /// ExeFS region offset in bytes.
    pub exefs_offset: u64,
    /// ExeFS region size in bytes.
    pub exefs_size: u64,
    /// RomFS region offset in bytes (0 when absent).
    pub romfs_offset: u64,
    /// RomFS region size in bytes (0 when absent).
    pub romfs_size: u64,
}

impl NcchHeader {
    /// Parse an NCCH header from `r`.
    ///
    /// The reader must be positioned at the start of the NCCH (i.e. at the
    /// signature) and is left at the end of the header.
    pub fn parse<R: Read + Seek>(r: &mut R) -> Result<Self> {
        // RSA-2048 signature over the header; not verified here.
        r.seek(SeekFrom::Current(0x100))?;
        magic(r, b"NCCH")?;

        let content_size = u64::from(le_u32(r)?) * BLOCK_SIZE;
        let partition_id = le_u64(r)?;
        let maker_code = le_u16(r)?;
        let version = le_u16(r)?;
        let _seed_check = le_u32(r)?;
        let program_id = le_u64(r)?;

        // Reserved + logo region hash.
        r.seek(SeekFrom::Current(0x10 + 0x20))?;
        let product_code = bytesa::<0x10>(r)?;
        let _exheader_hash = bytesa::<0x20>(r)?;
        let _exheader_size = le_u32(r)?;
        let _reserved = le_u32(r)?;
        let _flags = bytesa::<8>(r)?;

        let _plain_offset = le_u32(r)?;
        let _plain_size = le_u32(r)?;
        let _logo_offset = le_u32(r)?;
        let _logo_size = le_u32(r)?;
        let exefs_offset = u64::from(le_u32(r)?) * BLOCK_SIZE;
        let exefs_size = u64::from(le_u32(r)?) * BLOCK_SIZE;
        let _exefs_hash_region = le_u32(r)?;
        let _reserved = le_u32(r)?;
        let romfs_offset = u64::from(le_u32(r)?) * BLOCK_SIZE;
        let romfs_size = u64::from(le_u32(r)?) * BLOCK_SIZE;
        let _romfs_hash_region = le_u32(r)?;
        let _reserved = le_u32(r)?;

        // ExeFS and RomFS superblock hashes close out the header.
        r.seek(SeekFrom::Current(0x40))?;

        Ok(Self {
            content_size,
            partition_id,
            maker_code,
            version,
            program_id,
            product_code,
            exefs_offset,
            exefs_size,
            romfs_offset,
            romfs_size,
        })
    }

    /// RomFS region as `(byte offset relative to the NCCH, byte size)`, or
    /// [`None`] when the image carries no RomFS.
    pub fn romfs_region(&self) -> Option<(u64, u64)> {
        if self.romfs_offset == 0 || self.romfs_size == 0 {
            None
        } else {
            Some((self.romfs_offset, self.romfs_size))
        }
    }
}

/// Everything `load` parses, grouped so it cannot exist half-initialised.
#[derive(Debug)]
struct Loaded {
    /// Absolute byte offset of the NCCH within the file (0, or 0x4000
    /// inside an NCSD).
    base: u64,
    /// Backing source length at load time; every region is validated
    /// against it.
    file_len: u64,
    header: NcchHeader,
    exheader: ExHeader,
    /// Absolute byte offset of the ExeFS header.
    exefs_base: u64,
    exefs: ExeFsHeader,
}

impl Loaded {
    fn read_from<S: Source>(source: &mut S) -> Result<Self> {
        let file_len = source.len()?;

        let container = Container::detect(source)?;
        let base = container.ncch_offset();
        if container == Container::Ncsd {
            debug!("NCSD image: using the first (bootable) NCCH partition");
        }

        source.seek(SeekFrom::Start(base))?;
        let header = NcchHeader::parse(source)?;

        // The ExHeader sits directly after the NCCH header.
        source.seek(SeekFrom::Start(base + NCCH_HEADER_SIZE))?;
        let exheader = ExHeader::parse(source)?;

        debug!("title: {}", exheader.title_str());
        debug!("program id: {:016X}", header.program_id);
        debug!("code compressed: {}", exheader.is_code_compressed());
        debug!("entry point: {:#010x}", exheader.text.address);
        debug!("code size: {:#x}", exheader.text.size);
        debug!("stack size: {:#x}", exheader.stack_size);
        debug!("bss size: {:#x}", exheader.bss_size);
        debug!("core version: {}", exheader.core_version);
        debug!("thread priority: {:#x}", exheader.priority);
        debug!("resource limit category: {}", exheader.resource_limit_category);
        debug!("system mode: {}", exheader.system_mode());

        if !exheader.matches_program_id(header.program_id) {
            // In a plaintext image the two ids agree; garbage here means
            // the ExHeader bytes are ciphertext.
            return Err(Error::Encrypted);
        }

        let exefs_base = base + header.exefs_offset;
        debug!(
            "ExeFS: offset {:#x}, size {:#x}",
            header.exefs_offset, header.exefs_size
        );
        source.seek(SeekFrom::Start(exefs_base))?;
        let exefs = ExeFsHeader::parse(source)?;

        Ok(Self {
            base,
            file_len,
            header,
            exheader,
            exefs_base,
            exefs,
        })
    }
}

/// Stateful reader over one NCCH image.
///
/// Construction never touches the source; the container chain is parsed
/// lazily by [`load`](Self::load) or implicitly by the first accessor, and
/// exactly once. A single reader is not meant to be shared across threads;
/// distinct readers (and the RomFS cursors they hand out) are fully
/// independent.
pub struct NcchReader<S> {
    source: S,
    loaded: Option<Loaded>,
}

impl NcchReader<FileSource> {
    /// Open the image file at `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::new(FileSource::open(path)?))
    }
}

impl<S: Source> NcchReader<S> {
    /// Bind to an opened source.
    pub fn new(source: S) -> Self {
        Self {
            source,
            loaded: None,
        }
    }

    /// Rebind to a different source, discarding any parsed state.
    pub fn open(&mut self, source: S) {
        self.source = source;
        self.loaded = None;
    }

    /// Parse the container chain: NCSD recognition, NCCH header, ExHeader
    /// (with the encrypted-image check), ExeFS directory.
    ///
    /// Idempotent - repeated calls after the first success return without
    /// touching the source. A failed load leaves the reader unloaded and
    /// safe to call again.
    pub fn load(&mut self) -> Result<()> {
        self.state().map(|_| ())
    }

    /// Parsed NCCH header (loads on first use).
    pub fn header(&mut self) -> Result<&NcchHeader> {
        Ok(&self.state()?.header)
    }

    /// Parsed ExHeader (loads on first use).
    pub fn exheader(&mut self) -> Result<&ExHeader> {
        Ok(&self.state()?.exheader)
    }

    /// Program id of the NCCH partition (loads on first use).
    pub fn program_id(&mut self) -> Result<u64> {
        Ok(self.state()?.header.program_id)
    }

    /// Read the ExeFS section `name` into a freshly allocated buffer.
    ///
    /// The section's byte range is validated against the backing length
    /// before the read. `.code` is LZSS-decompressed when the ExHeader
    /// compression flag is set; every other section (and `.code` without
    /// the flag) is returned verbatim. Returns [`Error::NotPresent`] when
    /// no used slot carries `name`.
    pub fn load_exefs_section(&mut self, name: &str) -> Result<Vec<u8>> {
        let (abs, size, compressed) = {
            let state = self.state()?;
            let section = state.exefs.section(name).ok_or(Error::NotPresent)?;
            let abs = state.exefs_base + EXEFS_HEADER_SIZE + u64::from(section.offset);
            if abs + u64::from(section.size) > state.file_len {
                return Err(Error::InvalidRange);
            }
            let compressed =
                name == CODE_SECTION_NAME && state.exheader.is_code_compressed();
            (abs, section.size, compressed)
        };

        debug!("section {name}: offset {abs:#x}, size {size:#x}, compressed: {compressed}");

        self.source.seek(SeekFrom::Start(abs))?;
        let raw = bytesv(&mut self.source, size as usize)?;

        if compressed {
            lzss::decompress(&raw)
        } else {
            Ok(raw)
        }
    }

    /// Hand off the RomFS level-3 payload as an independently-positioned
    /// cursor plus its absolute byte range.
    ///
    /// Returns [`Error::NotPresent`] when the NCCH carries no RomFS. The
    /// returned handle owns a fresh cursor over the same backing bytes, so
    /// reading it never disturbs this reader.
    pub fn romfs(&mut self) -> Result<RomFs<S>> {
        let (offset, size) = {
            let state = self.state()?;
            let Some((region_offset, region_size)) = state.header.romfs_region() else {
                debug!("NCCH has no RomFS");
                return Err(Error::NotPresent);
            };
            // The IVFC container header occupies the front of the region;
            // the payload is what remains.
            if region_size < IVFC_HEADER_SIZE {
                return Err(Error::InvalidRange);
            }
            let offset = state.base + region_offset + IVFC_HEADER_SIZE;
            let size = region_size - IVFC_HEADER_SIZE;
            if offset + size > state.file_len {
                return Err(Error::InvalidRange);
            }
            (offset, size)
        };

        debug!("RomFS: offset {offset:#x}, size {size:#x}");

        let cursor = self.source.reopen()?;
        Ok(RomFs::new(cursor, offset, size))
    }

    /// Parse on first use; afterwards return the cached state.
    fn state(&mut self) -> Result<&Loaded> {
        let state = match self.loaded.take() {
            Some(state) => state,
            None => Loaded::read_from(&mut self.source)?,
        };
        Ok(self.loaded.insert(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const PROGRAM_ID: u64 = 0x0004_0000_0012_3400;

    /// Assemble a minimal plaintext NCCH: header at 0, ExHeader at 0x200,
    /// ExeFS at block 5 (0xA00), section data after the directory, RomFS
    /// (when given) on the next block boundary.
    fn build_image(
        exh_program_id: u64,
        compressed: bool,
        sections: &[(&str, &[u8])],
        romfs_payload: Option<&[u8]>,
    ) -> Vec<u8> {
        let mut dir = vec![0u8; 0x200];
        let mut data = Vec::new();
        for (i, (name, bytes)) in sections.iter().enumerate() {
            let at = i * 16;
            dir[at..at + name.len()].copy_from_slice(name.as_bytes());
            dir[at + 8..at + 12].copy_from_slice(&(data.len() as u32).to_le_bytes());
            dir[at + 12..at + 16].copy_from_slice(&(bytes.len() as u32).to_le_bytes());
            data.extend_from_slice(bytes);
        }

        let exefs_blocks = ((0x200 + data.len()) as u64).div_ceil(0x200) as u32;
        let romfs_offset_blocks = 5 + exefs_blocks;

        let mut image = vec![0u8; 0xA00];
        image[0x100..0x104].copy_from_slice(b"NCCH");
        image[0x118..0x120].copy_from_slice(&PROGRAM_ID.to_le_bytes());
        image[0x1A0..0x1A4].copy_from_slice(&5u32.to_le_bytes());
        image[0x1A4..0x1A8].copy_from_slice(&exefs_blocks.to_le_bytes());

        // ExHeader: title, flags, ARM11 program id.
        image[0x200..0x205].copy_from_slice(b"tests");
        image[0x20D] = u8::from(compressed);
        image[0x400..0x408].copy_from_slice(&exh_program_id.to_le_bytes());

        image.extend_from_slice(&dir);
        image.extend_from_slice(&data);

        if let Some(payload) = romfs_payload {
            let romfs_blocks = ((0x1000 + payload.len()) as u64).div_ceil(0x200) as u32;
            image[0x1B0..0x1B4].copy_from_slice(&romfs_offset_blocks.to_le_bytes());
            image[0x1B4..0x1B8].copy_from_slice(&romfs_blocks.to_le_bytes());

            image.resize(romfs_offset_blocks as usize * 0x200 + 0x1000, 0);
            image.extend_from_slice(payload);
            image.resize((romfs_offset_blocks + romfs_blocks) as usize * 0x200, 0);
        }

        image
    }

    fn reader_over(image: Vec<u8>) -> NcchReader<Cursor<Vec<u8>>> {
        NcchReader::new(Cursor::new(image))
    }

    #[test]
    fn bare_ncch_reads_an_uncompressed_code_section() {
        let code = [0xAB; 0x40];
        let image = build_image(
            PROGRAM_ID,
            false,
            &[(".code", &code), ("icon", &[1, 2, 3])],
            None,
        );
        let mut reader = reader_over(image);

        assert_eq!(reader.load_exefs_section(".code").unwrap(), code);
        assert_eq!(reader.load_exefs_section("icon").unwrap(), [1, 2, 3]);
        assert_eq!(reader.program_id().unwrap(), PROGRAM_ID);
    }

    #[test]
    fn ncsd_wrapper_resolves_to_the_first_partition() {
        let inner = build_image(PROGRAM_ID, false, &[(".code", b"x")], None);
        let mut image = vec![0u8; 0x4000];
        image[0x100..0x104].copy_from_slice(b"NCSD");
        image.extend_from_slice(&inner);

        let mut reader = reader_over(image);
        assert_eq!(reader.program_id().unwrap(), PROGRAM_ID);
        assert_eq!(reader.load_exefs_section(".code").unwrap(), b"x");
    }

    #[test]
    fn compressed_code_is_decompressed() {
        // Four literals under one 0x00 control byte; footer: start 8 back,
        // stop 13 back, 4 additional bytes.
        let mut blob = b"CODE".to_vec();
        blob.push(0x00);
        blob.extend_from_slice(&[0x0D, 0x00, 0x00, 0x08]);
        blob.extend_from_slice(&4u32.to_le_bytes());

        let mut expected = blob.clone();
        expected.extend_from_slice(b"CODE");

        let mut reader = reader_over(build_image(PROGRAM_ID, true, &[(".code", &blob)], None));
        assert_eq!(reader.load_exefs_section(".code").unwrap(), expected);
    }

    #[test]
    fn compression_flag_only_applies_to_code() {
        // The icon carries bytes that are not a valid LZSS stream; with the
        // flag set it must still be returned verbatim.
        let image = build_image(
            PROGRAM_ID,
            true,
            &[("icon", b"not lzss"), (".code", b"\x00\x00\x00\x00\x00\x00\x00\x00")],
            None,
        );
        let mut reader = reader_over(image);
        assert_eq!(reader.load_exefs_section("icon").unwrap(), b"not lzss");
    }

    #[test]
    fn encrypted_image_is_refused() {
        // Differs from the NCCH id outside the update-title bits.
        let mut reader = reader_over(build_image(0x0004_0200_0012_3400, false, &[], None));
        assert!(matches!(reader.load(), Err(Error::Encrypted)));
    }

    #[test]
    fn update_title_bits_are_tolerated() {
        let exh_id = PROGRAM_ID | 0x0000_000E_0000_0000;
        let mut reader = reader_over(build_image(exh_id, false, &[(".code", b"x")], None));
        assert!(reader.load().is_ok());
    }

    #[test]
    fn missing_section_is_not_present() {
        let image = build_image(
            PROGRAM_ID,
            false,
            &[(".code", b"c"), ("icon", b"i"), ("banner", b"b")],
            None,
        );
        let mut reader = reader_over(image);
        assert!(matches!(
            reader.load_exefs_section("logo"),
            Err(Error::NotPresent)
        ));
    }

    #[test]
    fn truncated_exefs_surfaces_an_io_error() {
        let mut image = build_image(PROGRAM_ID, false, &[], None);
        // Point the ExeFS far past the end of the file.
        image[0x1A0..0x1A4].copy_from_slice(&0x40u32.to_le_bytes());

        let mut reader = reader_over(image);
        assert!(matches!(reader.load(), Err(Error::Io(_))));
    }

    #[test]
    fn section_ranges_are_validated_against_the_file() {
        let mut image = build_image(PROGRAM_ID, false, &[(".code", &[0u8; 0x10])], None);
        // Inflate the directory's size field for slot 0 past the file end.
        image[0xA0C..0xA10].copy_from_slice(&0x1000u32.to_le_bytes());

        let mut reader = reader_over(image);
        assert!(matches!(
            reader.load_exefs_section(".code"),
            Err(Error::InvalidRange)
        ));
    }

    #[test]
    fn absent_romfs_is_not_present() {
        let mut reader = reader_over(build_image(PROGRAM_ID, false, &[], None));
        assert!(matches!(reader.romfs(), Err(Error::NotPresent)));
    }

    #[test]
    fn romfs_handoff_skips_the_ivfc_header() {
        let payload = b"romfs level three";
        let image = build_image(PROGRAM_ID, false, &[(".code", b"x")], Some(payload));
        let mut reader = reader_over(image);

        let mut romfs = reader.romfs().unwrap();
        // ExeFS spans 2 blocks (header + 1 byte), so the region starts at
        // block 7 and the payload follows the 0x1000-byte IVFC header.
        assert_eq!(romfs.offset(), 7 * 0x200 + 0x1000);
        assert_eq!(romfs.size(), 9 * 0x200 - 0x1000);

        let mut bytes = Vec::new();
        romfs.reader().unwrap().read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes.len() as u64, romfs.size());
        assert_eq!(&bytes[..payload.len()], payload);
        assert!(bytes[payload.len()..].iter().all(|&b| b == 0));

        // The hand-off cursor is independent: the reader still works.
        assert_eq!(reader.load_exefs_section(".code").unwrap(), b"x");
    }

    #[test]
    fn load_is_idempotent() {
        let mut reader = reader_over(build_image(PROGRAM_ID, false, &[(".code", b"ok")], None));
        reader.load().unwrap();
        reader.load().unwrap();
        assert_eq!(reader.load_exefs_section(".code").unwrap(), b"ok");
    }

    #[test]
    fn open_rebinds_and_discards_state() {
        let mut reader = reader_over(build_image(PROGRAM_ID, false, &[(".code", b"one")], None));
        assert_eq!(reader.load_exefs_section(".code").unwrap(), b"one");

        reader.open(Cursor::new(build_image(
            PROGRAM_ID,
            false,
            &[(".code", b"two")],
            None,
        )));
        assert_eq!(reader.load_exefs_section(".code").unwrap(), b"two");
    }

    #[test]
    fn garbage_magic_is_rejected() {
        let mut image = build_image(PROGRAM_ID, false, &[], None);
        image[0x100..0x104].copy_from_slice(b"XXXX");

        let mut reader = reader_over(image);
        assert!(matches!(reader.load(), Err(Error::BadMagic)));
    }

    #[test]
    fn header_captures_partition_metadata() {
        let mut image = build_image(PROGRAM_ID, false, &[], None);
        image[0x104..0x108].copy_from_slice(&8u32.to_le_bytes());
        image[0x108..0x110].copy_from_slice(&0x1122_3344_5566_7788u64.to_le_bytes());
        image[0x110..0x112].copy_from_slice(b"01");
        image[0x112..0x114].copy_from_slice(&2u16.to_le_bytes());
        image[0x150..0x15A].copy_from_slice(b"CTR-P-CTAP");

        let mut reader = reader_over(image);
        let header = reader.header().unwrap();
        assert_eq!(header.content_size, 8 * 0x200);
        assert_eq!(header.partition_id, 0x1122_3344_5566_7788);
        assert_eq!(header.maker_code, u16::from_le_bytes(*b"01"));
        assert_eq!(header.version, 2);
        assert_eq!(&header.product_code[..10], b"CTR-P-CTAP");
    }
}
