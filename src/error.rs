//! Library-wide error and result types.

use std::fmt;
use std::io;

/// Result alias used throughout ctrkit.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the library can produce.
///
/// Error messages are kept intentionally terse; callers that need richer
/// context should wrap `Error` in their own type.
#[derive(Debug)]
pub enum Error {
    /// A magic/signature field did not match the expected value.
    BadMagic,
    /// An offset or size field would read outside the backing source.
    InvalidRange,
    /// LZSS `.code` decompression failed (malformed footer or a
    /// back-reference outside the decoded buffer).
    Lzss,
    /// The ExHeader program id disagrees with the NCCH program id outside
    /// the update-title bits. The image is encrypted; this library does
    /// not decrypt.
    Encrypted,
    /// A requested optional region is absent: no ExeFS section with the
    /// given name, or the NCCH carries no RomFS. Informational rather
    /// than a corruption signal.
    NotPresent,
    /// An output buffer could not be allocated. Section sizes come from
    /// untrusted header fields, so allocation is allowed to fail.
    Allocation,
    /// An underlying I/O operation failed.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadMagic => write!(f, "bad magic value"),
            Error::InvalidRange => write!(f, "invalid offset or size"),
            Error::Lzss => write!(f, "lzss decompression failed"),
            Error::Encrypted => write!(f, "image is encrypted"),
            Error::NotPresent => write!(f, "section not present"),
            Error::Allocation => write!(f, "buffer allocation failed"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Error::Io(e) = self {
            Some(e)
        } else {
            None
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
