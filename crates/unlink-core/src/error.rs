use std::fmt;
use std::io;

/// Errors surfaced while reading the ROM buffer or source-tree byte ranges.
#[derive(Debug)]
pub enum RomError {
    /// A read fell outside `[0, trim)` or the underlying buffer.
    BadOffset { offset: usize, len: usize, avail: usize },
    /// The vector-init walk found an opcode other than the expected BSR.L/RTS sequence.
    MalformedVectorInit { offset: usize, found: u32 },
}

impl fmt::Display for RomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RomError::BadOffset { offset, len, avail } => write!(
                f,
                "read of {len} bytes at 0x{offset:X} exceeds available 0x{avail:X}"
            ),
            RomError::MalformedVectorInit { offset, found } => write!(
                f,
                "vector-init walk expected BSR.L or RTS at 0x{offset:X}, found 0x{found:08X}"
            ),
        }
    }
}

impl std::error::Error for RomError {}

/// Errors surfaced while loading and parsing an annotation (`-info.txt`) file.
#[derive(Debug)]
pub enum ManualError {
    /// A directive offset was lower than one already seen earlier in the file.
    OutOfOrder { offset: usize, prev: usize },
    /// `ISLANDGUESS` appeared at an offset other than zero.
    IslandGuessNotAtZero { offset: usize },
    Io(io::Error),
}

impl fmt::Display for ManualError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManualError::OutOfOrder { offset, prev } => write!(
                f,
                "annotation file offsets out of order: 0x{offset:X} follows 0x{prev:X}"
            ),
            ManualError::IslandGuessNotAtZero { offset } => write!(
                f,
                "ISLANDGUESS directive at 0x{offset:X}, must appear only at offset 0"
            ),
            ManualError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for ManualError {}

impl From<io::Error> for ManualError {
    fn from(e: io::Error) -> Self {
        ManualError::Io(e)
    }
}

/// Unified error type for the unlinker engine.
#[derive(Debug)]
pub enum Error {
    Rom(RomError),
    Manual(ManualError),
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Rom(e) => write!(f, "rom error: {e}"),
            Error::Manual(e) => write!(f, "annotation error: {e}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<RomError> for Error {
    fn from(e: RomError) -> Self {
        Error::Rom(e)
    }
}

impl From<ManualError> for Error {
    fn from(e: ManualError) -> Self {
        Error::Manual(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
