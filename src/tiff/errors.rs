//! Custom error types for TIFF processing

use std::fmt;
use std::io;

/// TIFF-specific error types
#[derive(Debug)]
pub enum TiffError {
    /// I/O error
    IoError(io::Error),
    /// Invalid TIFF header
    InvalidHeader,
    /// Invalid byte order marker
    InvalidByteOrder(u16),
    /// Invalid BigTIFF header
    InvalidBigTIFFHeader,
    /// Unsupported TIFF version
    UnsupportedVersion(u16),
    /// Tag not found
    TagNotFound(u16),
    /// Unsupported field type
    UnsupportedFieldType(u16),
    /// Unsupported compression method
    UnsupportedCompression(u64),
    /// Image dimensions not found
    MissingDimensions,
    /// The file does not look like a TIFF or BigTIFF file at all (bad magic)
    NotATiff(String),
    /// The path given to a reader or writer could not be opened
    FileNotFoundError(String),
    /// Structurally broken data that a strict reader refuses to repair
    Corrupt(String),
    /// A codec produced or consumed data inconsistent with its own framing
    CodecCorrupt(String),
    /// An IFD is missing required tags or has self-contradictory tags
    InvalidIfd(String),
    /// A caller-supplied parameter fell outside its documented range
    ParameterOutOfRange(String),
    /// A write-mode method was called in a state that forbids it
    IllegalStateChange(String),
    /// A requested region/tile grid would allocate an unreasonable amount of memory
    TooLargeArea(String),
    /// Fewer bytes were available than the tile/strip framing promised
    TruncatedData(String),
    /// Two values that must agree (e.g. tile grid vs strip layout) do not
    ParameterMismatch(String),
    /// A tag required for the current operation is absent
    MissingTag(u16),
    /// A requested compression/codec is recognized but intentionally unimplemented
    CodecUnsupported(String),
    /// A label matrix was floating-point or wider than 32 bits per element
    NonMatrixLabel(String),
    /// A label matrix contained a negative value
    NegativeLabel(i64),
    /// Generic error with message
    GenericError(String),
}

impl fmt::Display for TiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TiffError::IoError(e) => write!(f, "I/O error: {}", e),
            TiffError::InvalidHeader => write!(f, "Invalid TIFF header"),
            TiffError::InvalidByteOrder(v) => write!(f, "Invalid byte order marker: {:#06x}", v),
            TiffError::InvalidBigTIFFHeader => write!(f, "Invalid BigTIFF header"),
            TiffError::UnsupportedVersion(v) => write!(f, "Unsupported TIFF version: {}", v),
            TiffError::TagNotFound(tag) => write!(f, "Tag not found: {}", tag),
            TiffError::UnsupportedFieldType(ft) => write!(f, "Unsupported field type: {}", ft),
            TiffError::UnsupportedCompression(c) => write!(f, "Unsupported compression method: {}", c),
            TiffError::MissingDimensions => write!(f, "Image dimensions not found"),
            TiffError::NotATiff(msg) => write!(f, "Not a TIFF file: {}", msg),
            TiffError::FileNotFoundError(path) => write!(f, "File not found: {}", path),
            TiffError::Corrupt(msg) => write!(f, "Corrupt TIFF structure: {}", msg),
            TiffError::CodecCorrupt(msg) => write!(f, "Corrupt compressed data: {}", msg),
            TiffError::InvalidIfd(msg) => write!(f, "Invalid IFD: {}", msg),
            TiffError::ParameterOutOfRange(msg) => write!(f, "Parameter out of range: {}", msg),
            TiffError::IllegalStateChange(msg) => write!(f, "Illegal state change: {}", msg),
            TiffError::TooLargeArea(msg) => write!(f, "Requested area too large: {}", msg),
            TiffError::TruncatedData(msg) => write!(f, "Truncated data: {}", msg),
            TiffError::ParameterMismatch(msg) => write!(f, "Parameter mismatch: {}", msg),
            TiffError::MissingTag(tag) => write!(f, "Missing required tag: {}", tag),
            TiffError::CodecUnsupported(name) => write!(f, "Codec not supported: {}", name),
            TiffError::NonMatrixLabel(msg) => write!(f, "Not a valid label matrix: {}", msg),
            TiffError::NegativeLabel(v) => write!(f, "Label matrix contains negative label: {}", v),
            TiffError::GenericError(msg) => write!(f, "TIFF error: {}", msg),
        }
    }
}

impl TiffError {
    /// True for errors that mean "this is not a well-formed TIFF", as
    /// opposed to I/O failures or caller misuse. Used by
    /// `TiffReader::try_load` to decide whether a relaxed
    /// `require_valid_tiff` should swallow the error.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            TiffError::InvalidHeader
                | TiffError::InvalidByteOrder(_)
                | TiffError::InvalidBigTIFFHeader
                | TiffError::UnsupportedVersion(_)
                | TiffError::NotATiff(_)
                | TiffError::Corrupt(_)
                | TiffError::InvalidIfd(_)
        )
    }
}

impl std::error::Error for TiffError {}

impl From<io::Error> for TiffError {
    fn from(error: io::Error) -> Self {
        TiffError::IoError(error)
    }
}

/// Result type for TIFF operations
pub type TiffResult<T> = Result<T, TiffError>;

impl From<String> for TiffError {
    fn from(msg: String) -> Self {
        TiffError::GenericError(msg)
    }
}

impl From<serde_json::Error> for TiffError {
    fn from(error: serde_json::Error) -> Self {
        TiffError::GenericError(format!("JSON error: {}", error))
    }
}
