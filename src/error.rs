//! Error types for encoding and decoding.

use std::fmt;

/// Result type for encoder operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for decoder operations.
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Error type for encoder operations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Invalid image dimensions (zero or above the 16384 limit)
    InvalidDimensions {
        /// Image width
        width: u32,
        /// Image height
        height: u32,
    },
    /// Image buffer size doesn't match dimensions
    BufferSizeMismatch {
        /// Expected buffer size in bytes
        expected: usize,
        /// Actual buffer size in bytes
        actual: usize,
    },
    /// Invalid quality value (must be 1-100)
    InvalidQuality(u8),
    /// Source channel count not in {1, 3, 4}
    InvalidChannelCount(u8),
    /// Wrong number of scanlines fed to the streaming encoder
    ScanlineCountMismatch {
        /// Rows the current pass expects
        expected: u32,
        /// Rows received so far
        received: u32,
    },
    /// Huffman code length overflow (exceeds 16 bits)
    HuffmanCodeLengthOverflow,
    /// Internal encoder error
    InternalError(&'static str),
    /// I/O error from the output sink
    IoError(String),
    /// Memory allocation failed
    AllocationFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidDimensions { width, height } => {
                write!(f, "Invalid image dimensions: {}x{}", width, height)
            }
            Error::BufferSizeMismatch { expected, actual } => {
                write!(f, "Buffer size mismatch: expected {}, got {}", expected, actual)
            }
            Error::InvalidQuality(q) => {
                write!(f, "Invalid quality value: {} (must be 1-100)", q)
            }
            Error::InvalidChannelCount(n) => {
                write!(f, "Invalid source channel count: {} (must be 1, 3 or 4)", n)
            }
            Error::ScanlineCountMismatch { expected, received } => {
                write!(f, "Scanline count mismatch: expected {}, received {}", expected, received)
            }
            Error::HuffmanCodeLengthOverflow => {
                write!(f, "Huffman code length overflow (exceeds 16 bits)")
            }
            Error::InternalError(msg) => write!(f, "Internal encoder error: {}", msg),
            Error::IoError(msg) => write!(f, "I/O error: {}", msg),
            Error::AllocationFailed => write!(f, "Memory allocation failed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e.to_string())
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Error::AllocationFailed
    }
}

/// Error type for decoder operations.
///
/// The variants mirror the status vocabulary of the classic single-file
/// JPEG decoders: every malformed-stream condition gets its own code so
/// callers can tell "not a JPEG at all" from "a JPEG we refuse to handle"
/// from "a JPEG that is damaged".
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    /// No SOI marker at the start of the stream
    NotJpeg,
    /// DHT segment code counts exceed 256 symbols
    BadDhtCounts,
    /// DHT table index out of range
    BadDhtIndex,
    /// DHT segment length inconsistent with its contents
    BadDhtMarker,
    /// DQT table index or precision invalid
    BadDqtMarker,
    /// DQT segment length inconsistent with its contents
    BadDqtLength,
    /// Sample precision other than 8 bits
    BadPrecision(u8),
    /// Image height zero or above the 16384 limit
    BadHeight(u32),
    /// Image width zero or above the 16384 limit
    BadWidth(u32),
    /// More than 4 frame components or more than 4 scan components
    TooManyComponents,
    /// SOF segment length inconsistent with its component count
    BadSofLength,
    /// Variable-length segment shorter than its own length field
    BadVariableMarker,
    /// DRI segment length is not 4
    BadDriLength,
    /// SOS segment length inconsistent with its component count
    BadSosLength,
    /// SOS names a component identifier the frame does not define
    BadSosCompId,
    /// Spectral selection bounds out of range or inverted
    BadSosSpectral,
    /// Successive approximation bits out of range
    BadSosSuccessive,
    /// Arithmetic-coded frame (SOF9..SOF11, SOF13..SOF15, or DAC)
    NoArithmeticSupport,
    /// A marker that cannot appear in this position
    UnexpectedMarker(u8),
    /// A frame type this decoder does not implement
    UnsupportedMarker(u8),
    /// Sequential stream with more than one scan
    NotSingleScan,
    /// Scan references a quantization table that was never defined
    UndefinedQuantTable,
    /// Scan references a Huffman table that was never defined
    UndefinedHuffTable,
    /// Component count not in {1, 3, 4}
    UnsupportedColorspace,
    /// Sampling factor outside {1, 2} or inconsistent across components
    UnsupportedSampFactors,
    /// Expected RSTn not found, or out of sequence
    BadRestartMarker,
    /// Huffman or value decode produced an illegal symbol
    Decode,
    /// Underlying source returned an error or premature EOF
    StreamRead,
    /// A coefficient or sample buffer allocation failed
    NotEnoughMem,
    /// A previous error already stopped this decoder
    Failed,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::NotJpeg => write!(f, "Not a JPEG stream (missing SOI)"),
            DecodeError::BadDhtCounts => write!(f, "DHT code counts exceed 256 symbols"),
            DecodeError::BadDhtIndex => write!(f, "DHT table index out of range"),
            DecodeError::BadDhtMarker => write!(f, "Malformed DHT segment"),
            DecodeError::BadDqtMarker => write!(f, "DQT table index or precision invalid"),
            DecodeError::BadDqtLength => write!(f, "Malformed DQT segment"),
            DecodeError::BadPrecision(p) => {
                write!(f, "Unsupported sample precision: {} (only 8-bit)", p)
            }
            DecodeError::BadHeight(h) => write!(f, "Bad image height: {}", h),
            DecodeError::BadWidth(w) => write!(f, "Bad image width: {}", w),
            DecodeError::TooManyComponents => write!(f, "Too many components"),
            DecodeError::BadSofLength => write!(f, "Malformed SOF segment"),
            DecodeError::BadVariableMarker => write!(f, "Malformed variable-length segment"),
            DecodeError::BadDriLength => write!(f, "Malformed DRI segment"),
            DecodeError::BadSosLength => write!(f, "Malformed SOS segment"),
            DecodeError::BadSosCompId => write!(f, "SOS references an unknown component"),
            DecodeError::BadSosSpectral => write!(f, "Bad spectral selection in SOS"),
            DecodeError::BadSosSuccessive => write!(f, "Bad successive approximation in SOS"),
            DecodeError::NoArithmeticSupport => {
                write!(f, "Arithmetic entropy coding is not supported")
            }
            DecodeError::UnexpectedMarker(m) => write!(f, "Unexpected marker 0xFF{:02X}", m),
            DecodeError::UnsupportedMarker(m) => write!(f, "Unsupported marker 0xFF{:02X}", m),
            DecodeError::NotSingleScan => {
                write!(f, "Multi-scan sequential streams are not supported")
            }
            DecodeError::UndefinedQuantTable => write!(f, "Undefined quantization table"),
            DecodeError::UndefinedHuffTable => write!(f, "Undefined Huffman table"),
            DecodeError::UnsupportedColorspace => write!(f, "Unsupported color space"),
            DecodeError::UnsupportedSampFactors => write!(f, "Unsupported sampling factors"),
            DecodeError::BadRestartMarker => write!(f, "Bad or out-of-sequence restart marker"),
            DecodeError::Decode => write!(f, "Entropy decode produced an illegal symbol"),
            DecodeError::StreamRead => write!(f, "Stream read failed or ended prematurely"),
            DecodeError::NotEnoughMem => write!(f, "Memory allocation failed"),
            DecodeError::Failed => write!(f, "Decoder already failed"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<std::io::Error> for DecodeError {
    fn from(_: std::io::Error) -> Self {
        DecodeError::StreamRead
    }
}

impl From<std::collections::TryReserveError> for DecodeError {
    fn from(_: std::collections::TryReserveError) -> Self {
        DecodeError::NotEnoughMem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_nonempty() {
        let errs: [&dyn std::error::Error; 4] = [
            &Error::InvalidQuality(0),
            &Error::HuffmanCodeLengthOverflow,
            &DecodeError::NotJpeg,
            &DecodeError::BadPrecision(12),
        ];
        for e in errs {
            assert!(!e.to_string().is_empty());
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(Error::from(io), Error::IoError(_)));
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert_eq!(DecodeError::from(io), DecodeError::StreamRead);
    }
}
