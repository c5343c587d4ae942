//! Error types for gvrs

use std::fmt;
use std::io;

/// Result type for gvrs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in gvrs operations
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(io::Error),

    /// Out-of-range row/column, negative cache size, zero-length strings
    /// where forbidden, and other caller-supplied bad arguments.
    InvalidArgument(String),

    /// Bad magic, unsupported version, malformed VLR, truncated payload,
    /// or an unknown predictor/codec code.
    FormatError(String),

    /// The data file's "opened-for-writing" timestamp was non-zero when
    /// an open was attempted.
    ConcurrentWriter,

    /// A compression back-end failed to produce a usable result. This is
    /// normally handled internally by falling back to the next codec (and,
    /// failing that, to an uncompressed payload); it only escapes when
    /// every codec including the raw fallback is exhausted.
    CompressionError(String),

    /// A CRC32C checksum recorded with a tile payload did not match the
    /// value recomputed on read.
    ChecksumMismatch { tile_index: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::FormatError(msg) => write!(f, "format error: {}", msg),
            Error::ConcurrentWriter => {
                write!(f, "file is already open for writing by another owner")
            }
            Error::CompressionError(msg) => write!(f, "compression error: {}", msg),
            Error::ChecksumMismatch { tile_index } => {
                write!(f, "checksum mismatch decoding tile {}", tile_index)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::FormatError("bad magic".to_string());
        assert_eq!(err.to_string(), "format error: bad magic");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_concurrent_writer_display() {
        let err = Error::ConcurrentWriter;
        assert!(err.to_string().contains("open for writing"));
    }

    #[test]
    fn test_checksum_mismatch_display() {
        let err = Error::ChecksumMismatch { tile_index: 7 };
        assert!(err.to_string().contains('7'));
    }
}
