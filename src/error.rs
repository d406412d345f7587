//! Error types for JLS operations.
//!
//! Every fallible operation in this crate returns [`Result`]. Errors carry
//! enough context (file offsets, identifiers, expected vs. actual CRC) to
//! diagnose a malformed file without a hex editor.

use std::io;
use thiserror::Error;

/// JLS-specific error types.
#[derive(Debug, Error)]
pub enum JlsError {
    /// Null argument, out-of-range identifier, or malformed payload.
    #[error("invalid parameter: {0}")]
    ParameterInvalid(&'static str),

    /// Allocation failed or a fixed working buffer was exhausted.
    #[error("not enough memory: {0}")]
    NotEnoughMemory(&'static str),

    /// Duplicate source or signal definition on the writer.
    #[error("{kind} {id} already exists")]
    AlreadyExists {
        /// "source" or "signal"
        kind: &'static str,
        /// The duplicate identifier
        id: u16,
    },

    /// Reader or writer lookup on an undefined identifier.
    #[error("{kind} {id} not found")]
    NotFound {
        /// "source" or "signal"
        kind: &'static str,
        /// The missing identifier
        id: u16,
    },

    /// Operation not implemented for this data type or signal type.
    #[error("not supported: {0}")]
    NotSupported(&'static str),

    /// Chunk payload exceeds the caller's buffer; grow and retry.
    #[error("payload too big: {needed} bytes exceeds buffer of {capacity}")]
    TooBig {
        /// Bytes required to hold the payload as stored on disk
        needed: usize,
        /// Capacity of the buffer that was offered
        capacity: usize,
    },

    /// End of file or end of a chunk chain.
    #[error("empty: end of file or chain")]
    Empty,

    /// CRC32 validation failure on a chunk header or payload.
    #[error("checksum mismatch at offset {offset}: expected 0x{expected:08x}, got 0x{actual:08x}")]
    ChecksumMismatch {
        /// File offset of the chunk whose check failed
        offset: u64,
        /// Checksum stored in the file
        expected: u32,
        /// Checksum computed from the bytes read
        actual: u32,
    },

    /// The file is not a JLS file or uses an unsupported format version.
    #[error("unsupported file: {0}")]
    UnsupportedFile(&'static str),

    /// I/O error from the operating system.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Specialized Result type for JLS operations.
pub type Result<T> = std::result::Result<T, JlsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = JlsError::AlreadyExists {
            kind: "source",
            id: 3,
        };
        assert!(err.to_string().contains("source 3"));

        let err = JlsError::ChecksumMismatch {
            offset: 0x20,
            expected: 0xDEADBEEF,
            actual: 0xBADC0FFE,
        };
        assert!(err.to_string().contains("0xdeadbeef"));
        assert!(err.to_string().contains("offset 32"));

        let err = JlsError::TooBig {
            needed: 4096,
            capacity: 1024,
        };
        assert!(err.to_string().contains("4096"));
    }
}
