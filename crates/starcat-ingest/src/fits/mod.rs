// FITS catalog file support
//
// Catalog files are FITS containers: a primary HDU followed by extensions, each
// a header of 80-character cards padded to 2880-byte blocks plus an optional
// data section. Only what ingestion needs is implemented:
// - Header: card parsing and keyword lookup
// - Table: BINTABLE column descriptors (TTYPEn/TFORMn) and big-endian row decoding
// - File: HDU enumeration, truncation detection, row materialization
// - Writer: single-table files for fixtures and tooling

pub mod file;
pub mod header;
pub mod table;
pub mod writer;

pub use file::{FitsFile, Hdu, HduKind};
pub use header::{Card, Header};
pub use table::{BinaryTable, Column, TForm};
pub use writer::BinTableWriter;

/// Size of one header card in bytes
pub const CARD_LEN: usize = 80;

/// Size of one FITS logical record; headers and data are padded to a multiple of it
pub const BLOCK_LEN: usize = 2880;

/// Result type for FITS operations
pub type Result<T> = std::result::Result<T, FitsError>;

/// Error types for reading and writing FITS files
#[derive(Debug, thiserror::Error)]
pub enum FitsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid header in HDU {hdu}: {reason}")]
    InvalidHeader { hdu: usize, reason: String },

    #[error("Missing required keyword {keyword} in HDU {hdu}")]
    MissingKeyword { keyword: String, hdu: usize },

    #[error("Unsupported column format '{0}'")]
    UnsupportedFormat(String),

    #[error("File truncated: expected {expected} bytes, found {actual}")]
    Truncated { expected: u64, actual: u64 },

    #[error("No binary table at HDU {index} (found {found})")]
    MissingTable { index: usize, found: String },

    #[error("Cannot encode column '{column}': {reason}")]
    Encode { column: String, reason: String },
}

/// Round `len` up to the next multiple of [`BLOCK_LEN`], `None` on overflow
pub(crate) fn padded_len(len: u64) -> Option<u64> {
    let block = BLOCK_LEN as u64;
    len.div_ceil(block).checked_mul(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_len() {
        assert_eq!(padded_len(0), Some(0));
        assert_eq!(padded_len(1), Some(2880));
        assert_eq!(padded_len(2880), Some(2880));
        assert_eq!(padded_len(2881), Some(5760));
        assert_eq!(padded_len(u64::MAX), None);
    }
}
