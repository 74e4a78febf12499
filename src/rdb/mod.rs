//! Reading and writing RDB snapshots.

mod encoding;
mod get_slice;
mod opcode;
mod rdb_file_operations;
mod rdb_parser;
mod rdb_writer;

use thiserror::Error;

pub use rdb_file_operations::load_rdb_file;
pub use rdb_parser::RdbParser;
pub use rdb_writer::write_snapshot;

/// Snapshot decoding errors. All of them abort the load.
#[derive(Error, Debug)]
pub enum RdbError {
    #[error("failed to read snapshot file: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot truncated at byte {0}")]
    UnexpectedEof(usize),
    #[error("invalid magic string")]
    InvalidMagicString,
    #[error("invalid RDB version {0:?}")]
    InvalidVersion(String),
    #[error("invalid length encoding {0:#04x}")]
    InvalidLengthEncoding(u8),
    #[error("expected a length but found an encoded integer")]
    ExpectedLength,
    #[error("LZF compressed strings are not supported")]
    UnsupportedCompressedString,
    #[error("unsupported value type {0:#04x}")]
    UnsupportedValueType(u8),
    #[error("invalid expiry timestamp {0}")]
    InvalidExpiration(i64),
}
