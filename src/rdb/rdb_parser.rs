use std::collections::HashMap;

use bytes::Bytes;
use tracing::debug;

use crate::{
    key_value_store::{DataType, KeyValueStore},
    rdb::{
        RdbError,
        opcode::{OpCodeResponse, parse_magic_string, parse_opcode},
    },
};

/// A fully decoded snapshot.
#[derive(Debug)]
pub struct RdbParser {
    pub version: u32,
    pub metadata: HashMap<Bytes, Bytes>,
    pub db_number: Option<usize>,
    pub hash_table_size: Option<usize>,
    pub expiry_hash_table_size: Option<usize>,
    /// Every key in the snapshot, expired ones included. Expired keys are
    /// simply never visible afterwards.
    pub key_value_store: KeyValueStore,
    pub checksum: [u8; 8],
}

impl RdbParser {
    /// Decodes a complete snapshot held in memory.
    ///
    /// # Returns
    ///
    /// * `Ok(RdbParser)` - The snapshot up to and including its end-of-file marker
    /// * `Err(RdbError::UnexpectedEof)` - If the buffer ends before the end-of-file marker
    /// * `Err(RdbError::...)` - For any other malformed section
    pub fn parse(buffer: &[u8]) -> Result<RdbParser, RdbError> {
        let (version, mut cursor) = parse_magic_string(buffer)?;

        let mut parser = RdbParser {
            version,
            metadata: HashMap::new(),
            db_number: None,
            hash_table_size: None,
            expiry_hash_table_size: None,
            key_value_store: KeyValueStore::new(),
            checksum: [0; 8],
        };

        loop {
            let (section, bytes_read) = parse_opcode(buffer, cursor)?;
            cursor += bytes_read;

            match section {
                OpCodeResponse::Metadata { key, value } => {
                    parser.metadata.insert(key, value);
                }
                OpCodeResponse::ResizeDb {
                    db_hash_table_size,
                    expiry_hash_table_size,
                } => {
                    parser.hash_table_size = Some(db_hash_table_size);
                    parser.expiry_hash_table_size = Some(expiry_hash_table_size);
                }
                OpCodeResponse::Database { database_number } => {
                    parser.db_number = Some(database_number);
                }
                OpCodeResponse::KeyValue {
                    key,
                    value,
                    expiration,
                } => {
                    parser
                        .key_value_store
                        .insert(key, DataType::String(value), expiration);
                }
                OpCodeResponse::EndOfFile { checksum } => {
                    parser.checksum = checksum;
                    break;
                }
            }
        }

        if cursor < buffer.len() {
            debug!(trailing = buffer.len() - cursor, "ignoring bytes after end of snapshot");
        }

        Ok(parser)
    }
}
