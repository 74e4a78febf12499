use bytes::Bytes;
use jiff::Timestamp;

use crate::rdb::{
    RdbError,
    encoding::{parse_length, parse_string},
    get_slice::{get_array, get_buffer_slice},
};

pub const MAGIC_STRING: &[u8; 5] = b"REDIS";
pub const METADATA_OPCODE: u8 = 0xFA;
pub const RESIZE_DB_OPCODE: u8 = 0xFB;
pub const EXPIRATION_MILLISECONDS_OPCODE: u8 = 0xFC;
pub const EXPIRATION_SECONDS_OPCODE: u8 = 0xFD;
pub const DATABASE_OPCODE: u8 = 0xFE;
pub const END_OF_FILE_OPCODE: u8 = 0xFF;
pub const STRING_VALUE_TYPE: u8 = 0x00;

#[derive(Debug, PartialEq)]
pub enum OpCodeResponse {
    Metadata {
        key: Bytes,
        value: Bytes,
    },
    ResizeDb {
        db_hash_table_size: usize,
        expiry_hash_table_size: usize,
    },
    Database {
        database_number: usize,
    },
    KeyValue {
        key: Bytes,
        value: Bytes,
        expiration: Option<Timestamp>,
    },
    EndOfFile {
        checksum: [u8; 8],
    },
}

/// Checks the `REDIS` magic and the four-digit version that follows it.
pub fn parse_magic_string(bytes: &[u8]) -> Result<(u32, usize), RdbError> {
    let magic = get_buffer_slice(bytes, 0, MAGIC_STRING.len())?;

    if magic != MAGIC_STRING {
        return Err(RdbError::InvalidMagicString);
    }

    let version_bytes = get_buffer_slice(bytes, MAGIC_STRING.len(), 4)?;
    let version_text = String::from_utf8_lossy(version_bytes);

    let version = version_text
        .parse::<u32>()
        .ok()
        .filter(|version| (1..=12).contains(version))
        .ok_or_else(|| RdbError::InvalidVersion(version_text.to_string()))?;

    Ok((version, MAGIC_STRING.len() + 4))
}

/// Parses the section starting at `cursor` and returns it along with the
/// number of bytes it spans.
pub fn parse_opcode(bytes: &[u8], cursor: usize) -> Result<(OpCodeResponse, usize), RdbError> {
    let opcode = get_buffer_slice(bytes, cursor, 1)?[0];
    let mut position = cursor + 1;

    let response = match opcode {
        METADATA_OPCODE => {
            let (key, key_length) = parse_string(bytes, position)?;
            position += key_length;
            let (value, value_length) = parse_string(bytes, position)?;
            position += value_length;

            OpCodeResponse::Metadata { key, value }
        }
        RESIZE_DB_OPCODE => {
            let (db_hash_table_size, first) = parse_length(bytes, position)?;
            position += first;
            let (expiry_hash_table_size, second) = parse_length(bytes, position)?;
            position += second;

            OpCodeResponse::ResizeDb {
                db_hash_table_size,
                expiry_hash_table_size,
            }
        }
        DATABASE_OPCODE => {
            let (database_number, length) = parse_length(bytes, position)?;
            position += length;

            OpCodeResponse::Database { database_number }
        }
        EXPIRATION_SECONDS_OPCODE => {
            let seconds = u32::from_le_bytes(get_array::<4>(bytes, position)?);
            position += 4;

            let expiration = Timestamp::from_second(i64::from(seconds))
                .map_err(|_| RdbError::InvalidExpiration(i64::from(seconds)))?;

            let (key, value, length) = parse_key_value(bytes, position)?;
            position += length;

            OpCodeResponse::KeyValue {
                key,
                value,
                expiration: Some(expiration),
            }
        }
        EXPIRATION_MILLISECONDS_OPCODE => {
            let millis = u64::from_le_bytes(get_array::<8>(bytes, position)?);
            position += 8;

            let millis = i64::try_from(millis).map_err(|_| RdbError::InvalidExpiration(i64::MAX))?;
            let expiration = Timestamp::from_millisecond(millis)
                .map_err(|_| RdbError::InvalidExpiration(millis))?;

            let (key, value, length) = parse_key_value(bytes, position)?;
            position += length;

            OpCodeResponse::KeyValue {
                key,
                value,
                expiration: Some(expiration),
            }
        }
        END_OF_FILE_OPCODE => {
            let checksum = get_array::<8>(bytes, position)?;
            position += 8;

            OpCodeResponse::EndOfFile { checksum }
        }
        _ => {
            // Any other byte is the value type of a key without expiry
            let (key, value, length) = parse_key_value(bytes, cursor)?;
            position = cursor + length;

            OpCodeResponse::KeyValue {
                key,
                value,
                expiration: None,
            }
        }
    };

    Ok((response, position - cursor))
}

/// Reads `<value type> <key> <value>`. Only plain strings are supported.
fn parse_key_value(bytes: &[u8], cursor: usize) -> Result<(Bytes, Bytes, usize), RdbError> {
    let value_type = get_buffer_slice(bytes, cursor, 1)?[0];

    if value_type != STRING_VALUE_TYPE {
        return Err(RdbError::UnsupportedValueType(value_type));
    }

    let (key, key_length) = parse_string(bytes, cursor + 1)?;
    let (value, value_length) = parse_string(bytes, cursor + 1 + key_length)?;

    Ok((key, value, 1 + key_length + value_length))
}
