use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    key_value_store::{DataType, KeyValueStore},
    rdb::{
        encoding::{write_int8, write_length, write_string},
        opcode::{
            DATABASE_OPCODE, END_OF_FILE_OPCODE, EXPIRATION_MILLISECONDS_OPCODE, MAGIC_STRING,
            METADATA_OPCODE, RESIZE_DB_OPCODE, STRING_VALUE_TYPE,
        },
    },
};

const RDB_VERSION: &[u8; 4] = b"0011";
const REDIS_VERSION: &[u8] = b"7.2.0";

/// Serializes the live string keys of `store` into an RDB snapshot.
///
/// Streams have no representation here and are left out. The checksum is
/// written as zeros, which readers treat as "not computed".
pub fn write_snapshot(store: &KeyValueStore) -> Bytes {
    let entries: Vec<_> = store
        .live_entries()
        .filter_map(|(key, value, expiration)| match value {
            DataType::String(value) => Some((key, value, expiration)),
            DataType::Stream(_) => None,
        })
        .collect();

    let expiring = entries
        .iter()
        .filter(|(_, _, expiration)| expiration.is_some())
        .count();

    let mut buffer = BytesMut::new();

    buffer.put_slice(MAGIC_STRING);
    buffer.put_slice(RDB_VERSION);

    buffer.put_u8(METADATA_OPCODE);
    write_string(&mut buffer, b"redis-ver");
    write_string(&mut buffer, REDIS_VERSION);

    buffer.put_u8(METADATA_OPCODE);
    write_string(&mut buffer, b"redis-bits");
    write_int8(&mut buffer, 64);

    buffer.put_u8(DATABASE_OPCODE);
    write_length(&mut buffer, 0);

    buffer.put_u8(RESIZE_DB_OPCODE);
    write_length(&mut buffer, entries.len());
    write_length(&mut buffer, expiring);

    for (key, value, expiration) in entries {
        if let Some(deadline) = expiration {
            buffer.put_u8(EXPIRATION_MILLISECONDS_OPCODE);
            buffer.put_u64_le(deadline.as_millisecond().max(0) as u64);
        }

        buffer.put_u8(STRING_VALUE_TYPE);
        write_string(&mut buffer, key);
        write_string(&mut buffer, value);
    }

    buffer.put_u8(END_OF_FILE_OPCODE);
    buffer.put_u64(0);

    buffer.freeze()
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use jiff::{SignedDuration, Timestamp};

    use crate::{
        key_value_store::{DataType, KeyValueStore, StreamIdRequest},
        rdb::RdbParser,
    };

    use super::write_snapshot;

    #[test]
    fn test_empty_snapshot_layout() {
        let snapshot = write_snapshot(&KeyValueStore::new());

        let expected: &[u8] = b"REDIS0011\
            \xFA\x09redis-ver\x057.2.0\
            \xFA\x0Aredis-bits\xC0\x40\
            \xFE\x00\
            \xFB\x00\x00\
            \xFF\x00\x00\x00\x00\x00\x00\x00\x00";

        assert_eq!(&snapshot[..], expected);
    }

    #[test]
    fn test_snapshot_is_loadable() {
        let mut store = KeyValueStore::new();
        store
            .set(Bytes::from_static(b"plain"), Bytes::from_static(b"1"), None)
            .unwrap();
        store
            .set(
                Bytes::from_static(b"expiring"),
                Bytes::from_static(b"2"),
                Some(SignedDuration::from_secs(3600)),
            )
            .unwrap();
        store.insert(
            Bytes::from_static(b"gone"),
            DataType::String(Bytes::from_static(b"3")),
            Some(Timestamp::UNIX_EPOCH),
        );
        store
            .xadd(
                Bytes::from_static(b"events"),
                StreamIdRequest::Auto,
                vec![(Bytes::from_static(b"f"), Bytes::from_static(b"v"))],
                1,
            )
            .unwrap();

        let parser = RdbParser::parse(&write_snapshot(&store)).unwrap();
        let mut loaded = parser.key_value_store;

        assert_eq!(parser.hash_table_size, Some(2));
        assert_eq!(parser.expiry_hash_table_size, Some(1));
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(b"plain").unwrap(), Some(Bytes::from_static(b"1")));
        assert_eq!(loaded.get(b"expiring").unwrap(), Some(Bytes::from_static(b"2")));
        assert_eq!(
            loaded.expiration(b"expiring").map(|deadline| deadline.as_millisecond()),
            store.expiration(b"expiring").map(|deadline| deadline.as_millisecond())
        );
        assert_eq!(loaded.type_of(b"events"), "none");
    }
}
