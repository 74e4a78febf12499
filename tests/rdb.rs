use bytes::Bytes;
use resp_server::rdb::{RdbError, load_rdb_file};

/// Two keys without expiry, one expired in 2022 and one expiring in 2100.
const SNAPSHOT: &[u8] = b"REDIS0011\
    \xFA\x09redis-ver\x057.2.0\
    \xFA\x0Aredis-bits\xC0\x40\
    \xFE\x00\
    \xFB\x04\x02\
    \x00\x05mango\x09raspberry\
    \x00\x06number\xC0\x2A\
    \xFC\x00\x9C\xEF\x12\x7E\x01\x00\x00\x00\x05stale\x05bread\
    \xFD\x80\x43\x83\xF4\x00\x05fresh\x05apple\
    \xFF\x89\x3B\xB7\x4E\xF8\x0F\x77\x19";

#[tokio::test]
async fn test_load_rdb_file() {
    let directory = tempfile::tempdir().unwrap();
    std::fs::write(directory.path().join("dump.rdb"), SNAPSHOT).unwrap();

    let mut store = load_rdb_file(directory.path().to_str(), Some("dump.rdb"))
        .await
        .unwrap()
        .expect("the snapshot file exists");

    let test_cases = vec![
        ("mango", Some("raspberry")),
        ("number", Some("42")),
        ("stale", None),
        ("fresh", Some("apple")),
    ];

    for (key, expected) in test_cases {
        assert_eq!(
            store.get(key.as_bytes()).unwrap(),
            expected.map(|value| Bytes::copy_from_slice(value.as_bytes())),
            "value of {}",
            key
        );
    }

    let mut keys = store.keys();
    keys.sort();
    assert_eq!(keys, vec!["fresh", "mango", "number"]);
}

#[tokio::test]
async fn test_missing_snapshot_starts_empty() {
    let directory = tempfile::tempdir().unwrap();

    let test_cases = vec![
        (directory.path().to_str(), Some("absent.rdb")),
        (None, Some("dump.rdb")),
        (directory.path().to_str(), None),
    ];

    for (dir, filename) in test_cases {
        assert!(
            load_rdb_file(dir, filename).await.unwrap().is_none(),
            "loading {:?}/{:?}",
            dir,
            filename
        );
    }
}

#[tokio::test]
async fn test_corrupt_snapshot_is_fatal() {
    let directory = tempfile::tempdir().unwrap();

    let test_cases: Vec<(&str, Vec<u8>)> = vec![
        ("truncated.rdb", SNAPSHOT[..SNAPSHOT.len() - 20].to_vec()),
        ("wrong-magic.rdb", b"RADIS0011\xFF\0\0\0\0\0\0\0\0".to_vec()),
        (
            "list-value.rdb",
            b"REDIS0011\xFE\x00\x01\x04list\x01\x01a\xFF\0\0\0\0\0\0\0\0".to_vec(),
        ),
        (
            "compressed.rdb",
            b"REDIS0011\xFE\x00\x00\x03key\xC3\x01\x01a\xFF\0\0\0\0\0\0\0\0".to_vec(),
        ),
    ];

    for (filename, contents) in test_cases {
        std::fs::write(directory.path().join(filename), contents).unwrap();

        let result = load_rdb_file(directory.path().to_str(), Some(filename)).await;

        assert!(
            matches!(
                result,
                Err(RdbError::UnexpectedEof(_)
                    | RdbError::InvalidMagicString
                    | RdbError::UnsupportedValueType(_)
                    | RdbError::UnsupportedCompressedString)
            ),
            "loading {} gave {:?}",
            filename,
            result.map(|store| store.map(|store| store.len()))
        );
    }
}
