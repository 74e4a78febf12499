mod test_utils;

use std::time::Duration;

use resp_server::resp::RespValue;
use test_utils::{TestEnv, bulk, error, null, simple};
use tokio::time::Instant;

fn entry(id: &str, fields: &[&str]) -> RespValue {
    RespValue::Array(vec![
        RespValue::bulk(id),
        RespValue::Array(fields.iter().map(RespValue::bulk).collect()),
    ])
}

fn stream_reply(key: &str, entries: Vec<RespValue>) -> RespValue {
    RespValue::Array(vec![RespValue::bulk(key), RespValue::Array(entries)])
}

#[tokio::test]
async fn test_xadd_ids() {
    let mut env = TestEnv::new_master_server();
    env.connect(1);

    let test_cases: Vec<(Vec<&str>, Option<RespValue>)> = vec![
        (
            vec!["XADD", "weather", "0-0", "temp", "1"],
            error("ERR The ID specified in XADD must be greater than 0-0"),
        ),
        (vec!["XADD", "weather", "0-*", "temp", "1"], bulk("0-1")),
        (vec!["XADD", "weather", "1-1", "temp", "2"], bulk("1-1")),
        (
            vec!["XADD", "weather", "1-1", "temp", "3"],
            error("ERR The ID specified in XADD is equal or smaller than the target stream top item"),
        ),
        (
            vec!["XADD", "weather", "0-5", "temp", "3"],
            error("ERR The ID specified in XADD is equal or smaller than the target stream top item"),
        ),
        (vec!["XADD", "weather", "1-*", "temp", "4"], bulk("1-2")),
        (vec!["XADD", "weather", "5-*", "temp", "5"], bulk("5-0")),
        (vec!["XADD", "weather", "7", "temp", "6"], bulk("7-0")),
        (
            vec!["XADD", "weather", "bad-id", "temp", "7"],
            error("ERR Invalid stream ID specified as stream command argument"),
        ),
        (
            vec!["XADD", "weather", "8-0", "temp"],
            error("ERR wrong number of arguments for 'xadd' command"),
        ),
        (vec!["TYPE", "weather"], simple("stream")),
    ];

    for (command, expected) in test_cases {
        assert_eq!(env.exec(1, &command), expected, "running {:?}", command);
    }
}

#[tokio::test]
async fn test_xadd_auto_id_is_increasing() {
    let mut env = TestEnv::new_master_server();
    env.connect(1);

    let mut previous = String::new();

    for _ in 0..5 {
        let Some(RespValue::BulkString(id)) = env.exec(1, &["XADD", "events", "*", "n", "1"]) else {
            panic!("XADD must reply with the new id");
        };

        let id = String::from_utf8(id.to_vec()).unwrap();
        let (timestamp, sequence) = id.split_once('-').unwrap();
        let current = (timestamp.parse::<u64>().unwrap(), sequence.parse::<u64>().unwrap());

        if let Some((previous_timestamp, previous_sequence)) = previous.split_once('-') {
            let previous = (
                previous_timestamp.parse::<u64>().unwrap(),
                previous_sequence.parse::<u64>().unwrap(),
            );
            assert!(current > previous, "{} must follow {:?}", id, previous);
        }

        previous = id;
    }
}

#[tokio::test]
async fn test_xadd_on_string_key() {
    let mut env = TestEnv::new_master_server();
    env.connect(1);

    env.exec(1, &["SET", "plain", "value"]);

    assert_eq!(
        env.exec(1, &["XADD", "plain", "1-1", "f", "v"]),
        error("WRONGTYPE Operation against a key holding the wrong kind of value")
    );
}

#[tokio::test]
async fn test_xrange() {
    let mut env = TestEnv::new_master_server();
    env.connect(1);

    for (id, value) in [("1-1", "a"), ("1-2", "b"), ("2-0", "c"), ("3-5", "d")] {
        env.exec(1, &["XADD", "letters", id, "letter", value]);
    }

    let test_cases: Vec<(Vec<&str>, Vec<RespValue>)> = vec![
        (
            vec!["XRANGE", "letters", "-", "+"],
            vec![
                entry("1-1", &["letter", "a"]),
                entry("1-2", &["letter", "b"]),
                entry("2-0", &["letter", "c"]),
                entry("3-5", &["letter", "d"]),
            ],
        ),
        (
            vec!["XRANGE", "letters", "1", "1"],
            vec![entry("1-1", &["letter", "a"]), entry("1-2", &["letter", "b"])],
        ),
        (
            vec!["XRANGE", "letters", "1-2", "2-0"],
            vec![entry("1-2", &["letter", "b"]), entry("2-0", &["letter", "c"])],
        ),
        (
            vec!["XRANGE", "letters", "3", "+"],
            vec![entry("3-5", &["letter", "d"])],
        ),
        (vec!["XRANGE", "letters", "4", "9"], vec![]),
        (vec!["XRANGE", "letters", "3", "1"], vec![]),
        (vec!["XRANGE", "missing", "-", "+"], vec![]),
    ];

    for (command, expected) in test_cases {
        assert_eq!(
            env.exec(1, &command),
            Some(RespValue::Array(expected)),
            "running {:?}",
            command
        );
    }
}

#[tokio::test]
async fn test_xread_without_blocking() {
    let mut env = TestEnv::new_master_server();
    env.connect(1);

    env.exec(1, &["XADD", "a", "1-0", "x", "1"]);
    env.exec(1, &["XADD", "a", "2-0", "x", "2"]);
    env.exec(1, &["XADD", "b", "5-0", "y", "1"]);

    assert_eq!(
        env.exec(1, &["XREAD", "STREAMS", "a", "1-0"]),
        Some(RespValue::Array(vec![stream_reply(
            "a",
            vec![entry("2-0", &["x", "2"])]
        )]))
    );
    assert_eq!(
        env.exec(1, &["XREAD", "streams", "a", "b", "0-0", "4"]),
        Some(RespValue::Array(vec![
            stream_reply("a", vec![entry("1-0", &["x", "1"]), entry("2-0", &["x", "2"])]),
            stream_reply("b", vec![entry("5-0", &["y", "1"])]),
        ]))
    );
    assert_eq!(env.exec(1, &["XREAD", "STREAMS", "a", "b", "2-0", "5-0"]), null());
    assert_eq!(env.exec(1, &["XREAD", "STREAMS", "a", "$"]), null());
    assert_eq!(env.exec(1, &["XREAD", "STREAMS", "missing", "0-0"]), null());
    assert_eq!(
        env.exec(1, &["XREAD", "STREAMS", "a", "b", "0-0"]),
        error("ERR Unbalanced 'xread' list of streams: for each stream key an ID or '$' must be specified.")
    );
}

#[tokio::test(start_paused = true)]
async fn test_blocking_xread_is_woken_by_xadd() {
    let mut env = TestEnv::new_master_server();
    env.connect(1);
    env.connect(2);

    env.exec(1, &["XADD", "orders", "1-0", "item", "tea"]);

    env.send(2, &["XREAD", "BLOCK", "1000", "STREAMS", "orders", "$"]);
    assert!(env.state.is_blocked(2));
    assert_eq!(env.take_reply(2), None);

    // Requests from a blocked client wait behind the pending XREAD.
    env.send(2, &["PING"]);
    assert_eq!(env.take_reply(2), None);

    tokio::time::advance(Duration::from_millis(500)).await;
    env.state.expire_blocked_readers(Instant::now());
    assert!(env.state.is_blocked(2));

    assert_eq!(env.exec(1, &["XADD", "orders", "2-0", "item", "cake"]), bulk("2-0"));

    assert_eq!(
        env.take_reply(2),
        Some(RespValue::Array(vec![stream_reply(
            "orders",
            vec![entry("2-0", &["item", "cake"])]
        )]))
    );
    assert_eq!(env.take_reply(2), simple("PONG"));
    assert!(!env.state.is_blocked(2));
}

#[tokio::test(start_paused = true)]
async fn test_blocking_xread_times_out() {
    let mut env = TestEnv::new_master_server();
    env.connect(1);

    env.send(1, &["XREAD", "BLOCK", "100", "STREAMS", "orders", "0-0"]);
    assert_eq!(env.take_reply(1), None);

    tokio::time::advance(Duration::from_millis(99)).await;
    env.state.expire_blocked_readers(Instant::now());
    assert_eq!(env.take_reply(1), None);

    tokio::time::advance(Duration::from_millis(1)).await;
    env.state.expire_blocked_readers(Instant::now());
    assert_eq!(env.take_reply(1), null());
    assert!(!env.state.is_blocked(1));
    assert_eq!(env.state.blocking.next_deadline(), None);
}

#[tokio::test(start_paused = true)]
async fn test_blocking_xread_without_timeout() {
    let mut env = TestEnv::new_master_server();
    env.connect(1);
    env.connect(2);

    env.send(2, &["XREAD", "BLOCK", "0", "STREAMS", "a", "b", "0-0", "0-0"]);
    assert_eq!(env.state.blocking.next_deadline(), None);

    tokio::time::advance(Duration::from_secs(3600)).await;
    env.state.expire_blocked_readers(Instant::now());
    assert!(env.state.is_blocked(2));

    env.exec(1, &["XADD", "b", "3-0", "k", "v"]);

    assert_eq!(
        env.take_reply(2),
        Some(RespValue::Array(vec![stream_reply(
            "b",
            vec![entry("3-0", &["k", "v"])]
        )]))
    );

    // The waiter on the other stream went away with the first reply.
    env.exec(1, &["XADD", "a", "3-0", "k", "v"]);
    assert_eq!(env.take_reply(2), None);
}

#[tokio::test(start_paused = true)]
async fn test_blocked_reader_disconnect_is_cleaned_up() {
    let mut env = TestEnv::new_master_server();
    env.connect(1);
    env.connect(2);

    env.send(2, &["XREAD", "BLOCK", "0", "STREAMS", "queue", "$"]);
    env.state.disconnect_client(2);

    assert!(!env.state.blocking.is_blocked(2));
    assert_eq!(env.exec(1, &["XADD", "queue", "1-0", "job", "1"]), bulk("1-0"));
}
