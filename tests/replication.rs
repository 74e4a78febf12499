mod test_utils;

use resp_server::{
    handshake::is_valid_repl_id,
    rdb::{RdbParser, write_snapshot},
    resp::RespValue,
    state::MASTER_LINK_ID,
};
use test_utils::{MASTER_REPL_ID, TestEnv, bulk, encoded, error, frame, integer, null, ok, simple};

/// Runs the replica side of the handshake for `client_id` and returns the
/// raw PSYNC reply.
fn attach_replica(env: &mut TestEnv, client_id: u64) -> bytes::Bytes {
    assert_eq!(
        env.exec(client_id, &["REPLCONF", "listening-port", "6380"]),
        ok()
    );
    assert_eq!(env.exec(client_id, &["REPLCONF", "capa", "psync2"]), ok());

    env.send(client_id, &["PSYNC", "?", "-1"]);
    env.take_raw(client_id).unwrap()
}

#[tokio::test]
async fn test_psync_sends_fullresync_and_snapshot() {
    let mut env = TestEnv::new_master_server();
    env.connect(1);
    env.connect(2);

    env.exec(1, &["SET", "existing", "value"]);

    let reply = attach_replica(&mut env, 2);
    let header_end = reply.windows(2).position(|window| window == b"\r\n").unwrap();
    let header = std::str::from_utf8(&reply[..header_end]).unwrap();

    let parts: Vec<&str> = header.split(' ').collect();
    assert_eq!(parts[0], "+FULLRESYNC");
    assert!(is_valid_repl_id(parts[1]), "replication id {:?}", parts[1]);
    assert_eq!(
        parts[2],
        encoded(&["SET", "existing", "value"]).len().to_string(),
        "offset counts the write issued before the sync"
    );

    let rest = &reply[header_end + 2..];
    let length_end = rest.windows(2).position(|window| window == b"\r\n").unwrap();
    let length: usize = std::str::from_utf8(&rest[1..length_end]).unwrap().parse().unwrap();
    let snapshot = &rest[length_end + 2..];

    assert_eq!(snapshot.len(), length, "snapshot has no trailing CRLF");

    let mut parser = RdbParser::parse(snapshot).unwrap();
    assert_eq!(
        parser.key_value_store.get(b"existing").unwrap(),
        Some(bytes::Bytes::from_static(b"value"))
    );
}

#[tokio::test]
async fn test_writes_are_propagated_to_synced_replicas() {
    let mut env = TestEnv::new_master_server();
    env.connect(1);
    env.connect(2);
    env.connect(3);

    assert_eq!(
        env.exec(3, &["REPLCONF", "listening-port", "6381"]),
        ok()
    );

    attach_replica(&mut env, 2);

    assert_eq!(env.exec(1, &["SET", "foo", "bar"]), ok());
    assert_eq!(env.exec(1, &["GET", "foo"]), bulk("bar"));
    assert_eq!(env.exec(1, &["SET", "word", "x"]), ok());
    assert_eq!(
        env.exec(1, &["INCR", "word"]),
        error("ERR value is not an integer or out of range")
    );

    assert_eq!(
        env.take_all(2),
        vec![encoded(&["SET", "foo", "bar"]), encoded(&["SET", "word", "x"])],
        "only successful writes reach the replica"
    );
    assert!(env.take_all(3).is_empty(), "unsynced replicas get nothing");

    let propagated = (encoded(&["SET", "foo", "bar"]).len() + encoded(&["SET", "word", "x"]).len()) as u64;
    assert_eq!(env.state.replication.repl_offset, propagated);
}

#[tokio::test]
async fn test_exec_propagates_each_write() {
    let mut env = TestEnv::new_master_server();
    env.connect(1);
    env.connect(2);
    attach_replica(&mut env, 2);

    env.exec(1, &["MULTI"]);
    env.exec(1, &["SET", "a", "1"]);
    env.exec(1, &["GET", "a"]);
    env.exec(1, &["INCR", "a"]);
    env.exec(1, &["EXEC"]);

    assert_eq!(
        env.take_all(2),
        vec![encoded(&["SET", "a", "1"]), encoded(&["INCR", "a"])]
    );
}

#[tokio::test]
async fn test_wait_and_acks() {
    let mut env = TestEnv::new_master_server();
    env.connect(1);
    env.connect(2);
    env.connect(3);

    assert_eq!(env.exec(1, &["WAIT", "1", "500"]), integer(0));

    attach_replica(&mut env, 2);
    attach_replica(&mut env, 3);

    assert_eq!(env.exec(1, &["WAIT", "5", "500"]), integer(2));
    assert_eq!(
        env.exec(1, &["WAIT", "one", "500"]),
        error("ERR invalid WAIT command argument")
    );

    assert_eq!(env.exec(2, &["REPLCONF", "ACK", "31"]), None);
    assert_eq!(
        env.state.replication.replica(2).map(|replica| replica.ack_offset),
        Some(31)
    );

    env.state.disconnect_client(3);
    assert_eq!(env.exec(1, &["WAIT", "1", "0"]), integer(1));
}

#[tokio::test]
async fn test_replica_applies_frames_from_primary() {
    let mut env = TestEnv::new_replica_server();
    env.connect_master_link();
    env.connect(1);

    let set = frame(&["SET", "foo", "123"]);
    let set_length = encoded(&["SET", "foo", "123"]).len() as u64;

    env.state.handle_replicated_frame(MASTER_LINK_ID, set, 0, set_length);
    env.state
        .handle_replicated_frame(MASTER_LINK_ID, frame(&["PING"]), set_length, 14);

    assert_eq!(env.take_raw(MASTER_LINK_ID), None, "replies to the primary are suppressed");

    env.state.handle_replicated_frame(
        MASTER_LINK_ID,
        frame(&["REPLCONF", "GETACK", "*"]),
        set_length + 14,
        37,
    );

    let expected_offset = (set_length + 14).to_string();
    assert_eq!(
        env.take_reply(MASTER_LINK_ID),
        Some(RespValue::Array(vec![
            RespValue::bulk("REPLCONF"),
            RespValue::bulk("ACK"),
            RespValue::bulk(&expected_offset),
        ]))
    );
    assert_eq!(env.state.replication.repl_offset, set_length + 14 + 37);

    assert_eq!(env.exec(1, &["GET", "foo"]), bulk("123"));
    assert_eq!(
        env.exec(1, &["SET", "foo", "456"]),
        error("READONLY You can't write against a read only replica.")
    );
    assert_eq!(
        env.exec(1, &["INCR", "foo"]),
        error("READONLY You can't write against a read only replica.")
    );
    assert_eq!(env.exec(1, &["PING"]), simple("PONG"));
}

#[tokio::test]
async fn test_replica_loads_snapshot_from_primary() {
    let mut primary = TestEnv::new_master_server();
    primary.connect(1);
    primary.exec(1, &["SET", "copied", "yes"]);

    let snapshot = write_snapshot(&primary.state.store);

    let mut env = TestEnv::new_replica_server();
    env.connect(1);
    env.state.handle_frame(1, frame(&["GET", "copied"]));
    assert_eq!(env.take_reply(1), null());

    env.state.load_snapshot(MASTER_REPL_ID.to_string(), &snapshot);

    assert_eq!(env.state.replication.repl_id, MASTER_REPL_ID);
    assert_eq!(env.state.replication.repl_offset, 0);
    assert_eq!(env.exec(1, &["GET", "copied"]), bulk("yes"));

    env.state
        .load_snapshot(MASTER_REPL_ID.to_string(), b"not a snapshot");
    assert_eq!(
        env.exec(1, &["GET", "copied"]),
        bulk("yes"),
        "an undecodable snapshot leaves the store alone"
    );
}
