#![allow(dead_code)]

use std::collections::HashMap;

use bytes::Bytes;
use resp_server::{
    key_value_store::KeyValueStore,
    resp::RespValue,
    server::ServerConfig,
    state::{ClientId, ClientKind, MASTER_LINK_ID, ServerState},
};
use tokio::sync::mpsc::{self, UnboundedReceiver};

pub const MASTER_REPL_ID: &str = "8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb";

/// A server state driven directly, without sockets. Every connected client
/// gets an outbound channel whose replies can be inspected.
pub struct TestEnv {
    pub state: ServerState,
    replies: HashMap<ClientId, UnboundedReceiver<Bytes>>,
}

impl TestEnv {
    pub fn new_master_server() -> Self {
        Self::with_config(ServerConfig {
            port: 6379,
            ..ServerConfig::default()
        })
    }

    pub fn new_replica_server() -> Self {
        Self::with_config(ServerConfig {
            port: 6380,
            replica_of: Some(("127.0.0.1".to_string(), 6379)),
            ..ServerConfig::default()
        })
    }

    pub fn with_config(config: ServerConfig) -> Self {
        TestEnv {
            state: ServerState::new(config, KeyValueStore::new()),
            replies: HashMap::new(),
        }
    }

    pub fn connect(&mut self, client_id: ClientId) {
        self.connect_as(client_id, ClientKind::Normal);
    }

    pub fn connect_master_link(&mut self) {
        self.connect_as(MASTER_LINK_ID, ClientKind::Master);
    }

    fn connect_as(&mut self, client_id: ClientId, kind: ClientKind) {
        let (outbound, replies) = mpsc::unbounded_channel();
        self.state.connect_client(client_id, kind, outbound);
        self.replies.insert(client_id, replies);
    }

    pub fn send(&mut self, client_id: ClientId, parts: &[&str]) {
        self.state.handle_frame(client_id, frame(parts));
    }

    /// Sends a command and returns the single reply it produced, if any.
    pub fn exec(&mut self, client_id: ClientId, parts: &[&str]) -> Option<RespValue> {
        self.send(client_id, parts);
        self.take_reply(client_id)
    }

    pub fn take_raw(&mut self, client_id: ClientId) -> Option<Bytes> {
        self.replies.get_mut(&client_id)?.try_recv().ok()
    }

    pub fn take_reply(&mut self, client_id: ClientId) -> Option<RespValue> {
        let raw = self.take_raw(client_id)?;
        let (value, length) = RespValue::parse(&raw).unwrap().unwrap();

        assert_eq!(length, raw.len(), "reply {:?} holds more than one value", raw);

        Some(value)
    }

    /// Drains every reply queued for a client.
    pub fn take_all(&mut self, client_id: ClientId) -> Vec<Bytes> {
        std::iter::from_fn(|| self.take_raw(client_id)).collect()
    }
}

pub fn frame(parts: &[&str]) -> Vec<Bytes> {
    parts
        .iter()
        .map(|part| Bytes::copy_from_slice(part.as_bytes()))
        .collect()
}

pub fn encoded(parts: &[&str]) -> Bytes {
    RespValue::from_frame(&frame(parts)).encode()
}

pub fn ok() -> Option<RespValue> {
    Some(RespValue::SimpleString("OK".to_string()))
}

pub fn simple(value: &str) -> Option<RespValue> {
    Some(RespValue::SimpleString(value.to_string()))
}

pub fn bulk(value: &str) -> Option<RespValue> {
    Some(RespValue::bulk(value))
}

pub fn integer(value: i64) -> Option<RespValue> {
    Some(RespValue::Integer(value))
}

pub fn error(message: &str) -> Option<RespValue> {
    Some(RespValue::Error(message.to_string()))
}

pub fn null() -> Option<RespValue> {
    Some(RespValue::NullBulkString)
}
