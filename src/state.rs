//! The server state record owned by the event loop.
//!
//! Every store, queue and registry lives here and is only ever touched from
//! the event loop task, so no locking is involved. Connections interact with
//! it through [`ServerState::handle_frame`] and friends; replies leave through
//! each client's outbound channel.

use std::collections::{HashMap, VecDeque};

use bytes::Bytes;
use tokio::{sync::mpsc::UnboundedSender, time::Instant};
use tracing::{debug, info, warn};

use crate::{
    blocking::BlockingRegistry,
    commands::{CommandContext, DispatchOutcome, dispatch_frame, dispatch_from_master, stream_utils},
    key_value_store::{KeyValueStore, StreamId},
    rdb::RdbParser,
    replication::{RedisRole, ReplicationState},
    resp::{Frame, RespValue},
    server::ServerConfig,
    transactions::TransactionManager,
};

pub type ClientId = u64;

/// Client id reserved for the link to the primary.
pub const MASTER_LINK_ID: ClientId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Normal,
    /// The replica's connection to its primary. Replies are suppressed and
    /// writes are applied without role checks.
    Master,
}

#[derive(Debug)]
pub struct Client {
    pub kind: ClientKind,
    pub outbound: UnboundedSender<Bytes>,
    /// Frames that arrived while the client was blocked.
    pending: VecDeque<Frame>,
    blocked: bool,
}

#[derive(Debug)]
pub struct ServerState {
    pub config: ServerConfig,
    pub store: KeyValueStore,
    pub transactions: TransactionManager,
    pub blocking: BlockingRegistry,
    pub replication: ReplicationState,
    clients: HashMap<ClientId, Client>,
    unblocked: VecDeque<ClientId>,
}

impl ServerState {
    pub fn new(config: ServerConfig, store: KeyValueStore) -> Self {
        let role = match &config.replica_of {
            Some((host, port)) => RedisRole::Replica {
                host: host.clone(),
                port: *port,
            },
            None => RedisRole::Master,
        };

        ServerState {
            config,
            store,
            transactions: TransactionManager::new(),
            blocking: BlockingRegistry::new(),
            replication: ReplicationState::new(role),
            clients: HashMap::new(),
            unblocked: VecDeque::new(),
        }
    }

    pub fn connect_client(&mut self, client_id: ClientId, kind: ClientKind, outbound: UnboundedSender<Bytes>) {
        debug!(client = client_id, ?kind, "client registered");

        self.clients.insert(
            client_id,
            Client {
                kind,
                outbound,
                pending: VecDeque::new(),
                blocked: false,
            },
        );
    }

    /// Drops every trace of a connection: its queue, its waiters and its
    /// replica handle.
    pub fn disconnect_client(&mut self, client_id: ClientId) {
        if self.clients.remove(&client_id).is_none() {
            return;
        }

        self.transactions.remove_client(client_id);
        self.blocking.remove_client(client_id);
        self.replication.remove_replica(client_id);

        debug!(client = client_id, "client removed");
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn outbound(&self, client_id: ClientId) -> Option<UnboundedSender<Bytes>> {
        self.clients.get(&client_id).map(|client| client.outbound.clone())
    }

    pub fn is_blocked(&self, client_id: ClientId) -> bool {
        self.clients
            .get(&client_id)
            .is_some_and(|client| client.blocked)
    }

    /// Runs one request from a client, or parks it behind a blocked XREAD.
    pub fn handle_frame(&mut self, client_id: ClientId, frame: Frame) {
        let Some(client) = self.clients.get_mut(&client_id) else {
            return;
        };

        if client.blocked {
            client.pending.push_back(frame);
            return;
        }

        let kind = client.kind;
        self.execute_frame(client_id, kind, frame);
        self.resume_unblocked_clients();
    }

    /// Applies a frame received from the primary. `offset` is the number of
    /// bytes applied before this frame and `length` its encoded size.
    pub fn handle_replicated_frame(&mut self, client_id: ClientId, frame: Frame, offset: u64, length: u64) {
        self.replication.repl_offset = offset;

        if let Some(reply) = dispatch_from_master(self, client_id, frame) {
            self.send_to_client(client_id, reply);
        }

        self.replication.repl_offset = offset + length;
        self.resume_unblocked_clients();
    }

    /// Replaces the store with the snapshot received during a full resync.
    pub fn load_snapshot(&mut self, master_repl_id: String, payload: &[u8]) {
        match RdbParser::parse(payload) {
            Ok(parser) => {
                info!(keys = parser.key_value_store.len(), "loaded snapshot from primary");
                self.store = parser.key_value_store;
            }
            Err(e) => warn!(error = %e, "ignoring undecodable snapshot from primary"),
        }

        self.replication.repl_id = master_repl_id;
        self.replication.repl_offset = 0;
    }

    fn execute_frame(&mut self, client_id: ClientId, kind: ClientKind, frame: Frame) {
        let context = CommandContext::new(client_id, kind);

        match dispatch_frame(self, &context, frame) {
            DispatchOutcome::Reply(reply) => self.send_to_client(client_id, reply),
            DispatchOutcome::Suspended => {
                if let Some(client) = self.clients.get_mut(&client_id) {
                    client.blocked = true;
                }
            }
            DispatchOutcome::Silent => {}
        }
    }

    pub fn send_to_client(&mut self, client_id: ClientId, reply: Bytes) {
        let Some(client) = self.clients.get(&client_id) else {
            return;
        };

        if client.outbound.send(reply).is_err() {
            debug!(client = client_id, "outbound channel closed");
            self.disconnect_client(client_id);
        }
    }

    /// Delivers the deferred reply of a blocked client and schedules its
    /// parked frames for replay.
    fn complete_blocked(&mut self, client_id: ClientId, reply: Bytes) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.blocked = false;
            self.unblocked.push_back(client_id);
        }

        self.send_to_client(client_id, reply);
    }

    /// Answers every blocked XREAD on `stream_key` that an entry with
    /// `new_id` satisfies.
    pub fn wake_blocked_readers(&mut self, stream_key: &Bytes, new_id: StreamId) {
        let ready = self.blocking.take_ready(stream_key, new_id);

        if ready.is_empty() {
            return;
        }

        let Ok(Some(stream)) = self.store.stream(stream_key) else {
            return;
        };

        let replies: Vec<(ClientId, Bytes)> = ready
            .iter()
            .map(|reader| {
                let entries = stream.entries_after(reader.since_id);
                let reply = RespValue::Array(vec![RespValue::Array(vec![
                    RespValue::BulkString(stream_key.clone()),
                    stream_utils::entries_to_resp(entries),
                ])]);

                (reader.client_id, reply.encode())
            })
            .collect();

        for (client_id, reply) in replies {
            debug!(client = client_id, "blocked XREAD satisfied");
            self.complete_blocked(client_id, reply);
        }
    }

    /// Sends a null reply to every blocked reader whose deadline has passed.
    pub fn expire_blocked_readers(&mut self, now: Instant) {
        for client_id in self.blocking.take_expired(now) {
            debug!(client = client_id, "blocked XREAD timed out");
            self.complete_blocked(client_id, RespValue::NullBulkString.encode());
        }
    }

    /// Replays frames that arrived while clients were blocked, until each
    /// client either runs out of frames or blocks again.
    pub fn resume_unblocked_clients(&mut self) {
        while let Some(client_id) = self.unblocked.pop_front() {
            loop {
                let Some(client) = self.clients.get_mut(&client_id) else {
                    break;
                };

                if client.blocked {
                    break;
                }

                let Some(frame) = client.pending.pop_front() else {
                    break;
                };

                let kind = client.kind;
                self.execute_frame(client_id, kind, frame);
            }
        }
    }
}
