//! Primary/replica role and the primary's list of attached replicas.

use std::collections::HashMap;

use bytes::Bytes;
use rand::{Rng, distributions::Alphanumeric};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::{resp::RespValue, state::ClientId};

pub const REPL_ID_LENGTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedisRole {
    Master,
    Replica { host: String, port: u16 },
}

impl RedisRole {
    pub fn as_string(&self) -> &'static str {
        match self {
            RedisRole::Master => "master",
            RedisRole::Replica { .. } => "slave",
        }
    }

    pub fn is_replica(&self) -> bool {
        matches!(self, RedisRole::Replica { .. })
    }
}

/// A connection that announced itself as a replica.
#[derive(Debug)]
pub struct ReplicaHandle {
    pub outbound: UnboundedSender<Bytes>,
    pub listening_port: Option<u16>,
    pub ack_offset: u64,
    /// Set once the full resync has been sent; only synced replicas receive
    /// propagated writes.
    pub synced: bool,
}

#[derive(Debug)]
pub struct ReplicationState {
    pub role: RedisRole,
    pub repl_id: String,
    pub repl_offset: u64,
    replicas: HashMap<ClientId, ReplicaHandle>,
}

impl ReplicationState {
    pub fn new(role: RedisRole) -> Self {
        ReplicationState {
            role,
            repl_id: generate_repl_id(),
            repl_offset: 0,
            replicas: HashMap::new(),
        }
    }

    /// Records a `REPLCONF listening-port`. Re-registering only updates the
    /// port.
    pub fn register_replica(
        &mut self,
        client_id: ClientId,
        outbound: UnboundedSender<Bytes>,
        listening_port: u16,
    ) {
        self.replicas
            .entry(client_id)
            .and_modify(|replica| replica.listening_port = Some(listening_port))
            .or_insert_with(|| {
                info!(client = client_id, listening_port, "replica registered");

                ReplicaHandle {
                    outbound,
                    listening_port: Some(listening_port),
                    ack_offset: 0,
                    synced: false,
                }
            });
    }

    /// Marks `client_id` as a fan-out target after PSYNC, registering it if it
    /// skipped `REPLCONF listening-port`.
    pub fn mark_synced(&mut self, client_id: ClientId, outbound: UnboundedSender<Bytes>) {
        let replica = self
            .replicas
            .entry(client_id)
            .or_insert_with(|| ReplicaHandle {
                outbound,
                listening_port: None,
                ack_offset: 0,
                synced: false,
            });

        replica.synced = true;

        info!(client = client_id, "replica synchronised");
    }

    pub fn record_ack(&mut self, client_id: ClientId, offset: u64) {
        match self.replicas.get_mut(&client_id) {
            Some(replica) => {
                replica.ack_offset = offset;
                debug!(client = client_id, offset, "replica acknowledged offset");
            }
            None => debug!(client = client_id, "ACK from a connection that is not a replica"),
        }
    }

    pub fn remove_replica(&mut self, client_id: ClientId) {
        if self.replicas.remove(&client_id).is_some() {
            info!(client = client_id, "replica detached");
        }
    }

    pub fn replica(&self, client_id: ClientId) -> Option<&ReplicaHandle> {
        self.replicas.get(&client_id)
    }

    pub fn synced_replica_count(&self) -> usize {
        self.replicas.values().filter(|replica| replica.synced).count()
    }

    /// Sends the request-array encoding of `frame` to every synced replica
    /// and advances the replication offset by its length. Replicas whose
    /// channel is closed are dropped.
    pub fn propagate(&mut self, frame: &[Bytes]) {
        let encoded = RespValue::from_frame(frame).encode();

        self.replicas.retain(|client_id, replica| {
            if !replica.synced {
                return true;
            }

            let delivered = replica.outbound.send(encoded.clone()).is_ok();

            if !delivered {
                warn!(client = *client_id, "dropping replica after failed write");
            }

            delivered
        });

        self.repl_offset += encoded.len() as u64;
    }
}

/// Generates a 40 character alphanumeric replication id.
pub fn generate_repl_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REPL_ID_LENGTH)
        .map(char::from)
        .collect()
}
