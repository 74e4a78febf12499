//! A Redis-compatible in-memory server.
//!
//! The crate covers:
//!
//! - The RESP wire protocol, decoded incrementally from each connection
//! - String keys with expiry (GET, SET, INCR, KEYS, TYPE)
//! - Streams (XADD, XRANGE, XREAD with blocking)
//! - Transactions (MULTI, EXEC, DISCARD)
//! - Primary/replica replication and RDB snapshots
//!
//! All server state is owned by a single event loop task; connections talk to
//! it through channels.

pub mod blocking;
pub mod commands;
pub mod connection;
pub mod event_loop;
pub mod handshake;
pub mod input;
pub mod key_value_store;
pub mod rdb;
pub mod replication;
pub mod resp;
pub mod server;
pub mod state;
pub mod transactions;
