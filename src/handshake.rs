//! The replica side of replication.
//!
//! A replica dials its primary, walks through the handshake and then keeps
//! the connection as a command feed. The feed is decoded by
//! [`ReplicationCursor`], which turns raw bytes into events for the event loop
//! and keeps count of how many bytes of commands have been applied.

use std::sync::LazyLock;

use bytes::Bytes;
use regex::Regex;
use thiserror::Error;
use tokio::{
    io::AsyncWriteExt,
    net::{TcpStream, tcp::OwnedWriteHalf},
    sync::mpsc::{self, UnboundedSender},
};
use tracing::{debug, info, warn};

use crate::{
    connection::write_replies,
    event_loop::Event,
    input::{CommandReadError, ReadBuffer, ReadOutcome},
    resp::{RespError, RespValue},
    state::{ClientKind, MASTER_LINK_ID},
};

static FULLRESYNC_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^FULLRESYNC (?P<repl_id>\S+) (?P<offset>\d+)$").ok()
});

static REPL_ID_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]{40}$").ok());

#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Read(#[from] CommandReadError),
    #[error("malformed data from primary: {0}")]
    Resp(#[from] RespError),
    #[error("expected {expected} from primary, received {received}")]
    UnexpectedReply {
        expected: &'static str,
        received: String,
    },
    #[error("malformed FULLRESYNC line: {0}")]
    MalformedFullResync(String),
    #[error("invalid replication id: {0}")]
    InvalidReplicationId(String),
    #[error("connection to primary closed")]
    ConnectionClosed,
}

/// Whether `repl_id` looks like a replication id: 40 alphanumeric characters.
pub fn is_valid_repl_id(repl_id: &str) -> bool {
    REPL_ID_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(repl_id))
}

/// Extracts the replication id from a `FULLRESYNC <id> <offset>` line.
/// Other status lines yield `None`.
pub fn parse_fullresync(line: &[u8]) -> Result<Option<String>, HandshakeError> {
    let line = String::from_utf8_lossy(line);

    if !line.starts_with("FULLRESYNC") {
        return Ok(None);
    }

    let captures = FULLRESYNC_PATTERN
        .as_ref()
        .and_then(|pattern| pattern.captures(&line))
        .ok_or_else(|| HandshakeError::MalformedFullResync(line.to_string()))?;

    let repl_id = &captures["repl_id"];

    if !is_valid_repl_id(repl_id) {
        return Err(HandshakeError::InvalidReplicationId(repl_id.to_string()));
    }

    Ok(Some(repl_id.to_string()))
}

/// Tracks where the replica is in the byte stream coming from its primary.
#[derive(Debug, Default)]
pub struct ReplicationCursor {
    master_repl_id: Option<String>,
    snapshot_received: bool,
    /// Bytes of propagated commands seen since the snapshot.
    applied_offset: u64,
}

impl ReplicationCursor {
    pub fn new() -> Self {
        ReplicationCursor::default()
    }

    pub fn applied_offset(&self) -> u64 {
        self.applied_offset
    }

    pub fn in_snapshot_phase(&self) -> bool {
        !self.snapshot_received
    }

    /// Consumes every complete unit in `buffer`: status lines, then the
    /// snapshot, then command frames tagged with their offsets.
    pub fn drain(&mut self, buffer: &mut ReadBuffer) -> Result<Vec<Event>, HandshakeError> {
        let mut events = Vec::new();

        while !self.snapshot_received {
            let Some(master_repl_id) = self.master_repl_id.clone() else {
                match buffer.as_bytes().first() {
                    None => return Ok(events),
                    Some(b'+') => {}
                    Some(_) => {
                        return Err(HandshakeError::UnexpectedReply {
                            expected: "FULLRESYNC",
                            received: String::from_utf8_lossy(buffer.as_bytes()).into_owned(),
                        });
                    }
                }

                let Some(line) = buffer.next_line() else {
                    return Ok(events);
                };

                self.master_repl_id = parse_fullresync(&line[1..])?;
                continue;
            };

            let Some(payload) = buffer.next_rdb_payload()? else {
                return Ok(events);
            };

            debug!(bytes = payload.len(), "received snapshot from primary");

            events.push(Event::Snapshot {
                master_repl_id,
                payload,
            });
            self.snapshot_received = true;
        }

        while let Some(decoded) = buffer.next_frame()? {
            let length = decoded.length as u64;

            events.push(Event::ReplicatedFrame {
                client_id: MASTER_LINK_ID,
                frame: decoded.frame,
                offset: self.applied_offset,
                length,
            });

            self.applied_offset += length;
        }

        Ok(events)
    }
}

async fn send_command(writer: &mut OwnedWriteHalf, parts: &[&str]) -> Result<(), HandshakeError> {
    let frame: Vec<Bytes> = parts
        .iter()
        .map(|part| Bytes::copy_from_slice(part.as_bytes()))
        .collect();

    writer.write_all(&RespValue::from_frame(&frame).encode()).await?;

    Ok(())
}

fn expect_simple_string(value: RespValue, expected: &'static str) -> Result<(), HandshakeError> {
    match value {
        RespValue::SimpleString(received) if received.eq_ignore_ascii_case(expected) => Ok(()),
        other => Err(HandshakeError::UnexpectedReply {
            expected,
            received: format!("{:?}", other),
        }),
    }
}

/// Connects to the primary, performs the handshake and feeds everything it
/// sends to the event loop. Returns when the link closes; there is no retry.
pub async fn run_replica_link(
    host: String,
    port: u16,
    listening_port: u16,
    events: UnboundedSender<Event>,
) -> Result<(), HandshakeError> {
    let stream = TcpStream::connect((host.as_str(), port)).await?;
    let (reader, mut writer) = stream.into_split();
    let mut buffer = ReadBuffer::new();

    info!(host = %host, port, "connected to primary");

    send_command(&mut writer, &["PING"]).await?;
    expect_simple_string(buffer.read_value(&reader).await?, "PONG")?;

    let listening_port = listening_port.to_string();
    send_command(&mut writer, &["REPLCONF", "listening-port", &listening_port]).await?;
    expect_simple_string(buffer.read_value(&reader).await?, "OK")?;

    send_command(&mut writer, &["REPLCONF", "capa", "psync2"]).await?;
    expect_simple_string(buffer.read_value(&reader).await?, "OK")?;

    send_command(&mut writer, &["PSYNC", "?", "-1"]).await?;
    debug!("handshake complete, waiting for snapshot");

    let (outbound, replies) = mpsc::unbounded_channel();

    if events
        .send(Event::Connected {
            client_id: MASTER_LINK_ID,
            kind: ClientKind::Master,
            outbound,
        })
        .is_err()
    {
        return Ok(());
    }

    tokio::spawn(write_replies(MASTER_LINK_ID, writer, replies));

    let mut cursor = ReplicationCursor::new();

    let result = loop {
        match cursor.drain(&mut buffer) {
            Ok(drained) => {
                if drained.into_iter().any(|event| events.send(event).is_err()) {
                    break Ok(());
                }
            }
            Err(e) => break Err(e),
        }

        match buffer.read_from(&reader).await {
            Ok(ReadOutcome::Data(_) | ReadOutcome::WouldBlock) => {}
            Ok(ReadOutcome::Closed) => break Err(HandshakeError::ConnectionClosed),
            Err(e) => break Err(e.into()),
        }
    };

    if let Err(e) = &result {
        warn!(error = %e, offset = cursor.applied_offset(), "replication link closed");
    }

    let _ = events.send(Event::Disconnected {
        client_id: MASTER_LINK_ID,
    });

    result
}
