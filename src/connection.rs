//! Per-connection I/O tasks.
//!
//! A connection is split in two. The reader task fills a [`ReadBuffer`],
//! cuts it into frames and forwards them to the event loop in arrival order.
//! The writer task drains the connection's outbound channel onto the socket.
//! Neither task looks at what the bytes mean.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::{
    io::AsyncWriteExt,
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
};
use tracing::{debug, info, warn};

use crate::{
    event_loop::Event,
    input::{ReadBuffer, ReadOutcome},
    resp::RespValue,
    state::{ClientId, ClientKind},
};

/// Registers a new client with the event loop and starts its reader and
/// writer tasks.
pub fn spawn_connection(
    stream: TcpStream,
    address: SocketAddr,
    client_id: ClientId,
    events: UnboundedSender<Event>,
) {
    let (reader, writer) = stream.into_split();
    let (outbound, replies) = mpsc::unbounded_channel();

    info!(client = client_id, addr = %address, "accepted connection");

    if events
        .send(Event::Connected {
            client_id,
            kind: ClientKind::Normal,
            outbound: outbound.clone(),
        })
        .is_err()
    {
        return;
    }

    tokio::spawn(write_replies(client_id, writer, replies));
    tokio::spawn(read_frames(client_id, reader, outbound, events));
}

async fn read_frames(
    client_id: ClientId,
    reader: OwnedReadHalf,
    outbound: UnboundedSender<Bytes>,
    events: UnboundedSender<Event>,
) {
    let mut buffer = ReadBuffer::new();

    'connection: loop {
        match buffer.read_from(&reader).await {
            Ok(ReadOutcome::Data(_)) => {}
            Ok(ReadOutcome::WouldBlock) => continue,
            Ok(ReadOutcome::Closed) => break,
            Err(e) => {
                debug!(client = client_id, error = %e, "read failed");
                break;
            }
        }

        loop {
            match buffer.next_frame() {
                Ok(Some(decoded)) => {
                    let event = Event::Frame {
                        client_id,
                        frame: decoded.frame,
                    };

                    if events.send(event).is_err() {
                        break 'connection;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(client = client_id, error = %e, "malformed frame, closing connection");

                    let reply = RespValue::Error(format!("ERR Protocol error: {}", e));
                    let _ = outbound.send(reply.encode());

                    break 'connection;
                }
            }
        }
    }

    let _ = events.send(Event::Disconnected { client_id });
}

/// Writes every reply queued for the client until the event loop drops the
/// sending side.
pub async fn write_replies(
    client_id: ClientId,
    mut writer: OwnedWriteHalf,
    mut replies: UnboundedReceiver<Bytes>,
) {
    while let Some(reply) = replies.recv().await {
        if let Err(e) = writer.write_all(&reply).await {
            debug!(client = client_id, error = %e, "write failed");
            break;
        }
    }

    let _ = writer.shutdown().await;
}
