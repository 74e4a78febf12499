//! The task that owns [`ServerState`].
//!
//! Connections never touch the state directly. They send [`Event`]s over a
//! channel and the loop applies them one at a time, so commands from
//! different clients never interleave. Between events the loop also wakes up
//! for the earliest blocked XREAD deadline.

use bytes::Bytes;
use tokio::{
    sync::mpsc::{UnboundedReceiver, UnboundedSender},
    time::{Instant, sleep_until},
};
use tracing::{debug, info};

use crate::{
    resp::Frame,
    state::{ClientId, ClientKind, ServerState},
};

#[derive(Debug)]
pub enum Event {
    Connected {
        client_id: ClientId,
        kind: ClientKind,
        outbound: UnboundedSender<Bytes>,
    },
    Frame {
        client_id: ClientId,
        frame: Frame,
    },
    /// A frame from the primary. `offset` counts the bytes applied before it.
    ReplicatedFrame {
        client_id: ClientId,
        frame: Frame,
        offset: u64,
        length: u64,
    },
    Snapshot {
        master_repl_id: String,
        payload: Bytes,
    },
    Disconnected {
        client_id: ClientId,
    },
}

pub struct EventLoop {
    state: ServerState,
    events: UnboundedReceiver<Event>,
}

impl EventLoop {
    pub fn new(state: ServerState, events: UnboundedReceiver<Event>) -> Self {
        EventLoop { state, events }
    }

    /// Runs until every event sender has been dropped, then hands the state
    /// back.
    pub async fn run(mut self) -> ServerState {
        loop {
            let deadline = self.state.blocking.next_deadline();

            tokio::select! {
                event = self.events.recv() => {
                    let Some(event) = event else {
                        break;
                    };

                    self.apply(event);
                }
                _ = wait_for_deadline(deadline) => {}
            }

            self.state.expire_blocked_readers(Instant::now());
            self.state.resume_unblocked_clients();
        }

        info!("event loop stopped");
        self.state
    }

    fn apply(&mut self, event: Event) {
        match event {
            Event::Connected {
                client_id,
                kind,
                outbound,
            } => self.state.connect_client(client_id, kind, outbound),
            Event::Frame { client_id, frame } => self.state.handle_frame(client_id, frame),
            Event::ReplicatedFrame {
                client_id,
                frame,
                offset,
                length,
            } => self
                .state
                .handle_replicated_frame(client_id, frame, offset, length),
            Event::Snapshot {
                master_repl_id,
                payload,
            } => self.state.load_snapshot(master_repl_id, &payload),
            Event::Disconnected { client_id } => {
                debug!(client = client_id, "connection closed");
                self.state.disconnect_client(client_id);
            }
        }
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
