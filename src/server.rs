//! Startup: command-line configuration, snapshot loading and the accept loop.

use thiserror::Error;
use tokio::{net::TcpListener, sync::mpsc};
use tracing::{error, info};

use crate::{
    connection::spawn_connection,
    event_loop::EventLoop,
    handshake::run_replica_link,
    key_value_store::KeyValueStore,
    rdb::{RdbError, load_rdb_file},
    state::{ClientId, ServerState},
};

pub const DEFAULT_PORT: u16 = 6379;

#[derive(Error, Debug, PartialEq)]
pub enum CliError {
    #[error("Invalid command line flag: {0}")]
    InvalidCommandLineFlag(String),
    #[error("Invalid value for command line flag {0}")]
    InvalidCommandLineFlagValue(&'static str),
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to load snapshot: {0}")]
    Snapshot(#[from] RdbError),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServerConfig {
    pub port: u16,
    /// `(host, port)` of the primary when running as a replica.
    pub replica_of: Option<(String, u16)>,
    pub rdb_directory: Option<String>,
    pub rdb_filename: Option<String>,
}

#[derive(Debug)]
pub struct RedisServer {
    pub config: ServerConfig,
}

impl RedisServer {
    /// Builds the server configuration from process arguments. The first
    /// item is the program name and is skipped.
    ///
    /// Supported flags: `--port <n>`, `--replicaof "<host> <port>"`,
    /// `--dir <path>` and `--dbfilename <name>`.
    pub fn new<I: IntoIterator<Item = String>>(command_line_args: I) -> Result<Self, CliError> {
        let mut iter = command_line_args.into_iter().skip(1);
        let mut config = ServerConfig {
            port: DEFAULT_PORT,
            ..ServerConfig::default()
        };

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--port" => {
                    config.port = iter
                        .next()
                        .and_then(|port| port.parse::<u16>().ok())
                        .filter(|port| *port > 0)
                        .ok_or(CliError::InvalidCommandLineFlagValue("--port"))?;
                }
                "--replicaof" => {
                    let value = iter
                        .next()
                        .ok_or(CliError::InvalidCommandLineFlagValue("--replicaof"))?;

                    config.replica_of = Some(parse_replica_of(&value)?);
                }
                "--dir" => {
                    config.rdb_directory = Some(
                        iter.next()
                            .ok_or(CliError::InvalidCommandLineFlagValue("--dir"))?,
                    );
                }
                "--dbfilename" => {
                    config.rdb_filename = Some(
                        iter.next()
                            .ok_or(CliError::InvalidCommandLineFlagValue("--dbfilename"))?,
                    );
                }
                _ => return Err(CliError::InvalidCommandLineFlag(arg)),
            }
        }

        Ok(RedisServer { config })
    }

    pub async fn run(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.port)).await?;

        self.run_with_listener(listener).await
    }

    /// Serves clients on an already bound listener. Loads the configured
    /// snapshot first and, for a replica, starts the link to the primary.
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<(), ServerError> {
        let address = listener.local_addr()?;

        let store = load_rdb_file(
            self.config.rdb_directory.as_deref(),
            self.config.rdb_filename.as_deref(),
        )
        .await?
        .unwrap_or_else(KeyValueStore::new);

        let replica_of = self.config.replica_of.clone();
        let state = ServerState::new(self.config, store);

        let (events, receiver) = mpsc::unbounded_channel();
        tokio::spawn(EventLoop::new(state, receiver).run());

        info!(addr = %address, "listening");

        if let Some((host, port)) = replica_of {
            let link_events = events.clone();

            tokio::spawn(async move {
                if let Err(e) = run_replica_link(host, port, address.port(), link_events).await {
                    error!(error = %e, "replication link failed");
                }
            });
        }

        let mut next_client_id: ClientId = 1;

        loop {
            let (stream, client_address) = listener.accept().await?;

            spawn_connection(stream, client_address, next_client_id, events.clone());
            next_client_id += 1;
        }
    }
}

fn parse_replica_of(value: &str) -> Result<(String, u16), CliError> {
    let mut parts = value.split_whitespace();

    let (Some(host), Some(port), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(CliError::InvalidCommandLineFlagValue("--replicaof"));
    };

    let port = port
        .parse::<u16>()
        .map_err(|_| CliError::InvalidCommandLineFlagValue("--replicaof"))?;

    Ok((host.to_string(), port))
}
