use bytes::Bytes;

use crate::{
    commands::command_error::CommandError,
    resp::{Frame, RespValue},
    state::{ClientId, ClientKind},
};

/// What a command handler hands back to the dispatcher.
#[derive(Debug)]
pub enum CommandResult {
    Response(RespValue),
    /// Nothing is written back (e.g. `REPLCONF ACK`).
    NoResponse,
    /// The reply is deferred until a blocked XREAD completes.
    Blocked,
    /// A full resync: the status line immediately followed by the snapshot
    /// transfer, written as raw bytes.
    Sync(Bytes),
    /// Commands queued by MULTI, to be run by EXEC.
    Batch(Vec<CommandHandler>),
}

/// Who issued the command being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandContext {
    pub client_id: ClientId,
    pub client_kind: ClientKind,
    /// Set while EXEC runs queued commands; blocking reads return at once.
    pub in_transaction: bool,
}

impl CommandContext {
    pub fn new(client_id: ClientId, client_kind: ClientKind) -> Self {
        CommandContext {
            client_id,
            client_kind,
            in_transaction: false,
        }
    }

    pub fn for_transaction(&self) -> Self {
        CommandContext {
            in_transaction: true,
            ..*self
        }
    }
}

/// A request split into its normalised name and arguments.
#[derive(Debug, PartialEq, Clone)]
pub struct CommandHandler {
    /// Uppercased verb. `CONFIG GET` is merged into one name.
    pub name: String,
    pub arguments: Vec<Bytes>,
    /// The frame as received, re-encoded for propagation.
    pub input: Frame,
}

impl CommandHandler {
    pub fn new(input: Frame) -> Result<Self, CommandError> {
        let Some(first) = input.first() else {
            return Err(CommandError::EmptyCommand);
        };

        let name = String::from_utf8_lossy(first).to_uppercase();

        let (name, arguments) = match (name.as_str(), input.get(1)) {
            ("CONFIG", Some(sub_command)) if sub_command.eq_ignore_ascii_case(b"GET") => {
                ("CONFIG GET".to_string(), input[2..].to_vec())
            }
            _ => (name, input[1..].to_vec()),
        };

        Ok(Self {
            name,
            arguments,
            input,
        })
    }

    /// The reply-side encoding of the original request.
    pub fn encoded_input(&self) -> Bytes {
        RespValue::from_frame(&self.input).encode()
    }
}
