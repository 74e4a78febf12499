//! PSYNC command implementation for replication synchronization.
//!
//! Only full resynchronization is supported: whatever id and offset the
//! replica asks for, it receives a snapshot of the current keyspace.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    commands::{CommandContext, CommandError, CommandResult, command_utils::parse_number},
    rdb::write_snapshot,
    resp::RespValue,
    state::ServerState,
};

/// Represents the parsed arguments for the PSYNC command.
pub struct PsyncArguments {
    /// The replication id the replica knows (`?` for none)
    pub repl_id: Bytes,
    /// The replica's offset (`-1` for none)
    pub offset: i64,
}

impl PsyncArguments {
    pub fn parse(arguments: Vec<Bytes>) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::WrongNumberOfArguments("psync".to_string()));
        }

        let offset = parse_number::<i64>(&arguments[1]).ok_or(CommandError::InvalidPsyncOffset)?;

        Ok(Self {
            repl_id: arguments[0].clone(),
            offset,
        })
    }
}

/// Handles the Redis PSYNC command.
///
/// Replies `+FULLRESYNC <repl_id> <offset>\r\n` immediately followed by
/// `$<len>\r\n<snapshot>` (no trailing CRLF), then starts sending the
/// connection every propagated write.
pub fn psync(
    state: &mut ServerState,
    context: &CommandContext,
    arguments: Vec<Bytes>,
) -> Result<CommandResult, CommandError> {
    PsyncArguments::parse(arguments)?;

    let snapshot = write_snapshot(&state.store);

    let mut reply = BytesMut::new();
    RespValue::SimpleString(format!(
        "FULLRESYNC {} {}",
        state.replication.repl_id, state.replication.repl_offset
    ))
    .encode_into(&mut reply);
    reply.put_slice(format!("${}\r\n", snapshot.len()).as_bytes());
    reply.put_slice(&snapshot);

    if let Some(outbound) = state.outbound(context.client_id) {
        state.replication.mark_synced(context.client_id, outbound);
    }

    Ok(CommandResult::Sync(reply.freeze()))
}
