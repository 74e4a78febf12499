use bytes::Bytes;

use crate::{
    commands::{CommandContext, CommandError, CommandResult, command_utils::parse_number},
    resp::RespValue,
    state::ServerState,
};

pub struct WaitArguments {
    pub number_of_replicas: u64,
    pub timeout_ms: u64,
}

impl WaitArguments {
    pub fn parse(arguments: Vec<Bytes>) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::WrongNumberOfArguments("wait".to_string()));
        }

        let number_of_replicas =
            parse_number::<u64>(&arguments[0]).ok_or(CommandError::InvalidWaitCommandArgument)?;
        let timeout_ms =
            parse_number::<u64>(&arguments[1]).ok_or(CommandError::InvalidWaitCommandArgument)?;

        Ok(Self {
            number_of_replicas,
            timeout_ms,
        })
    }
}

/// Handles the Redis WAIT command by reporting how many replicas are
/// attached and synchronised. It never suspends the client.
pub fn wait(
    state: &mut ServerState,
    _context: &CommandContext,
    arguments: Vec<Bytes>,
) -> Result<CommandResult, CommandError> {
    WaitArguments::parse(arguments)?;

    let replicas = state.replication.synced_replica_count();

    Ok(CommandResult::Response(RespValue::Integer(replicas as i64)))
}
