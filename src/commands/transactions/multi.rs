use bytes::Bytes;

use crate::{
    commands::{CommandContext, CommandError, CommandResult, command_utils::ok_response},
    state::ServerState,
};

/// Starts queueing for the client. A second MULTI discards what was queued
/// so far and starts over.
pub fn multi(
    state: &mut ServerState,
    context: &CommandContext,
    arguments: Vec<Bytes>,
) -> Result<CommandResult, CommandError> {
    if !arguments.is_empty() {
        return Err(CommandError::WrongNumberOfArguments("multi".to_string()));
    }

    state.transactions.start_transaction(context.client_id);

    Ok(CommandResult::Response(ok_response()))
}
