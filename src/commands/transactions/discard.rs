use bytes::Bytes;

use crate::{
    commands::{CommandContext, CommandError, CommandResult, command_utils::ok_response},
    state::ServerState,
};

pub fn discard(
    state: &mut ServerState,
    context: &CommandContext,
    arguments: Vec<Bytes>,
) -> Result<CommandResult, CommandError> {
    if !arguments.is_empty() {
        return Err(CommandError::WrongNumberOfArguments("discard".to_string()));
    }

    let Ok(_) = state.transactions.remove_transaction(context.client_id) else {
        return Err(CommandError::DiscardWithoutMulti);
    };

    Ok(CommandResult::Response(ok_response()))
}
