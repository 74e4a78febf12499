use bytes::Bytes;

use crate::{
    commands::{CommandContext, CommandError, CommandResult},
    resp::RespValue,
    state::ServerState,
};

/// Ends queueing and hands the queued commands back to the dispatcher,
/// which runs them in order. An empty queue replies with an empty array.
pub fn exec(
    state: &mut ServerState,
    context: &CommandContext,
    arguments: Vec<Bytes>,
) -> Result<CommandResult, CommandError> {
    if !arguments.is_empty() {
        return Err(CommandError::WrongNumberOfArguments("exec".to_string()));
    }

    let Ok(transaction) = state.transactions.remove_transaction(context.client_id) else {
        return Err(CommandError::ExecWithoutMulti);
    };

    if transaction.is_empty() {
        return Ok(CommandResult::Response(RespValue::Array(Vec::new())));
    }

    Ok(CommandResult::Batch(transaction))
}
