use bytes::Bytes;

use crate::{
    commands::{CommandContext, CommandError, CommandResult},
    resp::RespValue,
    state::ServerState,
};

/// Handles the Redis ECHO command.
///
/// Returns the single argument unchanged as a bulk string, so binary
/// payloads are echoed byte for byte.
///
/// # Examples
///
/// ```ignore
/// // ECHO "hello world"
/// // Returns: "$11\r\nhello world\r\n"
/// ```
pub fn echo(
    _state: &mut ServerState,
    _context: &CommandContext,
    arguments: Vec<Bytes>,
) -> Result<CommandResult, CommandError> {
    let [message]: [Bytes; 1] = arguments
        .try_into()
        .map_err(|_| CommandError::WrongNumberOfArguments("echo".to_string()))?;

    Ok(CommandResult::Response(RespValue::BulkString(message)))
}
