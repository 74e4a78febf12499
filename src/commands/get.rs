use bytes::Bytes;

use crate::{
    commands::{CommandContext, CommandError, CommandResult},
    resp::RespValue,
    state::ServerState,
};

/// Represents the parsed arguments for GET command
pub struct GetArguments {
    /// The key name to retrieve from the store
    key: Bytes,
}

impl GetArguments {
    pub fn parse(arguments: Vec<Bytes>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongNumberOfArguments("get".to_string()));
        }

        Ok(Self {
            key: arguments[0].clone(),
        })
    }
}

/// Handles the Redis GET command.
///
/// # Returns
///
/// * `Ok(CommandResult::Response)` - The stored value as a bulk string, or a
///   null bulk string when the key is missing or expired
/// * `Err(CommandError::WrongType)` - If the key holds a stream
pub fn get(
    state: &mut ServerState,
    _context: &CommandContext,
    arguments: Vec<Bytes>,
) -> Result<CommandResult, CommandError> {
    let get_arguments = GetArguments::parse(arguments)?;

    let response = match state.store.get(&get_arguments.key)? {
        Some(value) => RespValue::BulkString(value),
        None => RespValue::NullBulkString,
    };

    Ok(CommandResult::Response(response))
}
