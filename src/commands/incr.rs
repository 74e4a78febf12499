use bytes::Bytes;

use crate::{
    commands::{CommandContext, CommandError, CommandResult},
    resp::RespValue,
    state::ServerState,
};

pub struct IncrArguments {
    key: Bytes,
}

impl IncrArguments {
    pub fn parse(arguments: Vec<Bytes>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongNumberOfArguments("incr".to_string()));
        }

        Ok(Self {
            key: arguments[0].clone(),
        })
    }
}

/// Handles the Redis INCR command.
///
/// A missing key starts from 0. Values that are not integer-shaped are left
/// untouched and reported as an error.
pub fn incr(
    state: &mut ServerState,
    _context: &CommandContext,
    arguments: Vec<Bytes>,
) -> Result<CommandResult, CommandError> {
    let incr_arguments = IncrArguments::parse(arguments)?;
    let value = state.store.incr(&incr_arguments.key)?;

    Ok(CommandResult::Response(RespValue::Integer(value)))
}
