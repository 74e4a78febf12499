use bytes::Bytes;
use globset::Glob;

use crate::{
    commands::{CommandContext, CommandError, CommandResult},
    resp::RespValue,
    state::ServerState,
};

pub struct KeysArguments {
    pub pattern: String,
}

impl KeysArguments {
    pub fn parse(arguments: Vec<Bytes>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongNumberOfArguments("keys".to_string()));
        }

        Ok(KeysArguments {
            pattern: String::from_utf8_lossy(&arguments[0]).into_owned(),
        })
    }
}

/// Handles the Redis KEYS command. Expired keys are never listed.
pub fn keys(
    state: &mut ServerState,
    _context: &CommandContext,
    arguments: Vec<Bytes>,
) -> Result<CommandResult, CommandError> {
    let keys_arguments = KeysArguments::parse(arguments)?;

    let glob = Glob::new(&keys_arguments.pattern)
        .map_err(|e| CommandError::InvalidGlobPattern(e.to_string()))?
        .compile_matcher();

    let mut keys = state.store.keys();
    keys.sort();

    let response = keys
        .into_iter()
        .filter(|key| glob.is_match(&*String::from_utf8_lossy(key)))
        .map(RespValue::BulkString)
        .collect();

    Ok(CommandResult::Response(RespValue::Array(response)))
}
