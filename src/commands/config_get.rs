use bytes::Bytes;

use crate::{
    commands::{CommandContext, CommandError, CommandResult},
    resp::RespValue,
    state::ServerState,
};

pub struct ConfigGetArguments {
    pub parameters: Vec<Bytes>,
}

impl ConfigGetArguments {
    pub fn parse(arguments: Vec<Bytes>) -> Result<Self, CommandError> {
        if arguments.is_empty() {
            return Err(CommandError::WrongNumberOfArguments("config|get".to_string()));
        }

        Ok(ConfigGetArguments {
            parameters: arguments,
        })
    }
}

/// Handles `CONFIG GET`, returning `[name, value, ...]` for every known
/// parameter. Unset values are empty strings; unknown names are skipped.
pub fn config_get(
    state: &mut ServerState,
    _context: &CommandContext,
    arguments: Vec<Bytes>,
) -> Result<CommandResult, CommandError> {
    let config_get_arguments = ConfigGetArguments::parse(arguments)?;
    let mut response = Vec::new();

    for parameter in config_get_arguments.parameters {
        let value = match parameter.to_ascii_lowercase().as_slice() {
            b"dir" => state.config.rdb_directory.clone(),
            b"dbfilename" => state.config.rdb_filename.clone(),
            _ => continue,
        };

        response.push(RespValue::BulkString(parameter));
        response.push(RespValue::bulk(value.unwrap_or_default()));
    }

    Ok(CommandResult::Response(RespValue::Array(response)))
}
