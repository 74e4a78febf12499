use bytes::Bytes;

use crate::{
    commands::{CommandContext, CommandError, CommandResult, stream_utils::parse_xadd_id},
    key_value_store::{StreamIdRequest, unix_time_millis},
    resp::RespValue,
    state::ServerState,
};

pub struct XaddArguments {
    key: Bytes,
    id: StreamIdRequest,
    fields: Vec<(Bytes, Bytes)>,
}

impl XaddArguments {
    /// Parses `key id field value [field value ...]`.
    pub fn parse(arguments: Vec<Bytes>) -> Result<Self, CommandError> {
        if arguments.len() < 4 || arguments.len() % 2 != 0 {
            return Err(CommandError::WrongNumberOfArguments("xadd".to_string()));
        }

        let id = parse_xadd_id(&arguments[1])?;

        let fields = arguments[2..]
            .chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();

        Ok(Self {
            key: arguments[0].clone(),
            id,
            fields,
        })
    }
}

/// Handles the Redis XADD command.
///
/// Appends an entry, creating the stream if needed, and answers any blocked
/// XREAD the new entry satisfies.
///
/// # Returns
///
/// * `Ok(CommandResult::Response)` - The id of the new entry as a bulk string
/// * `Err(CommandError::StreamIdZero)` - If the id resolves to `0-0`
/// * `Err(CommandError::StreamIdNotIncreasing)` - If the id is not above the stream's top entry
/// * `Err(CommandError::WrongType)` - If the key holds a string
pub fn xadd(
    state: &mut ServerState,
    _context: &CommandContext,
    arguments: Vec<Bytes>,
) -> Result<CommandResult, CommandError> {
    let xadd_arguments = XaddArguments::parse(arguments)?;

    let id = state.store.xadd(
        xadd_arguments.key.clone(),
        xadd_arguments.id,
        xadd_arguments.fields,
        unix_time_millis(),
    )?;

    state.wake_blocked_readers(&xadd_arguments.key, id);

    Ok(CommandResult::Response(RespValue::bulk(id.to_string())))
}
