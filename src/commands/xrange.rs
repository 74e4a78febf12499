use bytes::Bytes;

use crate::{
    commands::{
        CommandContext, CommandError, CommandResult,
        stream_utils::{RangeBound, entries_to_resp, parse_range_bound},
    },
    key_value_store::StreamId,
    resp::RespValue,
    state::ServerState,
};

/// Represents the parsed arguments for the XRANGE command.
pub struct XrangeArguments {
    key: Bytes,
    start: StreamId,
    end: StreamId,
}

impl XrangeArguments {
    pub fn parse(arguments: Vec<Bytes>) -> Result<Self, CommandError> {
        if arguments.len() != 3 {
            return Err(CommandError::WrongNumberOfArguments("xrange".to_string()));
        }

        Ok(Self {
            key: arguments[0].clone(),
            start: parse_range_bound(&arguments[1], RangeBound::Start)?,
            end: parse_range_bound(&arguments[2], RangeBound::End)?,
        })
    }
}

/// Handles the Redis XRANGE command.
///
/// Returns every entry with `start <= id <= end` as `[[id, [field, value,
/// ...]], ...]`. A missing key yields an empty array.
pub fn xrange(
    state: &mut ServerState,
    _context: &CommandContext,
    arguments: Vec<Bytes>,
) -> Result<CommandResult, CommandError> {
    let xrange_arguments = XrangeArguments::parse(arguments)?;

    let response = match state.store.stream(&xrange_arguments.key)? {
        Some(stream) => entries_to_resp(stream.range(xrange_arguments.start, xrange_arguments.end)),
        None => RespValue::Array(Vec::new()),
    };

    Ok(CommandResult::Response(response))
}
