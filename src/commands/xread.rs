use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use crate::{
    blocking::BlockedReader,
    commands::{
        CommandContext, CommandError, CommandResult,
        command_utils::{is_keyword, parse_number},
        stream_utils::{entries_to_resp, parse_exclusive_id},
    },
    key_value_store::StreamId,
    resp::RespValue,
    state::ServerState,
};

/// Represents the parsed arguments for the XREAD command.
///
/// Format: `XREAD [BLOCK milliseconds] STREAMS key1 key2 ... id1 id2 ...`
#[derive(Debug, PartialEq)]
pub struct XreadArguments {
    /// Blocking duration in milliseconds; `Some(0)` blocks forever.
    block: Option<u64>,
    /// `(key, id)` pairs, with the id still unresolved (`$` is kept as is).
    streams: Vec<(Bytes, Bytes)>,
}

impl XreadArguments {
    /// Parses command arguments into structured XreadArguments.
    ///
    /// # Returns
    ///
    /// * `Ok(XreadArguments)` - Successfully parsed arguments
    /// * `Err(CommandError::InvalidXReadBlockDuration)` - If the block duration is not a number
    /// * `Err(CommandError::SyntaxError)` - If an unknown option appears or `STREAMS` is missing
    /// * `Err(CommandError::UnbalancedXReadStreams)` - If keys and ids do not pair up
    pub fn parse(arguments: Vec<Bytes>) -> Result<Self, CommandError> {
        let mut block = None;
        let mut index = 0;

        loop {
            let Some(option) = arguments.get(index) else {
                return Err(CommandError::SyntaxError);
            };

            if is_keyword(option, "BLOCK") {
                let duration = arguments
                    .get(index + 1)
                    .and_then(|duration| parse_number::<u64>(duration))
                    .ok_or(CommandError::InvalidXReadBlockDuration)?;

                block = Some(duration);
                index += 2;
            } else if is_keyword(option, "STREAMS") {
                index += 1;
                break;
            } else {
                return Err(CommandError::SyntaxError);
            }
        }

        let data = &arguments[index..];

        if data.is_empty() || data.len() % 2 != 0 {
            return Err(CommandError::UnbalancedXReadStreams);
        }

        let (keys, ids) = data.split_at(data.len() / 2);

        Ok(Self {
            block,
            streams: keys.iter().cloned().zip(ids.iter().cloned()).collect(),
        })
    }
}

/// Handles the Redis XREAD command.
///
/// Replies at once with `[[key, entries], ...]` for every stream that has
/// entries past the requested id. When nothing qualifies, a non-blocking read
/// (or any read inside EXEC) replies with a null bulk string, while a blocking
/// read registers one waiter per stream and suspends the client.
pub fn xread(
    state: &mut ServerState,
    context: &CommandContext,
    arguments: Vec<Bytes>,
) -> Result<CommandResult, CommandError> {
    let xread_arguments = XreadArguments::parse(arguments)?;

    let mut requests: Vec<(Bytes, StreamId)> = Vec::with_capacity(xread_arguments.streams.len());

    for (key, id) in xread_arguments.streams {
        let since_id = if id.as_ref() == b"$" {
            state
                .store
                .stream(&key)?
                .map_or(StreamId::ZERO, |stream| stream.last_id())
        } else {
            parse_exclusive_id(&id)?
        };

        requests.push((key, since_id));
    }

    let mut response = Vec::new();

    for (key, since_id) in &requests {
        let Some(stream) = state.store.stream(key)? else {
            continue;
        };

        let entries = stream.entries_after(*since_id);

        if !entries.is_empty() {
            response.push(RespValue::Array(vec![
                RespValue::BulkString(key.clone()),
                entries_to_resp(entries),
            ]));
        }
    }

    if !response.is_empty() {
        return Ok(CommandResult::Response(RespValue::Array(response)));
    }

    let Some(block) = xread_arguments.block else {
        return Ok(CommandResult::Response(RespValue::NullBulkString));
    };

    if context.in_transaction {
        return Ok(CommandResult::Response(RespValue::NullBulkString));
    }

    let deadline = match block {
        0 => None,
        milliseconds => Some(Instant::now() + Duration::from_millis(milliseconds)),
    };

    for (stream_key, since_id) in requests {
        state.blocking.register(BlockedReader {
            client_id: context.client_id,
            stream_key,
            since_id,
            deadline,
        });
    }

    Ok(CommandResult::Blocked)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::commands::CommandError;

    use super::XreadArguments;

    fn arguments(parts: &[&'static str]) -> Vec<Bytes> {
        parts
            .iter()
            .map(|part| Bytes::from_static(part.as_bytes()))
            .collect()
    }

    fn streams(pairs: &[(&'static str, &'static str)]) -> Vec<(Bytes, Bytes)> {
        pairs
            .iter()
            .map(|(key, id)| (Bytes::from_static(key.as_bytes()), Bytes::from_static(id.as_bytes())))
            .collect()
    }

    #[test]
    fn test_parse_xread_arguments() {
        let test_cases = vec![
            (
                arguments(&["STREAMS", "a", "0-0"]),
                Ok(XreadArguments {
                    block: None,
                    streams: streams(&[("a", "0-0")]),
                }),
            ),
            (
                arguments(&["block", "1500", "streams", "a", "b", "$", "5-1"]),
                Ok(XreadArguments {
                    block: Some(1500),
                    streams: streams(&[("a", "$"), ("b", "5-1")]),
                }),
            ),
            (
                arguments(&["BLOCK", "soon", "STREAMS", "a", "0"]),
                Err(CommandError::InvalidXReadBlockDuration),
            ),
            (
                arguments(&["STREAMS", "a", "b", "0"]),
                Err(CommandError::UnbalancedXReadStreams),
            ),
            (arguments(&["COUNT", "1", "STREAMS", "a", "0"]), Err(CommandError::SyntaxError)),
            (arguments(&["BLOCK", "0"]), Err(CommandError::SyntaxError)),
        ];

        for (input, expected) in test_cases {
            assert_eq!(
                XreadArguments::parse(input.clone()),
                expected,
                "parsing XREAD arguments {:?}",
                input
            );
        }
    }
}
