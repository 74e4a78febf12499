use crate::{
    commands::{command_error::CommandError, command_utils::parse_number},
    key_value_store::{StreamEntry, StreamId, StreamIdRequest},
    resp::RespValue,
};

/// Which side of an XRANGE an incomplete id fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    Start,
    End,
}

/// Splits `<ms>-<seq>` into its parts; the sequence is `None` when absent.
fn split_stream_id(argument: &[u8]) -> Result<(&[u8], Option<&[u8]>), CommandError> {
    let mut parts = argument.splitn(2, |byte| *byte == b'-');

    let timestamp = parts.next().ok_or(CommandError::InvalidStreamId)?;

    Ok((timestamp, parts.next()))
}

fn parse_part(part: &[u8]) -> Result<u64, CommandError> {
    parse_number::<u64>(part).ok_or(CommandError::InvalidStreamId)
}

/// Parses the id argument of XADD.
///
/// Accepts `*`, `<ms>-*`, `<ms>-<seq>` and a bare `<ms>` (sequence 0).
///
/// # Examples
///
/// ```ignore
/// assert_eq!(parse_xadd_id(b"*")?, StreamIdRequest::Auto);
/// assert_eq!(parse_xadd_id(b"5-*")?, StreamIdRequest::AutoSequence(5));
/// ```
pub fn parse_xadd_id(argument: &[u8]) -> Result<StreamIdRequest, CommandError> {
    if argument == b"*" {
        return Ok(StreamIdRequest::Auto);
    }

    let (timestamp, sequence) = split_stream_id(argument)?;
    let timestamp = parse_part(timestamp)?;

    match sequence {
        Some(b"*") => Ok(StreamIdRequest::AutoSequence(timestamp)),
        Some(sequence) => Ok(StreamIdRequest::Explicit(StreamId::new(
            timestamp,
            parse_part(sequence)?,
        ))),
        None => Ok(StreamIdRequest::Explicit(StreamId::new(timestamp, 0))),
    }
}

/// Parses one XRANGE bound. `-` and `+` stand for the smallest and largest
/// possible ids; an id without a sequence covers the whole millisecond.
pub fn parse_range_bound(argument: &[u8], bound: RangeBound) -> Result<StreamId, CommandError> {
    match (argument, bound) {
        (b"-", _) => return Ok(StreamId::ZERO),
        (b"+", _) => return Ok(StreamId::MAX),
        _ => {}
    }

    let (timestamp, sequence) = split_stream_id(argument)?;
    let timestamp = parse_part(timestamp)?;

    let sequence = match (sequence, bound) {
        (Some(sequence), _) => parse_part(sequence)?,
        (None, RangeBound::Start) => 0,
        (None, RangeBound::End) => u64::MAX,
    };

    Ok(StreamId::new(timestamp, sequence))
}

/// Parses an XREAD id. `$` is resolved by the caller, so it is rejected here.
pub fn parse_exclusive_id(argument: &[u8]) -> Result<StreamId, CommandError> {
    let (timestamp, sequence) = split_stream_id(argument)?;

    Ok(StreamId::new(
        parse_part(timestamp)?,
        sequence.map(parse_part).transpose()?.unwrap_or(0),
    ))
}

/// Converts stream entries to the RESP shape `[[id, [field, value, ...]], ...]`.
pub fn entries_to_resp(entries: &[StreamEntry]) -> RespValue {
    RespValue::Array(
        entries
            .iter()
            .map(|entry| {
                let fields = entry
                    .fields
                    .iter()
                    .flat_map(|(field, value)| {
                        [
                            RespValue::BulkString(field.clone()),
                            RespValue::BulkString(value.clone()),
                        ]
                    })
                    .collect();

                RespValue::Array(vec![
                    RespValue::bulk(entry.id.to_string()),
                    RespValue::Array(fields),
                ])
            })
            .collect(),
    )
}
