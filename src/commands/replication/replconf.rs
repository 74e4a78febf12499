//! REPLCONF: configuration exchanged over a replication link.
//!
//! A replica sends `listening-port` and `capa` during its handshake and
//! `ACK <offset>` when asked. A primary sends `GETACK *` to ask for that
//! acknowledgement.

use bytes::Bytes;

use crate::{
    commands::{
        CommandContext, CommandError, CommandResult,
        command_utils::{is_keyword, ok_response, parse_number},
    },
    resp::RespValue,
    state::ServerState,
};

#[derive(Debug, PartialEq)]
enum ReplconfConfiguration {
    ListeningPort(u16),
    Capabilities,
    GetAck,
    Ack(u64),
}

/// Represents the parsed arguments for the REPLCONF command.
pub struct ReplconfArguments {
    configuration: ReplconfConfiguration,
}

impl ReplconfArguments {
    /// Parses and validates arguments for the REPLCONF command.
    ///
    /// # Returns
    ///
    /// * `Ok(ReplconfArguments)` - Successfully parsed arguments
    /// * `Err(CommandError::InvalidReplconfCommand)` - Unknown option or malformed value
    pub fn parse(arguments: Vec<Bytes>) -> Result<Self, CommandError> {
        if arguments.len() < 2 || arguments.len() % 2 != 0 {
            return Err(CommandError::InvalidReplconfCommand);
        }

        let option = &arguments[0];
        let value = &arguments[1];

        let configuration = if is_keyword(option, "listening-port") {
            let port = parse_number::<u16>(value).ok_or(CommandError::InvalidReplconfCommand)?;

            ReplconfConfiguration::ListeningPort(port)
        } else if is_keyword(option, "capa") {
            let all_capabilities = arguments
                .chunks_exact(2)
                .all(|pair| is_keyword(&pair[0], "capa"));

            if !all_capabilities {
                return Err(CommandError::InvalidReplconfCommand);
            }

            ReplconfConfiguration::Capabilities
        } else if is_keyword(option, "getack") {
            ReplconfConfiguration::GetAck
        } else if is_keyword(option, "ack") {
            let offset = parse_number::<u64>(value).ok_or(CommandError::InvalidReplconfCommand)?;

            ReplconfConfiguration::Ack(offset)
        } else {
            return Err(CommandError::InvalidReplconfCommand);
        };

        Ok(Self { configuration })
    }
}

/// Handles the Redis REPLCONF command.
///
/// # Returns
///
/// * `listening-port` - Registers the connection as a replica, replies `+OK`
/// * `capa` - Replies `+OK`
/// * `GETACK` - Replies `REPLCONF ACK <offset>` with this node's offset
/// * `ACK` - Stores the replica's offset and sends nothing back
pub fn replconf(
    state: &mut ServerState,
    context: &CommandContext,
    arguments: Vec<Bytes>,
) -> Result<CommandResult, CommandError> {
    let replconf_arguments = ReplconfArguments::parse(arguments)?;

    match replconf_arguments.configuration {
        ReplconfConfiguration::ListeningPort(port) => {
            if let Some(outbound) = state.outbound(context.client_id) {
                state
                    .replication
                    .register_replica(context.client_id, outbound, port);
            }

            Ok(CommandResult::Response(ok_response()))
        }
        ReplconfConfiguration::Capabilities => Ok(CommandResult::Response(ok_response())),
        ReplconfConfiguration::GetAck => Ok(CommandResult::Response(RespValue::Array(vec![
            RespValue::bulk("REPLCONF"),
            RespValue::bulk("ACK"),
            RespValue::bulk(state.replication.repl_offset.to_string()),
        ]))),
        ReplconfConfiguration::Ack(offset) => {
            state.replication.record_ack(context.client_id, offset);

            Ok(CommandResult::NoResponse)
        }
    }
}
