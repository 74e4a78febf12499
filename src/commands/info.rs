use bytes::Bytes;

use crate::{
    commands::{CommandContext, CommandError, CommandResult},
    resp::RespValue,
    state::ServerState,
};

enum InfoSection {
    Default,
    Replication,
}

pub struct InfoArguments {
    section: InfoSection,
}

impl InfoArguments {
    pub fn parse(arguments: Vec<Bytes>) -> Result<Self, CommandError> {
        if arguments.len() > 1 {
            return Err(CommandError::WrongNumberOfArguments("info".to_string()));
        }

        let Some(section) = arguments.first() else {
            return Ok(InfoArguments {
                section: InfoSection::Default,
            });
        };

        let section = match section.to_ascii_lowercase().as_slice() {
            b"replication" => InfoSection::Replication,
            _ => return Err(CommandError::InvalidInfoSection),
        };

        Ok(InfoArguments { section })
    }
}

/// Handles `INFO [replication]`. Only the replication section exists, so
/// both forms return the same fields.
pub fn info(
    state: &mut ServerState,
    _context: &CommandContext,
    arguments: Vec<Bytes>,
) -> Result<CommandResult, CommandError> {
    let info_arguments = InfoArguments::parse(arguments)?;
    let replication = &state.replication;

    let lines = [
        "# Replication".to_string(),
        format!("role:{}", replication.role.as_string()),
        format!("connected_slaves:{}", replication.synced_replica_count()),
        format!("master_replid:{}", replication.repl_id),
        format!("master_repl_offset:{}", replication.repl_offset),
    ];

    match info_arguments.section {
        InfoSection::Default | InfoSection::Replication => Ok(CommandResult::Response(
            RespValue::bulk(lines.join("\r\n")),
        )),
    }
}
