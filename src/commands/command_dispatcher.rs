//! Verb lookup, transaction queueing and write propagation.
//!
//! Every request passes through [`dispatch_frame`]. The verb is looked up in
//! a table keyed by its uppercased name; the entry carries the handler, its
//! Redis-style arity and whether it mutates the keyspace. Successful writes
//! issued by ordinary clients on a primary are forwarded to replicas in the
//! same step.

use std::{collections::HashMap, sync::LazyLock};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::{
    commands::{
        CommandContext, CommandError, CommandHandler, CommandResult,
        command_utils::is_keyword,
        config_get::config_get,
        echo::echo,
        get::get,
        incr::incr,
        info::info,
        keys::keys,
        ping::ping,
        replication::{psync, replconf, wait},
        set::set,
        transactions::{discard, exec, multi},
        type_command::type_command,
        xadd::xadd,
        xrange::xrange,
        xread::xread,
    },
    resp::{Frame, RespValue},
    state::{ClientId, ClientKind, ServerState},
};

type Handler =
    fn(&mut ServerState, &CommandContext, Vec<Bytes>) -> Result<CommandResult, CommandError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Read,
    Write,
}

pub struct CommandSpec {
    pub handler: Handler,
    pub kind: CommandKind,
    /// Number of words including the verb; negative means "at least".
    pub arity: i32,
}

impl CommandSpec {
    fn read(handler: Handler, arity: i32) -> Self {
        CommandSpec {
            handler,
            kind: CommandKind::Read,
            arity,
        }
    }

    fn write(handler: Handler, arity: i32) -> Self {
        CommandSpec {
            handler,
            kind: CommandKind::Write,
            arity,
        }
    }

    pub fn check_arity(&self, command: &CommandHandler) -> Result<(), CommandError> {
        let words = command.arguments.len() as i32 + 1;

        let valid = if self.arity >= 0 {
            words == self.arity
        } else {
            words >= -self.arity
        };

        if !valid {
            return Err(CommandError::WrongNumberOfArguments(
                command.name.to_lowercase().replace(' ', "|"),
            ));
        }

        Ok(())
    }
}

static COMMAND_TABLE: LazyLock<HashMap<&'static str, CommandSpec>> = LazyLock::new(|| {
    HashMap::from([
        ("PING", CommandSpec::read(ping, -1)),
        ("ECHO", CommandSpec::read(echo, 2)),
        ("GET", CommandSpec::read(get, 2)),
        ("SET", CommandSpec::write(set, -3)),
        ("INCR", CommandSpec::write(incr, 2)),
        ("TYPE", CommandSpec::read(type_command, 2)),
        ("KEYS", CommandSpec::read(keys, 2)),
        ("XADD", CommandSpec::write(xadd, -5)),
        ("XRANGE", CommandSpec::read(xrange, 4)),
        ("XREAD", CommandSpec::read(xread, -4)),
        ("MULTI", CommandSpec::read(multi, 1)),
        ("EXEC", CommandSpec::read(exec, 1)),
        ("DISCARD", CommandSpec::read(discard, 1)),
        ("CONFIG GET", CommandSpec::read(config_get, -2)),
        ("INFO", CommandSpec::read(info, -1)),
        ("REPLCONF", CommandSpec::read(replconf, -3)),
        ("PSYNC", CommandSpec::read(psync, 3)),
        ("WAIT", CommandSpec::read(wait, 3)),
    ])
});

/// Verbs that are executed immediately even while a transaction is queueing.
const TRANSACTION_CONTROL: [&str; 3] = ["MULTI", "EXEC", "DISCARD"];

pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMAND_TABLE.get(name)
}

/// What the connection should see after a request was dispatched.
#[derive(Debug, PartialEq)]
pub enum DispatchOutcome {
    Reply(Bytes),
    /// The client is blocked; its reply comes later.
    Suspended,
    Silent,
}

pub fn dispatch_frame(
    state: &mut ServerState,
    context: &CommandContext,
    frame: Frame,
) -> DispatchOutcome {
    match CommandHandler::new(frame) {
        Ok(command) => dispatch_command(state, context, command),
        Err(e) => DispatchOutcome::Reply(e.as_resp().encode()),
    }
}

pub fn dispatch_command(
    state: &mut ServerState,
    context: &CommandContext,
    command: CommandHandler,
) -> DispatchOutcome {
    if state.transactions.is_queuing(context.client_id)
        && !TRANSACTION_CONTROL.contains(&command.name.as_str())
    {
        return DispatchOutcome::Reply(queue_command(state, context, command).encode());
    }

    match execute_command(state, context, &command) {
        Ok(CommandResult::Response(response)) => DispatchOutcome::Reply(response.encode()),
        Ok(CommandResult::NoResponse) => DispatchOutcome::Silent,
        Ok(CommandResult::Blocked) => DispatchOutcome::Suspended,
        Ok(CommandResult::Sync(reply)) => DispatchOutcome::Reply(reply),
        Ok(CommandResult::Batch(commands)) => {
            DispatchOutcome::Reply(run_transaction_commands(state, context, commands).encode())
        }
        Err(e) => DispatchOutcome::Reply(e.as_resp().encode()),
    }
}

/// Applies a frame received over the link to the primary. Only the reply to
/// `REPLCONF GETACK` is returned; everything else is applied silently.
pub fn dispatch_from_master(
    state: &mut ServerState,
    client_id: ClientId,
    frame: Frame,
) -> Option<Bytes> {
    let command = match CommandHandler::new(frame) {
        Ok(command) => command,
        Err(e) => {
            warn!(error = %e, "ignoring malformed frame from primary");
            return None;
        }
    };

    let is_getack = command.name == "REPLCONF"
        && command
            .arguments
            .first()
            .is_some_and(|option| is_keyword(option, "GETACK"));

    let context = CommandContext::new(client_id, ClientKind::Master);

    match dispatch_command(state, &context, command) {
        DispatchOutcome::Reply(reply) if is_getack => Some(reply),
        DispatchOutcome::Reply(reply) => {
            debug!(reply = ?reply, "suppressed reply to primary");
            None
        }
        DispatchOutcome::Suspended | DispatchOutcome::Silent => None,
    }
}

/// Validates a command and appends it to the client's transaction queue.
/// Unknown verbs and bad arity are reported immediately and not queued.
fn queue_command(
    state: &mut ServerState,
    context: &CommandContext,
    command: CommandHandler,
) -> RespValue {
    let validation = lookup(&command.name)
        .ok_or_else(|| unknown_command(&command))
        .and_then(|spec| spec.check_arity(&command));

    if let Err(e) = validation {
        return e.as_resp();
    }

    match state.transactions.add_to_transaction(context.client_id, command) {
        Ok(()) => RespValue::SimpleString("QUEUED".to_string()),
        Err(e) => CommandError::from(e).as_resp(),
    }
}

/// Runs one command: arity and role checks, the handler itself, and
/// propagation of successful writes.
pub fn execute_command(
    state: &mut ServerState,
    context: &CommandContext,
    command: &CommandHandler,
) -> Result<CommandResult, CommandError> {
    let spec = lookup(&command.name).ok_or_else(|| unknown_command(command))?;
    spec.check_arity(command)?;

    let is_write = spec.kind == CommandKind::Write;
    let from_client = context.client_kind == ClientKind::Normal;

    if is_write && from_client && state.replication.role.is_replica() {
        return Err(CommandError::ReadOnlyReplica);
    }

    let result = (spec.handler)(state, context, command.arguments.clone())?;

    if is_write && from_client && !state.replication.role.is_replica() {
        state.replication.propagate(&command.input);
    }

    Ok(result)
}

/// Executes the commands queued by MULTI, collecting one reply per command.
/// Each write is propagated on its own.
fn run_transaction_commands(
    state: &mut ServerState,
    context: &CommandContext,
    commands: Vec<CommandHandler>,
) -> RespValue {
    let context = context.for_transaction();

    let responses = commands
        .into_iter()
        .map(|command| match execute_command(state, &context, &command) {
            Ok(CommandResult::Response(response)) => response,
            Ok(CommandResult::NoResponse | CommandResult::Blocked) => RespValue::NullBulkString,
            Ok(CommandResult::Sync(_) | CommandResult::Batch(_)) => RespValue::Error(format!(
                "ERR {} is not allowed inside a transaction",
                command.name
            )),
            Err(e) => e.as_resp(),
        })
        .collect();

    RespValue::Array(responses)
}

fn unknown_command(command: &CommandHandler) -> CommandError {
    let name = command
        .input
        .first()
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .unwrap_or_default();

    CommandError::UnknownCommand(name)
}
