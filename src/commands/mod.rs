mod command_dispatcher;
mod command_error;
mod command_handler;
mod command_utils;
mod config_get;
mod echo;
mod get;
mod incr;
mod info;
mod keys;
mod ping;
mod replication;
mod set;
pub mod stream_utils;
mod transactions;
mod type_command;
mod xadd;
mod xrange;
mod xread;

pub use command_dispatcher::{
    CommandKind, CommandSpec, DispatchOutcome, dispatch_command, dispatch_frame,
    dispatch_from_master, execute_command, lookup,
};
pub use command_error::CommandError;
pub use command_handler::{CommandContext, CommandHandler, CommandResult};
