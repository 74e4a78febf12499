use thiserror::Error;

use crate::{key_value_store::StoreError, resp::RespValue, transactions::StateError};

/// Command-semantic errors. Each renders to an error reply and leaves the
/// connection usable.
#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    EmptyCommand,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("wrong number of arguments for '{0}' command")]
    WrongNumberOfArguments(String),
    #[error("syntax error")]
    SyntaxError,
    #[error("invalid expire time in 'set' command")]
    InvalidSetCommandExpiration,
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("value is not an integer or out of range")]
    NotAnInteger,
    #[error("increment or decrement would overflow")]
    IncrementOverflow,
    #[error("invalid glob pattern: {0}")]
    InvalidGlobPattern(String),
    #[error("Invalid stream ID specified as stream command argument")]
    InvalidStreamId,
    #[error("The ID specified in XADD must be greater than 0-0")]
    StreamIdZero,
    #[error("The ID specified in XADD is equal or smaller than the target stream top item")]
    StreamIdNotIncreasing,
    #[error("timeout is not an integer or out of range")]
    InvalidXReadBlockDuration,
    #[error("Unbalanced 'xread' list of streams: for each stream key an ID or '$' must be specified.")]
    UnbalancedXReadStreams,
    #[error("EXEC without MULTI")]
    ExecWithoutMulti,
    #[error("DISCARD without MULTI")]
    DiscardWithoutMulti,
    #[error("transaction error: {0}")]
    TransactionError(#[from] StateError),
    #[error("invalid INFO section")]
    InvalidInfoSection,
    #[error("invalid REPLCONF command")]
    InvalidReplconfCommand,
    #[error("invalid PSYNC offset")]
    InvalidPsyncOffset,
    #[error("invalid WAIT command argument")]
    InvalidWaitCommandArgument,
    #[error("READONLY You can't write against a read only replica.")]
    ReadOnlyReplica,
}

impl CommandError {
    pub fn as_resp(&self) -> RespValue {
        match self {
            CommandError::WrongType | CommandError::ReadOnlyReplica => {
                RespValue::Error(self.to_string())
            }
            other => RespValue::Error(format!("ERR {}", other)),
        }
    }
}

impl From<StoreError> for CommandError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::WrongType => CommandError::WrongType,
            StoreError::NotAnInteger => CommandError::NotAnInteger,
            StoreError::IncrementOverflow => CommandError::IncrementOverflow,
            StoreError::InvalidExpiration => CommandError::InvalidSetCommandExpiration,
            StoreError::StreamIdZero => CommandError::StreamIdZero,
            StoreError::StreamIdNotIncreasing => CommandError::StreamIdNotIncreasing,
        }
    }
}
