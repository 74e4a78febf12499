use bytes::Bytes;
use jiff::SignedDuration;

use crate::{
    commands::{
        CommandContext, CommandError, CommandResult,
        command_utils::{is_keyword, ok_response, parse_number},
    },
    state::ServerState,
};

/// Represents the parsed arguments for SET command
#[derive(Debug, PartialEq)]
pub struct SetArguments {
    /// The key name to store the value under
    key: Bytes,
    /// The value to be stored under the given key
    value: Bytes,
    /// Time to live, if the key should expire
    ttl: Option<SignedDuration>,
}

impl SetArguments {
    /// Parses command arguments into a SetArguments structure.
    ///
    /// # Arguments
    ///
    /// * `arguments` - Either `[key, value]` or `[key, value, PX|EX, amount]`
    ///
    /// # Returns
    ///
    /// * `Ok(SetArguments)` - Successfully parsed arguments
    /// * `Err(CommandError::WrongNumberOfArguments)` - If the argument count is not 2 or 4
    /// * `Err(CommandError::SyntaxError)` - If the option is neither `PX` nor `EX`
    /// * `Err(CommandError::InvalidSetCommandExpiration)` - If the amount is not a non-negative integer
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // SET mykey hello PX 1000 expires one second from now
    /// let result = SetArguments::parse(vec!["mykey".into(), "hello".into(), "PX".into(), "1000".into()]);
    /// ```
    pub fn parse(arguments: Vec<Bytes>) -> Result<Self, CommandError> {
        if arguments.len() != 2 && arguments.len() != 4 {
            return Err(CommandError::WrongNumberOfArguments("set".to_string()));
        }

        let mut ttl: Option<SignedDuration> = None;

        if arguments.len() == 4 {
            let amount = parse_number::<i64>(&arguments[3])
                .filter(|amount| *amount >= 0)
                .ok_or(CommandError::InvalidSetCommandExpiration)?;

            ttl = if is_keyword(&arguments[2], "PX") {
                Some(SignedDuration::from_millis(amount))
            } else if is_keyword(&arguments[2], "EX") {
                Some(SignedDuration::from_secs(amount))
            } else {
                return Err(CommandError::SyntaxError);
            };
        }

        Ok(Self {
            key: arguments[0].clone(),
            value: arguments[1].clone(),
            ttl,
        })
    }
}

/// Handles the Redis SET command.
///
/// Overwrites any existing value. Without an expiry option any previous
/// deadline on the key is cleared.
pub fn set(
    state: &mut ServerState,
    _context: &CommandContext,
    arguments: Vec<Bytes>,
) -> Result<CommandResult, CommandError> {
    let set_arguments = SetArguments::parse(arguments)?;

    state
        .store
        .set(set_arguments.key, set_arguments.value, set_arguments.ttl)?;

    Ok(CommandResult::Response(ok_response()))
}
