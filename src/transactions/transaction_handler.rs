use std::collections::HashMap;

use thiserror::Error;

use crate::{commands::CommandHandler, state::ClientId};

#[derive(Error, Debug, PartialEq)]
pub enum StateError {
    #[error("no transaction in progress")]
    TransactionNotFound,
}

/// Per-client queues of commands collected between MULTI and EXEC.
#[derive(Debug, Default)]
pub struct TransactionManager {
    transactions: HashMap<ClientId, Vec<CommandHandler>>,
}

impl TransactionManager {
    pub fn new() -> Self {
        TransactionManager::default()
    }

    /// Opens an empty queue for `client_id`, replacing any queue in progress.
    pub fn start_transaction(&mut self, client_id: ClientId) {
        self.transactions.insert(client_id, Vec::new());
    }

    pub fn is_queuing(&self, client_id: ClientId) -> bool {
        self.transactions.contains_key(&client_id)
    }

    pub fn get_transaction(&self, client_id: ClientId) -> Option<&Vec<CommandHandler>> {
        self.transactions.get(&client_id)
    }

    pub fn add_to_transaction(
        &mut self,
        client_id: ClientId,
        command: CommandHandler,
    ) -> Result<(), StateError> {
        let transaction = self
            .transactions
            .get_mut(&client_id)
            .ok_or(StateError::TransactionNotFound)?;

        transaction.push(command);

        Ok(())
    }

    pub fn remove_transaction(&mut self, client_id: ClientId) -> Result<Vec<CommandHandler>, StateError> {
        self.transactions
            .remove(&client_id)
            .ok_or(StateError::TransactionNotFound)
    }

    pub fn remove_client(&mut self, client_id: ClientId) {
        self.transactions.remove(&client_id);
    }
}
