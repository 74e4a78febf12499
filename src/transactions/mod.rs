mod transaction_handler;

pub use transaction_handler::{StateError, TransactionManager};
