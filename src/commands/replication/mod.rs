mod psync;
mod replconf;
mod wait;

pub use psync::{PsyncArguments, psync};
pub use replconf::{ReplconfArguments, replconf};
pub use wait::{WaitArguments, wait};
