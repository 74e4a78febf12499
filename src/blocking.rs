//! Bookkeeping for clients parked in `XREAD BLOCK`.
//!
//! A blocked client registers one waiter per stream it reads. Once any of
//! those streams receives an entry past the waiter's id, or the deadline
//! elapses, every waiter belonging to that client is removed at once.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::time::Instant;

use crate::{key_value_store::StreamId, state::ClientId};

#[derive(Debug, Clone, PartialEq)]
pub struct BlockedReader {
    pub client_id: ClientId,
    pub stream_key: Bytes,
    /// Only entries with an id strictly greater than this satisfy the read.
    pub since_id: StreamId,
    /// `None` waits forever.
    pub deadline: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct BlockingRegistry {
    readers: HashMap<Bytes, Vec<BlockedReader>>,
}

impl BlockingRegistry {
    pub fn new() -> Self {
        BlockingRegistry::default()
    }

    pub fn register(&mut self, reader: BlockedReader) {
        self.readers
            .entry(reader.stream_key.clone())
            .or_default()
            .push(reader);
    }

    pub fn is_blocked(&self, client_id: ClientId) -> bool {
        self.readers
            .values()
            .flatten()
            .any(|reader| reader.client_id == client_id)
    }

    /// Earliest deadline among all waiters.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.readers
            .values()
            .flatten()
            .filter_map(|reader| reader.deadline)
            .min()
    }

    /// Removes every waiter of `client_id`.
    pub fn remove_client(&mut self, client_id: ClientId) {
        self.readers.retain(|_, readers| {
            readers.retain(|reader| reader.client_id != client_id);
            !readers.is_empty()
        });
    }

    /// Takes the waiters on `stream_key` that an entry with `new_id`
    /// satisfies, in registration order. Their waiters on other streams are
    /// dropped as well.
    pub fn take_ready(&mut self, stream_key: &[u8], new_id: StreamId) -> Vec<BlockedReader> {
        let Some(readers) = self.readers.get_mut(stream_key) else {
            return Vec::new();
        };

        let (ready, waiting): (Vec<BlockedReader>, Vec<BlockedReader>) = readers
            .drain(..)
            .partition(|reader| reader.since_id < new_id);

        *readers = waiting;

        for reader in &ready {
            self.remove_client(reader.client_id);
        }

        ready
    }

    /// Takes the clients whose deadline is at or before `now`.
    pub fn take_expired(&mut self, now: Instant) -> Vec<ClientId> {
        let mut expired: Vec<ClientId> = Vec::new();

        for reader in self.readers.values().flatten() {
            let timed_out = reader.deadline.is_some_and(|deadline| deadline <= now);

            if timed_out && !expired.contains(&reader.client_id) {
                expired.push(reader.client_id);
            }
        }

        for client_id in &expired {
            self.remove_client(*client_id);
        }

        expired
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use tokio::time::Instant;

    use crate::key_value_store::StreamId;

    use super::{BlockedReader, BlockingRegistry};

    fn reader(client_id: u64, key: &'static str, since: u64, deadline: Option<Instant>) -> BlockedReader {
        BlockedReader {
            client_id,
            stream_key: Bytes::from_static(key.as_bytes()),
            since_id: StreamId::new(since, 0),
            deadline,
        }
    }

    #[test]
    fn test_take_ready_drops_all_waiters_of_client() {
        let mut registry = BlockingRegistry::new();

        registry.register(reader(1, "a", 5, None));
        registry.register(reader(1, "b", 5, None));
        registry.register(reader(2, "a", 9, None));

        let ready = registry.take_ready(b"a", StreamId::new(6, 0));

        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].client_id, 1);
        assert!(!registry.is_blocked(1));
        assert!(registry.is_blocked(2));
        assert!(registry.take_ready(b"b", StreamId::new(100, 0)).is_empty());
    }

    #[test]
    fn test_take_expired() {
        let now = Instant::now();
        let mut registry = BlockingRegistry::new();

        registry.register(reader(1, "a", 0, Some(now + Duration::from_millis(10))));
        registry.register(reader(1, "b", 0, Some(now + Duration::from_millis(10))));
        registry.register(reader(2, "a", 0, Some(now + Duration::from_millis(50))));
        registry.register(reader(3, "a", 0, None));

        assert_eq!(registry.next_deadline(), Some(now + Duration::from_millis(10)));
        assert!(registry.take_expired(now).is_empty());
        assert_eq!(registry.take_expired(now + Duration::from_millis(20)), vec![1]);
        assert_eq!(registry.next_deadline(), Some(now + Duration::from_millis(50)));

        registry.remove_client(2);
        assert_eq!(registry.next_deadline(), None);
        assert!(registry.is_blocked(3));
    }
}
