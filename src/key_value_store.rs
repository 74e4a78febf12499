//! The in-memory keyspace.
//!
//! Values live in one map and absolute expiry deadlines in another. Expired
//! keys are removed lazily, the first time an operation touches them.

use std::{collections::HashMap, fmt};

use bytes::Bytes;
use jiff::{SignedDuration, Timestamp};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum StoreError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("value is not an integer or out of range")]
    NotAnInteger,
    #[error("increment or decrement would overflow")]
    IncrementOverflow,
    #[error("invalid expire time")]
    InvalidExpiration,
    #[error("The ID specified in XADD must be greater than 0-0")]
    StreamIdZero,
    #[error("The ID specified in XADD is equal or smaller than the target stream top item")]
    StreamIdNotIncreasing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId {
    pub timestamp: u64,
    pub sequence: u64,
}

impl StreamId {
    pub const ZERO: StreamId = StreamId::new(0, 0);
    pub const MAX: StreamId = StreamId::new(u64::MAX, u64::MAX);

    pub const fn new(timestamp: u64, sequence: u64) -> Self {
        StreamId {
            timestamp,
            sequence,
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.timestamp, self.sequence)
    }
}

/// How the caller of XADD asked for the new entry's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamIdRequest {
    /// `*`
    Auto,
    /// `<ms>-*`
    AutoSequence(u64),
    /// `<ms>-<seq>` or bare `<ms>`
    Explicit(StreamId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: StreamId,
    pub fields: Vec<(Bytes, Bytes)>,
}

/// An append-only log of entries with strictly increasing ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stream {
    entries: Vec<StreamEntry>,
    last_id: StreamId,
}

impl Stream {
    pub fn new() -> Self {
        Stream::default()
    }

    pub fn last_id(&self) -> StreamId {
        self.last_id
    }

    pub fn entries(&self) -> &[StreamEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves the id an XADD with `request` would receive, rejecting ids
    /// that are `0-0` or not above the current top entry.
    pub fn next_id(&self, request: StreamIdRequest, now_ms: u64) -> Result<StreamId, StoreError> {
        let last = self.last_id;

        let id = match request {
            StreamIdRequest::Auto if now_ms > last.timestamp => StreamId::new(now_ms, 0),
            StreamIdRequest::Auto => StreamId::new(
                last.timestamp,
                last.sequence
                    .checked_add(1)
                    .ok_or(StoreError::StreamIdNotIncreasing)?,
            ),
            StreamIdRequest::AutoSequence(timestamp) if timestamp == last.timestamp => {
                StreamId::new(
                    timestamp,
                    last.sequence
                        .checked_add(1)
                        .ok_or(StoreError::StreamIdNotIncreasing)?,
                )
            }
            StreamIdRequest::AutoSequence(timestamp) if timestamp > last.timestamp => {
                StreamId::new(timestamp, 0)
            }
            StreamIdRequest::AutoSequence(_) => return Err(StoreError::StreamIdNotIncreasing),
            StreamIdRequest::Explicit(id) => id,
        };

        if id == StreamId::ZERO {
            return Err(StoreError::StreamIdZero);
        }

        if id <= last {
            return Err(StoreError::StreamIdNotIncreasing);
        }

        Ok(id)
    }

    pub fn append(&mut self, id: StreamId, fields: Vec<(Bytes, Bytes)>) -> Result<(), StoreError> {
        if id == StreamId::ZERO {
            return Err(StoreError::StreamIdZero);
        }

        if id <= self.last_id {
            return Err(StoreError::StreamIdNotIncreasing);
        }

        self.entries.push(StreamEntry { id, fields });
        self.last_id = id;

        Ok(())
    }

    /// Entries with `start <= id <= end`, in id order.
    pub fn range(&self, start: StreamId, end: StreamId) -> &[StreamEntry] {
        let lower = self.entries.partition_point(|entry| entry.id < start);
        let upper = self.entries.partition_point(|entry| entry.id <= end);

        if lower >= upper {
            return &[];
        }

        &self.entries[lower..upper]
    }

    /// Entries with an id strictly greater than `id`.
    pub fn entries_after(&self, id: StreamId) -> &[StreamEntry] {
        let lower = self.entries.partition_point(|entry| entry.id <= id);

        &self.entries[lower..]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    String(Bytes),
    Stream(Stream),
}

impl DataType {
    pub fn type_name(&self) -> &'static str {
        match self {
            DataType::String(_) => "string",
            DataType::Stream(_) => "stream",
        }
    }
}

#[derive(Debug, Default)]
pub struct KeyValueStore {
    data: HashMap<Bytes, DataType>,
    expirations: HashMap<Bytes, Timestamp>,
}

impl KeyValueStore {
    pub fn new() -> Self {
        KeyValueStore::default()
    }

    /// Number of stored keys, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn expiration(&self, key: &[u8]) -> Option<Timestamp> {
        self.expirations.get(key).copied()
    }

    fn is_expired_at(&self, key: &[u8], now: Timestamp) -> bool {
        self.expirations
            .get(key)
            .is_some_and(|deadline| *deadline <= now)
    }

    /// Drops `key` if its deadline has passed. Returns whether the key is
    /// still present afterwards.
    fn purge_if_expired(&mut self, key: &[u8]) -> bool {
        if self.is_expired_at(key, Timestamp::now()) {
            self.data.remove(key);
            self.expirations.remove(key);
            return false;
        }

        self.data.contains_key(key)
    }

    fn live(&mut self, key: &[u8]) -> Option<&DataType> {
        if !self.purge_if_expired(key) {
            return None;
        }

        self.data.get(key)
    }

    /// Inserts a value exactly as given, including an expiry that may already
    /// lie in the past.
    pub fn insert(&mut self, key: Bytes, value: DataType, expiration: Option<Timestamp>) {
        match expiration {
            Some(deadline) => {
                self.expirations.insert(key.clone(), deadline);
            }
            None => {
                self.expirations.remove(&key);
            }
        }

        self.data.insert(key, value);
    }

    /// Stores a string value. A `ttl` installs a deadline relative to now;
    /// without one any previous deadline is cleared.
    pub fn set(
        &mut self,
        key: Bytes,
        value: Bytes,
        ttl: Option<SignedDuration>,
    ) -> Result<(), StoreError> {
        let expiration = match ttl {
            Some(ttl) => Some(
                Timestamp::now()
                    .checked_add(ttl)
                    .map_err(|_| StoreError::InvalidExpiration)?,
            ),
            None => None,
        };

        self.insert(key, DataType::String(value), expiration);

        Ok(())
    }

    pub fn get(&mut self, key: &[u8]) -> Result<Option<Bytes>, StoreError> {
        match self.live(key) {
            Some(DataType::String(value)) => Ok(Some(value.clone())),
            Some(DataType::Stream(_)) => Err(StoreError::WrongType),
            None => Ok(None),
        }
    }

    /// Adds one to the integer stored at `key`, treating a missing key as 0.
    /// The key's deadline, if any, is kept.
    pub fn incr(&mut self, key: &Bytes) -> Result<i64, StoreError> {
        let current = match self.live(key) {
            Some(DataType::String(value)) => parse_integer_value(value)?,
            Some(DataType::Stream(_)) => return Err(StoreError::WrongType),
            None => 0,
        };

        let next = current
            .checked_add(1)
            .ok_or(StoreError::IncrementOverflow)?;

        self.data.insert(
            key.clone(),
            DataType::String(Bytes::from(next.to_string())),
        );

        Ok(next)
    }

    pub fn type_of(&mut self, key: &[u8]) -> &'static str {
        self.live(key).map_or("none", DataType::type_name)
    }

    /// All keys that have not expired, in no particular order.
    pub fn keys(&self) -> Vec<Bytes> {
        let now = Timestamp::now();

        self.data
            .keys()
            .filter(|key| !self.is_expired_at(key, now))
            .cloned()
            .collect()
    }

    /// Live entries with their deadlines, for snapshotting.
    pub fn live_entries(&self) -> impl Iterator<Item = (&Bytes, &DataType, Option<Timestamp>)> {
        let now = Timestamp::now();

        self.data
            .iter()
            .filter(move |(key, _)| !self.is_expired_at(key, now))
            .map(move |(key, value)| (key, value, self.expirations.get(key).copied()))
    }

    pub fn stream(&mut self, key: &[u8]) -> Result<Option<&Stream>, StoreError> {
        match self.live(key) {
            Some(DataType::Stream(stream)) => Ok(Some(stream)),
            Some(DataType::String(_)) => Err(StoreError::WrongType),
            None => Ok(None),
        }
    }

    /// Appends an entry to the stream at `key`, creating the stream when the
    /// key is absent. Nothing is created when the id is rejected.
    pub fn xadd(
        &mut self,
        key: Bytes,
        request: StreamIdRequest,
        fields: Vec<(Bytes, Bytes)>,
        now_ms: u64,
    ) -> Result<StreamId, StoreError> {
        let id = match self.stream(&key)? {
            Some(stream) => stream.next_id(request, now_ms)?,
            None => Stream::new().next_id(request, now_ms)?,
        };

        match self.data.get_mut(&key) {
            Some(DataType::Stream(stream)) => stream.append(id, fields)?,
            _ => {
                let mut stream = Stream::new();
                stream.append(id, fields)?;
                self.insert(key, DataType::Stream(stream), None);
            }
        }

        Ok(id)
    }
}

fn parse_integer_value(value: &[u8]) -> Result<i64, StoreError> {
    let digits = value.strip_prefix(b"-").unwrap_or(value);

    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(StoreError::NotAnInteger);
    }

    std::str::from_utf8(value)
        .map_err(|_| StoreError::NotAnInteger)?
        .parse::<i64>()
        .map_err(|_| StoreError::NotAnInteger)
}

/// Milliseconds since the Unix epoch, as used for stream ids.
pub fn unix_time_millis() -> u64 {
    u64::try_from(Timestamp::now().as_millisecond()).unwrap_or(0)
}
