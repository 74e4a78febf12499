//! Input handling for network connections.
//!
//! Each connection owns a [`ReadBuffer`] that accumulates raw bytes from the
//! socket. Reads are readiness driven: the task waits until the socket is
//! readable and then drains whatever the kernel holds without blocking. Frames
//! are only removed from the buffer once they have been decoded completely, so
//! a request split across many TCP segments is decoded exactly as if it had
//! arrived in one piece.

use std::io;

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;
use tokio::net::tcp::OwnedReadHalf;

use crate::resp::{Frame, RespError, RespValue, try_decode_frame, try_decode_rdb_payload};

const READ_CHUNK_SIZE: usize = 4096;

/// Errors that can occur while reading and decoding data from network streams.
#[derive(Error, Debug)]
pub enum CommandReadError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("RESP parse error: {0}")]
    RespParseError(#[from] RespError),
}

/// Result of a single non-blocking read attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were appended to the buffer.
    Data(usize),
    /// The peer closed its write side.
    Closed,
    /// Readiness was reported spuriously; nothing was read.
    WouldBlock,
}

/// A decoded request together with the number of wire bytes it occupied.
#[derive(Debug, PartialEq)]
pub struct DecodedFrame {
    pub frame: Frame,
    pub length: usize,
}

#[derive(Debug, Default)]
pub struct ReadBuffer {
    buffer: BytesMut,
}

impl ReadBuffer {
    pub fn new() -> Self {
        ReadBuffer {
            buffer: BytesMut::with_capacity(READ_CHUNK_SIZE),
        }
    }

    pub fn append(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn consume_front(&mut self, count: usize) {
        self.buffer.advance(count.min(self.buffer.len()));
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Decodes and removes the next request frame, if one is complete.
    pub fn next_frame(&mut self) -> Result<Option<DecodedFrame>, RespError> {
        let Some((frame, length)) = try_decode_frame(&self.buffer)? else {
            return Ok(None);
        };

        self.consume_front(length);

        Ok(Some(DecodedFrame { frame, length }))
    }

    /// Decodes and removes the next reply value of any RESP type.
    pub fn next_value(&mut self) -> Result<Option<RespValue>, RespError> {
        let Some((value, length)) = RespValue::parse(&self.buffer)? else {
            return Ok(None);
        };

        self.consume_front(length);

        Ok(Some(value))
    }

    /// Decodes and removes a `$<len>\r\n<payload>` snapshot transfer.
    pub fn next_rdb_payload(&mut self) -> Result<Option<Bytes>, RespError> {
        let Some((payload, length)) = try_decode_rdb_payload(&self.buffer)? else {
            return Ok(None);
        };

        self.consume_front(length);

        Ok(Some(payload))
    }

    /// Removes and returns one CRLF-terminated line, without the terminator.
    pub fn next_line(&mut self) -> Option<Bytes> {
        let position = self.buffer.windows(2).position(|window| window == b"\r\n")?;
        let line = self.buffer.split_to(position).freeze();

        self.consume_front(2);

        Some(line)
    }

    /// Waits for the socket to become readable and appends whatever is
    /// available to the buffer.
    ///
    /// # Returns
    ///
    /// * `Ok(ReadOutcome::Data(n))` - `n` bytes were read
    /// * `Ok(ReadOutcome::Closed)` - The peer closed the connection
    /// * `Ok(ReadOutcome::WouldBlock)` - The readiness event was spurious
    /// * `Err(io::Error)` - Any other socket error
    pub async fn read_from(&mut self, reader: &OwnedReadHalf) -> io::Result<ReadOutcome> {
        reader.readable().await?;

        self.buffer.reserve(READ_CHUNK_SIZE);

        match reader.try_read_buf(&mut self.buffer) {
            Ok(0) => Ok(ReadOutcome::Closed),
            Ok(n) => Ok(ReadOutcome::Data(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(ReadOutcome::WouldBlock),
            Err(e) => Err(e),
        }
    }

    /// Keeps reading until a full reply value is buffered.
    pub async fn read_value(&mut self, reader: &OwnedReadHalf) -> Result<RespValue, CommandReadError> {
        loop {
            if let Some(value) = self.next_value()? {
                return Ok(value);
            }

            if self.read_from(reader).await? == ReadOutcome::Closed {
                return Err(CommandReadError::ConnectionClosed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::ReadBuffer;

    #[test]
    fn test_next_frame_waits_for_complete_input() {
        let mut buffer = ReadBuffer::new();
        let input = b"*2\r\n$4\r\nECHO\r\n$3\r\nhey\r\n*1\r\n$4\r\nPING\r\n";

        buffer.append(&input[..10]);
        assert_eq!(buffer.next_frame(), Ok(None));
        assert_eq!(buffer.len(), 10, "incomplete frames must not be consumed");

        buffer.append(&input[10..]);

        let first = buffer.next_frame().unwrap().unwrap();
        assert_eq!(
            first.frame,
            vec![Bytes::from_static(b"ECHO"), Bytes::from_static(b"hey")]
        );
        assert_eq!(first.length, 23);

        let second = buffer.next_frame().unwrap().unwrap();
        assert_eq!(second.frame, vec![Bytes::from_static(b"PING")]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_next_line_and_payload() {
        let mut buffer = ReadBuffer::new();
        buffer.append(b"+FULLRESYNC id 0\r\n$5\r\nREDIS*1\r\n");

        assert_eq!(buffer.next_line(), Some(Bytes::from_static(b"+FULLRESYNC id 0")));
        assert_eq!(
            buffer.next_rdb_payload(),
            Ok(Some(Bytes::from_static(b"REDIS")))
        );
        assert_eq!(buffer.as_bytes(), b"*1\r\n");
        assert_eq!(buffer.next_line(), Some(Bytes::from_static(b"*1")));
        assert_eq!(buffer.next_line(), None);
    }
}
