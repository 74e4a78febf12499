//! RESP (REdis Serialization Protocol) values and the incremental frame codec.
//!
//! Requests arrive as arrays of bulk strings (`*<n>\r\n` followed by `n`
//! occurrences of `$<len>\r\n<bytes>\r\n`). Every decoder in this module is
//! side-effect free: it either returns a complete value together with the
//! number of bytes it occupies, or `Ok(None)` when the buffer does not yet
//! hold enough data. Callers consume bytes only after a successful decode.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// One decoded request: the command name followed by its arguments.
pub type Frame = Vec<Bytes>;

const CRLF: &[u8] = b"\r\n";

/// Errors raised when the buffered bytes can never form a valid value.
#[derive(Error, Debug, PartialEq)]
pub enum RespError {
    #[error("expected '*' at start of frame, got byte {0:#04x}")]
    UnexpectedLeadingByte(u8),
    #[error("expected bulk string inside command array")]
    ExpectedBulkString,
    #[error("invalid length prefix")]
    InvalidLength,
    #[error("bulk string is not terminated by CRLF")]
    MissingTerminator,
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
    #[error("failed to parse integer")]
    FailedToParseInteger,
    #[error("unknown RESP type byte {0:#04x}")]
    UnknownRespType(u8),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Bytes),
    NullBulkString,
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Builds a bulk string by copying `data`.
    pub fn bulk<T: AsRef<[u8]>>(data: T) -> Self {
        RespValue::BulkString(Bytes::copy_from_slice(data.as_ref()))
    }

    /// Re-encodes a request frame as an array of bulk strings.
    pub fn from_frame(frame: &[Bytes]) -> Self {
        RespValue::Array(
            frame
                .iter()
                .map(|part| RespValue::BulkString(part.clone()))
                .collect(),
        )
    }

    pub fn encode(&self) -> Bytes {
        let mut buffer = BytesMut::new();
        self.encode_into(&mut buffer);
        buffer.freeze()
    }

    /// Appends the wire form of this value to `buffer`.
    ///
    /// Bulk strings are prefixed with their byte length, so arbitrary binary
    /// payloads (including embedded CRLF) round-trip unchanged.
    pub fn encode_into(&self, buffer: &mut BytesMut) {
        match self {
            RespValue::SimpleString(s) => {
                buffer.put_u8(b'+');
                buffer.put_slice(s.as_bytes());
                buffer.put_slice(CRLF);
            }
            RespValue::Error(s) => {
                buffer.put_u8(b'-');
                buffer.put_slice(s.as_bytes());
                buffer.put_slice(CRLF);
            }
            RespValue::Integer(n) => {
                buffer.put_u8(b':');
                buffer.put_slice(n.to_string().as_bytes());
                buffer.put_slice(CRLF);
            }
            RespValue::BulkString(data) => {
                buffer.put_u8(b'$');
                buffer.put_slice(data.len().to_string().as_bytes());
                buffer.put_slice(CRLF);
                buffer.put_slice(data);
                buffer.put_slice(CRLF);
            }
            RespValue::NullBulkString => buffer.put_slice(b"$-1\r\n"),
            RespValue::Array(elements) => {
                buffer.put_u8(b'*');
                buffer.put_slice(elements.len().to_string().as_bytes());
                buffer.put_slice(CRLF);

                for element in elements {
                    element.encode_into(buffer);
                }
            }
        }
    }

    /// Decodes any single RESP value from the front of `buffer`.
    ///
    /// Used for replies (e.g. handshake responses from a primary), where the
    /// value is not restricted to the request-array shape.
    pub fn parse(buffer: &[u8]) -> Result<Option<(RespValue, usize)>, RespError> {
        let Some(&type_byte) = buffer.first() else {
            return Ok(None);
        };

        let Some((line, after_line)) = read_line(buffer, 1) else {
            return Ok(None);
        };

        match type_byte {
            b'+' => Ok(Some((RespValue::SimpleString(utf8(line)?), after_line))),
            b'-' => Ok(Some((RespValue::Error(utf8(line)?), after_line))),
            b':' => Ok(Some((RespValue::Integer(parse_integer(line)?), after_line))),
            b'$' => {
                let length = parse_integer(line)?;

                if length == -1 {
                    return Ok(Some((RespValue::NullBulkString, after_line)));
                }

                let Some((data, consumed)) = read_bulk_body(buffer, after_line, length)? else {
                    return Ok(None);
                };

                Ok(Some((RespValue::BulkString(data), consumed)))
            }
            b'*' => {
                let count = parse_integer(line)?;

                if count < 0 {
                    return Err(RespError::InvalidLength);
                }

                let mut cursor = after_line;
                let mut elements = Vec::with_capacity((count as usize).min(1024));

                for _ in 0..count {
                    let Some((element, consumed)) = RespValue::parse(&buffer[cursor..])? else {
                        return Ok(None);
                    };
                    elements.push(element);
                    cursor += consumed;
                }

                Ok(Some((RespValue::Array(elements), cursor)))
            }
            other => Err(RespError::UnknownRespType(other)),
        }
    }
}

/// Attempts to decode one request frame from the front of `buffer`.
///
/// Returns the frame and the number of bytes it spans, or `Ok(None)` when more
/// bytes are needed. A leading byte other than `*` is a protocol error.
pub fn try_decode_frame(buffer: &[u8]) -> Result<Option<(Frame, usize)>, RespError> {
    let Some(&leading_byte) = buffer.first() else {
        return Ok(None);
    };

    if leading_byte != b'*' {
        return Err(RespError::UnexpectedLeadingByte(leading_byte));
    }

    let Some((line, mut cursor)) = read_line(buffer, 1) else {
        return Ok(None);
    };

    let count = parse_integer(line)?;

    if count < 0 {
        return Err(RespError::InvalidLength);
    }

    let mut frame = Vec::with_capacity((count as usize).min(1024));

    for _ in 0..count {
        let Some(&marker) = buffer.get(cursor) else {
            return Ok(None);
        };

        if marker != b'$' {
            return Err(RespError::ExpectedBulkString);
        }

        let Some((line, after_line)) = read_line(buffer, cursor + 1) else {
            return Ok(None);
        };

        let length = parse_integer(line)?;

        let Some((data, consumed)) = read_bulk_body(buffer, after_line, length)? else {
            return Ok(None);
        };

        frame.push(data);
        cursor = consumed;
    }

    Ok(Some((frame, cursor)))
}

/// Decodes a snapshot transfer: `$<len>\r\n` followed by exactly `len` raw
/// bytes with no trailing CRLF.
pub fn try_decode_rdb_payload(buffer: &[u8]) -> Result<Option<(Bytes, usize)>, RespError> {
    let Some(&leading_byte) = buffer.first() else {
        return Ok(None);
    };

    if leading_byte != b'$' {
        return Err(RespError::ExpectedBulkString);
    }

    let Some((line, after_line)) = read_line(buffer, 1) else {
        return Ok(None);
    };

    let length = parse_integer(line)?;

    if length < 0 {
        return Err(RespError::InvalidLength);
    }

    let end = after_line + length as usize;

    if buffer.len() < end {
        return Ok(None);
    }

    Ok(Some((Bytes::copy_from_slice(&buffer[after_line..end]), end)))
}

fn read_bulk_body(
    buffer: &[u8],
    start: usize,
    length: i64,
) -> Result<Option<(Bytes, usize)>, RespError> {
    if length < 0 {
        return Err(RespError::InvalidLength);
    }

    let end = start + length as usize;

    if buffer.len() < end + CRLF.len() {
        return Ok(None);
    }

    if &buffer[end..end + CRLF.len()] != CRLF {
        return Err(RespError::MissingTerminator);
    }

    Ok(Some((
        Bytes::copy_from_slice(&buffer[start..end]),
        end + CRLF.len(),
    )))
}

/// Returns the bytes between `start` and the next CRLF, plus the index just
/// past that CRLF.
fn read_line(buffer: &[u8], start: usize) -> Option<(&[u8], usize)> {
    let rest = buffer.get(start..)?;
    let position = rest.windows(2).position(|window| window == CRLF)?;

    Some((&rest[..position], start + position + CRLF.len()))
}

fn parse_integer(line: &[u8]) -> Result<i64, RespError> {
    std::str::from_utf8(line)
        .map_err(|_| RespError::InvalidUtf8)?
        .parse::<i64>()
        .map_err(|_| RespError::FailedToParseInteger)
}

fn utf8(line: &[u8]) -> Result<String, RespError> {
    String::from_utf8(line.to_vec()).map_err(|_| RespError::InvalidUtf8)
}
