use bytes::{BufMut, Bytes, BytesMut};

use crate::rdb::{
    RdbError,
    get_slice::{get_array, get_buffer_slice},
};

/// What the two high bits of a length byte announce.
#[derive(Debug, PartialEq)]
enum LengthEncoding {
    Length(usize),
    Int8,
    Int16,
    Int32,
    LzfCompressedString,
}

fn parse_length_encoding(bytes: &[u8], cursor: usize) -> Result<(LengthEncoding, usize), RdbError> {
    let byte = get_buffer_slice(bytes, cursor, 1)?[0];

    match byte >> 6 {
        0b00 => Ok((LengthEncoding::Length((byte & 0b0011_1111) as usize), 1)),
        0b01 => {
            // 14 bits: the low six bits of the first byte, then the whole next byte
            let next = get_buffer_slice(bytes, cursor + 1, 1)?[0];
            let length = (((byte & 0b0011_1111) as usize) << 8) | next as usize;

            Ok((LengthEncoding::Length(length), 2))
        }
        0b10 => match byte {
            0x80 => {
                let length = u32::from_be_bytes(get_array::<4>(bytes, cursor + 1)?);
                Ok((LengthEncoding::Length(length as usize), 5))
            }
            0x81 => {
                let length = u64::from_be_bytes(get_array::<8>(bytes, cursor + 1)?);
                let length = usize::try_from(length).map_err(|_| RdbError::InvalidLengthEncoding(byte))?;
                Ok((LengthEncoding::Length(length), 9))
            }
            _ => Err(RdbError::InvalidLengthEncoding(byte)),
        },
        _ => match byte & 0b0011_1111 {
            0 => Ok((LengthEncoding::Int8, 1)),
            1 => Ok((LengthEncoding::Int16, 1)),
            2 => Ok((LengthEncoding::Int32, 1)),
            3 => Ok((LengthEncoding::LzfCompressedString, 1)),
            _ => Err(RdbError::InvalidLengthEncoding(byte)),
        },
    }
}

/// Reads a plain length (database number, hash table sizes).
pub fn parse_length(bytes: &[u8], cursor: usize) -> Result<(usize, usize), RdbError> {
    match parse_length_encoding(bytes, cursor)? {
        (LengthEncoding::Length(length), bytes_read) => Ok((length, bytes_read)),
        _ => Err(RdbError::ExpectedLength),
    }
}

/// Reads a string, which is either length-prefixed raw bytes or a special
/// integer encoding rendered back to its decimal text.
pub fn parse_string(bytes: &[u8], cursor: usize) -> Result<(Bytes, usize), RdbError> {
    let (encoding, header) = parse_length_encoding(bytes, cursor)?;
    let start = cursor + header;

    let (value, body) = match encoding {
        LengthEncoding::Length(length) => (
            Bytes::copy_from_slice(get_buffer_slice(bytes, start, length)?),
            length,
        ),
        LengthEncoding::Int8 => {
            let value = i8::from_le_bytes(get_array::<1>(bytes, start)?);
            (Bytes::from(value.to_string()), 1)
        }
        LengthEncoding::Int16 => {
            let value = i16::from_le_bytes(get_array::<2>(bytes, start)?);
            (Bytes::from(value.to_string()), 2)
        }
        LengthEncoding::Int32 => {
            let value = i32::from_le_bytes(get_array::<4>(bytes, start)?);
            (Bytes::from(value.to_string()), 4)
        }
        LengthEncoding::LzfCompressedString => return Err(RdbError::UnsupportedCompressedString),
    };

    Ok((value, header + body))
}

pub fn write_length(buffer: &mut BytesMut, length: usize) {
    if length < 1 << 6 {
        buffer.put_u8(length as u8);
    } else if length < 1 << 14 {
        buffer.put_u8(0b0100_0000 | (length >> 8) as u8);
        buffer.put_u8(length as u8);
    } else if let Ok(length) = u32::try_from(length) {
        buffer.put_u8(0x80);
        buffer.put_u32(length);
    } else {
        buffer.put_u8(0x81);
        buffer.put_u64(length as u64);
    }
}

pub fn write_string(buffer: &mut BytesMut, value: &[u8]) {
    write_length(buffer, value.len());
    buffer.put_slice(value);
}

/// Writes a small integer with the one-byte special encoding (`0xC0`).
pub fn write_int8(buffer: &mut BytesMut, value: i8) {
    buffer.put_u8(0xC0);
    buffer.put_i8(value);
}
