use crate::rdb::RdbError;

/// Borrows `len` bytes at `cursor`, failing when the snapshot is truncated.
pub fn get_buffer_slice(buffer: &[u8], cursor: usize, len: usize) -> Result<&[u8], RdbError> {
    let end = cursor
        .checked_add(len)
        .ok_or(RdbError::UnexpectedEof(cursor))?;

    buffer.get(cursor..end).ok_or(RdbError::UnexpectedEof(cursor))
}

/// Reads a fixed-size array at `cursor`.
pub fn get_array<const N: usize>(buffer: &[u8], cursor: usize) -> Result<[u8; N], RdbError> {
    let slice = get_buffer_slice(buffer, cursor, N)?;

    slice.try_into().map_err(|_| RdbError::UnexpectedEof(cursor))
}
