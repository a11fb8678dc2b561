//! Fixed-width integer and string packing.
//!
//! Every multi-byte integer on the wire is a 32-bit value, least-significant
//! byte first. Strings come in two shapes: length-prefixed (4-byte packed
//! length followed by the raw bytes, no terminator) on the persistent stream,
//! and NUL-terminated within a fixed field on discovery datagrams.

use crate::error::ProtocolError;
use bytes::BufMut;

/// Packs an i32 as 4 little-endian bytes.
pub fn pack_i32(value: i32) -> [u8; 4] {
    value.to_le_bytes()
}

/// Recomposes an i32 from 4 little-endian bytes.
///
/// Each byte contributes its unsigned 0-255 value shifted left by its
/// position. The legacy client right-shifted the narrow byte values before
/// masking, which mis-decodes any byte >= 0x80; that variant is not
/// reproduced here.
pub fn unpack_i32(bytes: [u8; 4]) -> i32 {
    i32::from_le_bytes(bytes)
}

/// Appends a length-prefixed string to a stream buffer.
pub fn put_str(buf: &mut impl BufMut, s: &str) {
    buf.put_slice(&pack_i32(s.len() as i32));
    buf.put_slice(s.as_bytes());
}

/// Reads a length-prefixed string starting at `offset`.
///
/// Returns the string and the offset just past it.
pub fn get_str(data: &[u8], offset: usize) -> Result<(String, usize), ProtocolError> {
    if data.len() < offset + 4 {
        return Err(ProtocolError::TruncatedDatagram {
            needed: offset + 4,
            available: data.len(),
        });
    }
    let len_bytes: [u8; 4] = data[offset..offset + 4].try_into().unwrap();
    let len = unpack_i32(len_bytes);
    if len < 0 {
        return Err(ProtocolError::NegativeLength(len));
    }
    let len = len as usize;
    let start = offset + 4;
    if data.len() < start + len {
        return Err(ProtocolError::TruncatedDatagram {
            needed: start + len,
            available: data.len(),
        });
    }
    let s = std::str::from_utf8(&data[start..start + len])
        .map_err(|_| ProtocolError::InvalidUtf8)?
        .to_string();
    Ok((s, start + len))
}

/// Writes a NUL-terminated string into a fixed-size datagram at `offset`.
pub fn put_terminated(
    buf: &mut [u8],
    offset: usize,
    s: &str,
) -> Result<(), ProtocolError> {
    let bytes = s.as_bytes();
    if offset + bytes.len() + 1 > buf.len() {
        return Err(ProtocolError::FieldOverflow { offset });
    }
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
    buf[offset + bytes.len()] = 0;
    Ok(())
}
