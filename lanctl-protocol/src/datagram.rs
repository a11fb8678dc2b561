//! Discovery datagram builders and reply parsers.
//!
//! Requests are fixed-size buffers with an ASCII service-type marker
//! NUL-terminated at offset 0 and, depending on the kind, a second field at
//! offset 128: the tag string for tagged lookups or a packed 32-bit argument
//! for capability presses.

use crate::error::ProtocolError;
use crate::wire::{get_str, pack_i32, put_terminated, unpack_i32};
use crate::{
    CAPABILITY_DATAGRAM_LEN, DATAGRAM_ARG_OFFSET, PORT_FIELD_LEN, SERVICE_TYPE_CAPABILITY,
    SERVICE_TYPE_PRESS, SERVICE_TYPE_TAGGED, TAGGED_DATAGRAM_LEN,
};

/// Builds a capability discovery request (1024 bytes, `"interface"` marker).
pub fn capability_request() -> Vec<u8> {
    let mut buf = vec![0u8; CAPABILITY_DATAGRAM_LEN];
    // the marker always fits
    put_terminated(&mut buf, 0, SERVICE_TYPE_CAPABILITY).unwrap();
    buf
}

/// Builds a capability press request (1024 bytes, `"button"` marker, packed
/// argument at offset 128).
pub fn press_request(button_id: i32) -> Vec<u8> {
    let mut buf = vec![0u8; CAPABILITY_DATAGRAM_LEN];
    put_terminated(&mut buf, 0, SERVICE_TYPE_PRESS).unwrap();
    buf[DATAGRAM_ARG_OFFSET..DATAGRAM_ARG_OFFSET + 4].copy_from_slice(&pack_i32(button_id));
    buf
}

/// Builds a tagged lookup request (256 bytes, `"JavaInterface"` marker, tag
/// at offset 128).
pub fn tagged_request(tag: &str) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = vec![0u8; TAGGED_DATAGRAM_LEN];
    put_terminated(&mut buf, 0, SERVICE_TYPE_TAGGED).unwrap();
    put_terminated(&mut buf, DATAGRAM_ARG_OFFSET, tag)?;
    Ok(buf)
}

/// Parses a capability response: packed count N, then N records of
/// (packed length, name bytes).
pub fn parse_capability_response(data: &[u8]) -> Result<Vec<String>, ProtocolError> {
    if data.len() < 4 {
        return Err(ProtocolError::TruncatedDatagram {
            needed: 4,
            available: data.len(),
        });
    }
    let count = unpack_i32(data[0..4].try_into().unwrap());
    if count < 0 {
        return Err(ProtocolError::NegativeLength(count));
    }
    let mut names = Vec::with_capacity(count as usize);
    let mut offset = 4;
    for _ in 0..count {
        let (name, next) = get_str(data, offset)?;
        names.push(name);
        offset = next;
    }
    Ok(names)
}

/// Parses a tagged lookup response: the service's listening port as ASCII
/// decimal digits, NUL-terminated within the first [`PORT_FIELD_LEN`] bytes.
pub fn parse_tagged_response(data: &[u8]) -> Result<u16, ProtocolError> {
    let field = &data[..data.len().min(PORT_FIELD_LEN)];
    let end = field
        .iter()
        .position(|&b| b == 0)
        .ok_or(ProtocolError::MissingPortTerminator)?;
    let digits =
        std::str::from_utf8(&field[..end]).map_err(|_| ProtocolError::InvalidUtf8)?;
    digits
        .parse::<u16>()
        .map_err(|_| ProtocolError::InvalidPort(digits.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::put_str;

    #[test]
    fn test_capability_request_layout() {
        let buf = capability_request();
        assert_eq!(buf.len(), CAPABILITY_DATAGRAM_LEN);
        assert_eq!(&buf[..10], b"interface\0");
        assert!(buf[10..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_press_request_layout() {
        let buf = press_request(7);
        assert_eq!(buf.len(), CAPABILITY_DATAGRAM_LEN);
        assert_eq!(&buf[..7], b"button\0");
        assert_eq!(&buf[128..132], &[0x07, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_tagged_request_layout() {
        let buf = tagged_request("front-wall").unwrap();
        assert_eq!(buf.len(), TAGGED_DATAGRAM_LEN);
        assert_eq!(&buf[..14], b"JavaInterface\0");
        assert_eq!(&buf[128..139], b"front-wall\0");
    }

    #[test]
    fn test_tagged_request_oversized_tag() {
        let tag = "x".repeat(TAGGED_DATAGRAM_LEN);
        let result = tagged_request(&tag);
        assert!(matches!(result, Err(ProtocolError::FieldOverflow { .. })));
    }

    #[test]
    fn test_parse_capability_response() {
        let mut data = Vec::new();
        data.extend_from_slice(&pack_i32(2));
        put_str(&mut data, "A");
        put_str(&mut data, "BB");
        let names = parse_capability_response(&data).unwrap();
        assert_eq!(names, vec!["A".to_string(), "BB".to_string()]);
    }

    #[test]
    fn test_parse_capability_response_truncated_record() {
        let mut data = Vec::new();
        data.extend_from_slice(&pack_i32(2));
        put_str(&mut data, "A");
        // second record missing
        let result = parse_capability_response(&data);
        assert!(matches!(
            result,
            Err(ProtocolError::TruncatedDatagram { .. })
        ));
    }

    #[test]
    fn test_parse_tagged_response() {
        let mut data = vec![0u8; TAGGED_DATAGRAM_LEN];
        data[..5].copy_from_slice(b"4620\0");
        assert_eq!(parse_tagged_response(&data).unwrap(), 4620);
    }

    #[test]
    fn test_parse_tagged_response_no_terminator() {
        let data = [b'9'; 32];
        let result = parse_tagged_response(&data);
        assert!(matches!(result, Err(ProtocolError::MissingPortTerminator)));
    }

    #[test]
    fn test_parse_tagged_response_non_numeric() {
        let mut data = vec![0u8; 16];
        data[..4].copy_from_slice(b"abc\0");
        let result = parse_tagged_response(&data);
        assert!(matches!(result, Err(ProtocolError::InvalidPort(_))));
    }
}
