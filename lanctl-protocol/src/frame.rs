//! Stream framing for the persistent connection.
//!
//! Inbound frame layout (8-byte header + payload):
//!
//! ```text
//! +---------+---------+------------------+
//! | opcode  | length  | payload          |
//! | 4 bytes | 4 bytes | length bytes     |
//! +---------+---------+------------------+
//! ```
//!
//! Both header fields are packed little-endian. Outbound commands do not use
//! this layout: they are an opcode followed directly by their payload bytes,
//! with no implicit length header (the exec command embeds its own packed
//! length). This matches the legacy writers byte for byte.

use crate::error::ProtocolError;
use crate::wire::{pack_i32, unpack_i32};
use crate::{MAX_EXEC_TARGET_LEN, MAX_FRAME_PAYLOAD};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the inbound frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 8;

/// An inbound frame read off the persistent stream.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame opcode as sent by the service.
    pub opcode: i32,
    /// Frame payload; status frames carry catalog text, handshakes are empty.
    pub payload: Bytes,
}

impl Frame {
    /// Returns true for a zero-length frame, which completes a pending
    /// handshake rather than carrying a status update.
    pub fn is_handshake(&self) -> bool {
        self.payload.is_empty()
    }

    /// Decodes a frame from the front of `buf`.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was consumed,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        // Peek at the header without consuming
        let opcode = unpack_i32(buf[0..4].try_into().unwrap());
        let length = unpack_i32(buf[4..8].try_into().unwrap());
        if length < 0 {
            return Err(ProtocolError::NegativeLength(length));
        }
        let length = length as usize;
        if length > MAX_FRAME_PAYLOAD {
            return Err(ProtocolError::FrameTooLarge {
                size: length,
                max: MAX_FRAME_PAYLOAD,
            });
        }

        if buf.len() < FRAME_HEADER_SIZE + length {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(length).freeze();

        Ok(Some(Self { opcode, payload }))
    }

    /// Encodes a frame in the inbound layout. Used by test peers standing in
    /// for the service.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        buf.put_slice(&pack_i32(self.opcode));
        buf.put_slice(&pack_i32(self.payload.len() as i32));
        buf.put_slice(&self.payload);
        buf
    }
}

/// An outbound command for the persistent stream.
///
/// Opcodes 1 and 4 both request a listing; the legacy comments label both
/// "request the process list" and the distinction is preserved as observed,
/// not collapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Opcode 1: request the process list.
    ProcessList,
    /// Opcode 3: kill the process with the given id.
    Kill { pid: i32 },
    /// Opcode 4: request the exec-target list.
    ExecTargetList,
    /// Opcode 6: execute `process` on `host`.
    Exec { host: String, process: String },
}

impl Command {
    /// Returns the wire opcode for this command.
    pub fn opcode(&self) -> i32 {
        match self {
            Command::ProcessList => 1,
            Command::Kill { .. } => 3,
            Command::ExecTargetList => 4,
            Command::Exec { .. } => 6,
        }
    }

    /// Returns true if the service answers this command with a handshake
    /// frame once its side effect has run.
    pub fn expects_handshake(&self) -> bool {
        matches!(self, Command::Exec { .. })
    }

    /// Encodes the command into its exact legacy wire bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::with_capacity(16);
        buf.put_slice(&pack_i32(self.opcode()));
        match self {
            Command::ProcessList | Command::ExecTargetList => {}
            Command::Kill { pid } => {
                buf.put_slice(&pack_i32(*pid));
            }
            Command::Exec { host, process } => {
                let target = format!("{}/{}", host, process);
                if target.len() > MAX_EXEC_TARGET_LEN {
                    return Err(ProtocolError::ExecTargetTooLong {
                        size: target.len(),
                        max: MAX_EXEC_TARGET_LEN,
                    });
                }
                buf.put_slice(&pack_i32(target.len() as i32));
                buf.put_slice(target.as_bytes());
            }
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let frame = Frame {
            opcode: 2,
            payload: Bytes::from_static(b"h1/p1/10:"),
        };
        let mut buf = frame.encode();
        let decoded = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.opcode, 2);
        assert_eq!(decoded.payload.as_ref(), b"h1/p1/10:");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_incomplete_header() {
        let mut buf = BytesMut::from(&b"\x01\x00\x00"[..]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());
        // nothing consumed
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_incomplete_payload() {
        let frame = Frame {
            opcode: 2,
            payload: Bytes::from_static(b"abcdef"),
        };
        let encoded = frame.encode();
        let mut buf = BytesMut::from(&encoded[..encoded.len() - 2]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_frame_too_large() {
        let mut buf = BytesMut::new();
        buf.put_slice(&pack_i32(2));
        buf.put_slice(&pack_i32((MAX_FRAME_PAYLOAD + 1) as i32));
        let result = Frame::decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_negative_length() {
        let mut buf = BytesMut::new();
        buf.put_slice(&pack_i32(2));
        buf.put_slice(&pack_i32(-5));
        let result = Frame::decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::NegativeLength(-5))));
    }

    #[test]
    fn test_multiple_frames_in_buffer() {
        let f1 = Frame {
            opcode: 2,
            payload: Bytes::from_static(b"first"),
        };
        let f2 = Frame {
            opcode: 2,
            payload: Bytes::from_static(b"second"),
        };
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&f1.encode());
        buf.extend_from_slice(&f2.encode());

        let d1 = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(d1.payload.as_ref(), b"first");
        let d2 = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(d2.payload.as_ref(), b"second");
        assert!(Frame::decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_handshake_frame() {
        let frame = Frame {
            opcode: 0,
            payload: Bytes::new(),
        };
        assert!(frame.is_handshake());
        let mut buf = frame.encode();
        assert!(Frame::decode(&mut buf).unwrap().unwrap().is_handshake());
    }

    #[test]
    fn test_process_list_encoding() {
        let encoded = Command::ProcessList.encode().unwrap();
        assert_eq!(encoded.as_ref(), &[0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_exec_target_list_encoding() {
        let encoded = Command::ExecTargetList.encode().unwrap();
        assert_eq!(encoded.as_ref(), &[0x04, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_kill_encoding() {
        // opcode 3 followed by the packed pid, no length header
        let encoded = Command::Kill { pid: 0x0102 }.encode().unwrap();
        assert_eq!(
            encoded.as_ref(),
            &[0x03, 0x00, 0x00, 0x00, 0x02, 0x01, 0x00, 0x00]
        );
    }

    #[test]
    fn test_exec_encoding() {
        let cmd = Command::Exec {
            host: "h1".to_string(),
            process: "demo".to_string(),
        };
        let encoded = cmd.encode().unwrap();
        let mut expected = vec![0x06, 0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00];
        expected.extend_from_slice(b"h1/demo");
        assert_eq!(encoded.as_ref(), &expected[..]);
    }

    #[test]
    fn test_exec_target_too_long() {
        let cmd = Command::Exec {
            host: "h".repeat(300),
            process: "p".repeat(300),
        };
        let result = cmd.encode();
        assert!(matches!(
            result,
            Err(ProtocolError::ExecTargetTooLong { .. })
        ));
    }

    #[test]
    fn test_distinct_listing_opcodes() {
        assert_eq!(Command::ProcessList.opcode(), 1);
        assert_eq!(Command::ExecTargetList.opcode(), 4);
    }

    #[test]
    fn test_only_exec_expects_handshake() {
        assert!(Command::Exec {
            host: "h".into(),
            process: "p".into()
        }
        .expects_handshake());
        assert!(!Command::ProcessList.expects_handshake());
        assert!(!Command::Kill { pid: 1 }.expects_handshake());
        assert!(!Command::ExecTargetList.expects_handshake());
    }
}
