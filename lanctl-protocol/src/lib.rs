//! # lanctl-protocol
//!
//! Wire protocol for the lanctl remote-control clients.
//!
//! This crate provides:
//! - Fixed-width little-endian integer and string packing
//! - Inbound stream framing (opcode, length, payload) and outbound command
//!   encoding
//! - Discovery datagram builders and reply parsers
//! - The status-text tokenizer that rebuilds the host/process catalog

pub mod catalog;
pub mod datagram;
pub mod error;
pub mod frame;
pub mod wire;

pub use catalog::{Catalog, HostEntry, ProcessEntry};
pub use error::ProtocolError;
pub use frame::{Command, Frame, FRAME_HEADER_SIZE};

/// UDP port the service listens on for discovery datagrams.
pub const DISCOVERY_PORT: u16 = 4622;

/// Local UDP port discovery replies arrive on.
pub const DISCOVERY_REPLY_PORT: u16 = 4623;

/// Size of a capability request/press datagram.
pub const CAPABILITY_DATAGRAM_LEN: usize = 1024;

/// Size of a tagged lookup datagram.
pub const TAGGED_DATAGRAM_LEN: usize = 256;

/// Offset of the tag string (tagged lookup) or packed argument (press)
/// within a discovery datagram.
pub const DATAGRAM_ARG_OFFSET: usize = 128;

/// A tagged-lookup reply carries an ASCII decimal port NUL-terminated
/// within this many leading bytes.
pub const PORT_FIELD_LEN: usize = 16;

/// Service-type marker for capability discovery requests.
pub const SERVICE_TYPE_CAPABILITY: &str = "interface";

/// Service-type marker for capability press requests.
pub const SERVICE_TYPE_PRESS: &str = "button";

/// Service-type marker for tagged lookup requests.
pub const SERVICE_TYPE_TAGGED: &str = "JavaInterface";

/// Maximum inbound frame payload. Matches the legacy read buffer.
pub const MAX_FRAME_PAYLOAD: usize = 10_000;

/// Maximum encoded length of an exec target string ("host/process").
pub const MAX_EXEC_TARGET_LEN: usize = 512;

/// Catalog capacity: host rows retained per status frame.
pub const MAX_HOSTS: usize = 30;

/// Catalog capacity: processes retained per host row.
pub const MAX_PROCESSES_PER_HOST: usize = 30;
