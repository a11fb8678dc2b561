//! # lanctl-client
//!
//! Client library for lanctl.
//!
//! This crate provides:
//! - UDP broadcast discovery (capability discovery, tagged lookup,
//!   capability press)
//! - A persistent service session with a background read loop that rebuilds
//!   the host/process catalog and publishes immutable snapshots
//! - Synchronous command dispatch behind a single-permit gate for commands
//!   whose side effect completes via a handshake frame

pub mod discovery;
pub mod error;
pub mod gate;
pub mod session;

pub use discovery::{subnet_broadcast, DiscoveryClient, DiscoveryConfig, ServiceDescriptor};
pub use error::{DiscoveryError, SessionError};
pub use gate::{DispatchGate, GateState};
pub use session::{ServiceSession, SessionConfig, SessionEvent};
