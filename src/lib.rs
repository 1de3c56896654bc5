//! ntrip-relay - NTRIP connection engine and caster-to-caster relay
//!
//! # Architecture
//!
//! ```text
//! Transport (TCP resolve/connect)
//! → Connection engine (request, status, headers, raw/chunked body, idle watchdog)
//! → Relay (source client leg → destination server leg)
//! ```
//!
//! ## Core Principles
//!
//! - The protocol layer builds and parses bytes, it never touches a socket
//! - Each connection is one task; callers see a handle and an event stream
//! - Transports are abstracted via a trait so tests run over in-memory pipes
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── common/          # Core types: Stream, Address
//! ├── transport/       # Transport layer: TCP
//! ├── protocol/        # NTRIP requests, auth, response parsing
//! ├── connection/      # Connection engine: handle, events, watchdog
//! └── relay.rs         # Source → destination relay
//! ```

// Core types
pub mod common;
pub mod error;

// Layered architecture
pub mod transport;
pub mod protocol;
pub mod connection;
pub mod relay;

// Supporting modules
pub mod config;
pub mod pidfile;

#[cfg(test)]
mod test_util;

// Re-exports for convenience
pub use common::{Address, Stream};
pub use config::Config;
pub use error::{Error, Result};

pub use connection::{Connection, ConnectionHandle, Event, Headers};
pub use protocol::{Authenticator, Role};
pub use relay::Relay;
pub use transport::{TcpTransport, Transport};
