//! Transport Layer
//!
//! Responsibilities:
//! - Resolve a caster address into socket addresses
//! - Establish raw byte connections to one of them
//! - NO protocol parsing, NO framing
//!
//! The connection engine drives failover across the resolved list itself,
//! so a transport only ever connects to one socket address at a time.

mod tcp;

pub use tcp::TcpTransport;

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::common::{Address, Result, Stream};

/// Transport trait for resolving and establishing raw connections
#[async_trait]
pub trait Transport: Send + Sync {
    /// Resolve an address into the endpoints to try, in order.
    ///
    /// An empty list is a valid answer; the caller treats it as a
    /// resolution failure.
    async fn resolve(&self, addr: &Address) -> Result<Vec<SocketAddr>>;

    /// Connect to a single endpoint
    async fn connect(&self, addr: SocketAddr) -> Result<Stream>;
}
