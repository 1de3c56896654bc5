//! TCP Transport implementation

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::{lookup_host, TcpStream};

use crate::common::{Address, IntoStream, Result, Stream};

use super::Transport;

/// TCP transport - system resolver and raw TCP connections
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn resolve(&self, addr: &Address) -> Result<Vec<SocketAddr>> {
        match addr {
            Address::Socket(socket_addr) => Ok(vec![*socket_addr]),
            Address::Domain(domain, port) => {
                let resolved = lookup_host((domain.as_str(), *port)).await?;
                Ok(resolved.collect())
            }
        }
    }

    async fn connect(&self, addr: SocketAddr) -> Result<Stream> {
        let stream = TcpStream::connect(addr).await?;

        // Corrections are small and latency sensitive
        stream.set_nodelay(true)?;

        Ok(stream.into_stream())
    }
}
