//! Test helpers: an in-memory transport and wire utilities

use std::collections::{HashMap, HashSet};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::sync::mpsc;

use crate::common::{Address, IntoStream, Result, Stream};
use crate::connection::Event;
use crate::transport::Transport;

const PIPE_CAPACITY: usize = 64 * 1024;

/// Upper bound on waiting for a single event
const EVENT_WAIT: Duration = Duration::from_secs(30);

enum Peer {
    Accept(DuplexStream),
    Refuse,
}

/// Transport backed by `tokio::io::duplex` pipes.
///
/// Unknown hosts resolve to no endpoints; endpoints without a registered peer
/// refuse the connection.
#[derive(Default)]
pub struct MockTransport {
    hosts: Mutex<HashMap<String, Vec<SocketAddr>>>,
    broken_hosts: Mutex<HashSet<String>>,
    peers: Mutex<HashMap<SocketAddr, Peer>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve_to(&self, host: &str, endpoints: &[SocketAddr]) {
        self.hosts.lock().insert(host.to_string(), endpoints.to_vec());
    }

    /// Make the resolver itself fail for `host`
    pub fn fail_resolve(&self, host: &str) {
        self.broken_hosts.lock().insert(host.to_string());
    }

    pub fn refuse(&self, endpoint: SocketAddr) {
        self.peers.lock().insert(endpoint, Peer::Refuse);
    }

    /// Accept the next connection to `endpoint`; returns the caster side
    pub fn accept(&self, endpoint: SocketAddr) -> DuplexStream {
        let (local, remote) = tokio::io::duplex(PIPE_CAPACITY);
        self.peers.lock().insert(endpoint, Peer::Accept(local));
        remote
    }

    /// Single-endpoint caster reachable as `host`
    pub fn caster(&self, host: &str, endpoint: SocketAddr) -> DuplexStream {
        self.resolve_to(host, &[endpoint]);
        self.accept(endpoint)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn resolve(&self, addr: &Address) -> Result<Vec<SocketAddr>> {
        if self.broken_hosts.lock().contains(&addr.host()) {
            return Err(io::Error::new(io::ErrorKind::Other, "resolver unavailable").into());
        }
        let endpoints = self.hosts.lock().get(&addr.host()).cloned();
        Ok(endpoints.unwrap_or_default())
    }

    async fn connect(&self, addr: SocketAddr) -> Result<Stream> {
        let peer = self.peers.lock().remove(&addr);
        match peer {
            Some(Peer::Accept(stream)) => Ok(stream.into_stream()),
            _ => Err(io::Error::new(io::ErrorKind::ConnectionRefused, format!("{} refused", addr)).into()),
        }
    }
}

pub fn endpoint(n: u8) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, n], 2101))
}

/// Read one request head, blank line included
pub async fn read_head(peer: &mut DuplexStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        peer.read_exact(&mut byte).await.expect("request head");
        head.push(byte[0]);
    }
    String::from_utf8(head).expect("utf-8 request head")
}

/// Next event; panics if none arrives in time
pub async fn next_event(events: &mut mpsc::Receiver<Event>) -> Option<Event> {
    tokio::time::timeout(EVENT_WAIT, events.recv())
        .await
        .expect("timed out waiting for an event")
}

/// Collect data events up to the next non-data event
pub async fn drain(events: &mut mpsc::Receiver<Event>) -> (Vec<Bytes>, Option<Event>) {
    let mut data = Vec::new();
    loop {
        match next_event(events).await {
            Some(Event::Data(bytes)) => data.push(bytes),
            other => return (data, other),
        }
    }
}
