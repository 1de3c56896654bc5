//! Relay
//!
//! Pulls a correction stream from a source caster and pushes it to a
//! destination caster:
//!
//! ```text
//! source caster ──GET──▶ [client leg] ──Data──▶ Relay ──send──▶ [server leg] ──POST──▶ destination caster
//! ```
//!
//! The first terminal event from either leg ends the relay; it is reported
//! once, tagged with the leg it came from, and both legs are torn down.
//! A relay runs once. Build a new one to reconnect.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::common::{format_bytes, Address, Error, Result};
use crate::connection::{Connection, Event, Headers};
use crate::protocol::Role;
use crate::transport::Transport;

/// Byte counters for one relay run
#[derive(Debug, Default, Clone, Copy)]
struct Traffic {
    forwarded: u64,
    dropped: u64,
}

pub struct Relay {
    source: Connection,
    destination: Connection,
}

impl Relay {
    pub fn new(
        source: Address,
        source_mountpoint: &str,
        destination: Address,
        destination_mountpoint: &str,
    ) -> Self {
        Self {
            source: Connection::with_mountpoint(source, source_mountpoint, Role::client())
                .with_label("source"),
            destination: Connection::with_mountpoint(destination, destination_mountpoint, Role::server())
                .with_label("destination"),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.source = self.source.with_transport(Arc::clone(&transport));
        self.destination = self.destination.with_transport(transport);
        self
    }

    /// GGA sentence reported to the source caster
    pub fn set_gga(&mut self, sentence: impl Into<String>) {
        self.source.set_gga(sentence);
    }

    pub fn set_source_credentials(&mut self, login: impl Into<String>, password: impl Into<String>) {
        self.source.set_credentials(login, password);
    }

    pub fn set_destination_credentials(&mut self, login: impl Into<String>, password: impl Into<String>) {
        self.destination.set_credentials(login, password);
    }

    /// Run without an idle timeout
    pub async fn run(self) -> Result<()> {
        self.run_with_timeout(Duration::ZERO).await
    }

    /// Run until the source stream ends or either leg fails.
    ///
    /// Source data is forwarded only while the destination is active;
    /// anything arriving before that is dropped. A destination that stops
    /// reading stalls the source leg instead of piling data up in memory.
    pub async fn run_with_timeout(self, timeout: Duration) -> Result<()> {
        info!(
            "Relaying {}{} -> {}{}",
            self.source.address(),
            self.source.uri(),
            self.destination.address(),
            self.destination.uri()
        );

        let (source, mut source_events) = self.source.start_with_timeout(timeout);
        let (destination, mut destination_events) = self.destination.start_with_timeout(timeout);
        let mut traffic = Traffic::default();

        let result = loop {
            tokio::select! {
                Some(event) = source_events.recv() => match event {
                    Event::Headers(headers) => log_headers(&headers),
                    Event::Data(data) => {
                        // The source is not read again until the destination has taken this buffer
                        if destination.is_active() && destination.send(&data).await {
                            traffic.forwarded += data.len() as u64;
                        } else {
                            trace!("Destination not ready, dropping {} bytes", data.len());
                            traffic.dropped += data.len() as u64;
                        }
                    }
                    Event::Eof => {
                        info!("Source stream ended");
                        break Ok(());
                    }
                    Event::Error(e) => break Err(Error::Source(Box::new(e))),
                },
                Some(event) = destination_events.recv() => match event {
                    Event::Headers(_) => info!("Destination accepted the stream"),
                    Event::Data(data) => trace!("Ignoring {} bytes from destination", data.len()),
                    Event::Eof => warn!("Destination closed its side of the stream"),
                    Event::Error(e) => break Err(Error::Destination(Box::new(e))),
                },
                else => break Ok(()),
            }
        };

        // Nothing either leg reports from here on reaches the caller
        drop(source_events);
        drop(destination_events);
        source.stop();
        destination.stop();
        source.join().await;
        destination.join().await;

        info!(
            "Relay closed (forwarded: {}, dropped: {})",
            format_bytes(traffic.forwarded),
            format_bytes(traffic.dropped)
        );
        debug!("Relay result: {:?}", result);
        result
    }
}

fn log_headers(headers: &Headers) {
    let sorted: BTreeMap<_, _> = headers.iter().collect();
    for (name, value) in sorted {
        info!("Source header {}: {}", name, value);
    }
}
