//! Connection Engine
//!
//! One engine drives one caster connection through its whole life:
//!
//! ```text
//! resolve → connect (failover over every resolved endpoint) → request
//!         → status line → headers → body (raw or chunked) → shutdown
//! ```
//!
//! Each engine runs as a single tokio task, so its steps never overlap and at
//! most one socket read is in flight. Callers drive it through a
//! [`ConnectionHandle`] and learn about progress from a stream of [`Event`]s.
//! At most one terminal event (`Eof` or `Error`) is ever reported, and none
//! after [`ConnectionHandle::stop`].

mod reader;
mod watchdog;

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use crate::common::{Address, Error, Result, Stream};
use crate::protocol::{response, Authenticator, RequestTarget, Role, StatusLine};
use crate::transport::{TcpTransport, Transport};

use reader::ReadBuffer;
use watchdog::IdleTimer;

/// Default inbound buffer size. Also bounds the length of a status or header line.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

const MIN_READ_BUFFER_SIZE: usize = 16;

/// Events in flight between an engine and its consumer
const EVENT_QUEUE_DEPTH: usize = 1;

/// Framed payloads waiting for the socket, on top of the one being written
const OUTGOING_QUEUE_DEPTH: usize = 1;

/// Response headers, first occurrence of a name wins
pub type Headers = HashMap<String, String>;

/// Progress reported by a running connection
#[derive(Debug)]
pub enum Event {
    /// Header block received. Never sent for `ICY` responses.
    Headers(Headers),
    /// Body bytes. Chunk boundaries are not preserved.
    Data(Bytes),
    /// Peer closed the stream or sent the terminal chunk
    Eof,
    /// The connection failed and has been shut down
    Error(Error),
}

/// A caster connection waiting to be started
pub struct Connection {
    address: Address,
    uri: String,
    role: Role,
    auth: Authenticator,
    timeout: Duration,
    label: String,
    read_buffer_size: usize,
    transport: Arc<dyn Transport>,
}

impl Connection {
    /// Connection to the caster root `/`
    pub fn new(address: Address, role: Role) -> Self {
        Self::with_mountpoint(address, "/", role)
    }

    /// Connection to a mountpoint. A missing leading `/` is added.
    pub fn with_mountpoint(address: Address, mountpoint: &str, role: Role) -> Self {
        let uri = if mountpoint.starts_with('/') {
            mountpoint.to_string()
        } else {
            format!("/{}", mountpoint)
        };

        Self {
            label: role.name().to_string(),
            address,
            uri,
            role,
            auth: Authenticator::default(),
            timeout: Duration::ZERO,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            transport: Arc::new(TcpTransport::new()),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Prefix used in this connection's log lines
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(MIN_READ_BUFFER_SIZE);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable Basic authentication
    pub fn set_credentials(&mut self, login: impl Into<String>, password: impl Into<String>) {
        self.auth = Authenticator::new(login, password);
    }

    /// GGA sentence reported to the caster. Ignored for the server role.
    pub fn set_gga(&mut self, sentence: impl Into<String>) {
        self.role.set_gga(sentence);
    }

    /// Idle timeout; zero disables it
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Start with the configured idle timeout
    pub fn start(self) -> (ConnectionHandle, mpsc::Receiver<Event>) {
        let timeout = self.timeout;
        self.start_with_timeout(timeout)
    }

    /// Spawn the engine. Must be called from within a tokio runtime.
    pub fn start_with_timeout(mut self, timeout: Duration) -> (ConnectionHandle, mpsc::Receiver<Event>) {
        self.timeout = timeout;

        let shared = Arc::new(Shared::new(timeout));
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_QUEUE_DEPTH);
        let role = self.role.clone();

        debug!("[{}] Starting {} connection to {}{}", self.label, role, self.address, self.uri);

        let driver = Driver {
            input: ReadBuffer::new(self.read_buffer_size),
            conn: self,
            shared: Arc::clone(&shared),
            events: events_tx,
            outgoing: outgoing_rx,
            streaming: false,
        };
        let task = tokio::spawn(driver.run());

        let handle = ConnectionHandle {
            shared,
            role,
            outgoing: outgoing_tx,
            task: Some(task),
        };
        (handle, events_rx)
    }
}

/// Control side of a running connection. Dropping it stops the connection.
pub struct ConnectionHandle {
    shared: Arc<Shared>,
    role: Role,
    outgoing: mpsc::Sender<Bytes>,
    task: Option<JoinHandle<()>>,
}

impl ConnectionHandle {
    /// True between a successful handshake and shutdown
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Headers of the last response (empty before the handshake and for `ICY`)
    pub fn headers(&self) -> Headers {
        self.shared.headers.lock().clone()
    }

    /// Hand a payload to the engine.
    ///
    /// Payloads go out in call order, each as one write; the server role
    /// frames each one as a chunk. Empty payloads are ignored. Waits while
    /// the previous payload is still queued, so a caster that stops reading
    /// holds the caller back. Payloads handed over before the handshake
    /// completes are written once streaming starts.
    ///
    /// Returns `false` once the engine has shut down.
    pub async fn send(&self, payload: &[u8]) -> bool {
        if payload.is_empty() {
            return !self.outgoing.is_closed();
        }

        self.outgoing.send(self.role.frame(payload)).await.is_ok()
    }

    /// Stop the connection. Idempotent; no event is reported afterwards.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Wait for the engine task to finish, socket shutdown included
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

/// State shared between a handle and its engine
struct Shared {
    active: AtomicBool,
    stopped: AtomicBool,
    stop_signal: Notify,
    headers: Mutex<Headers>,
    idle: IdleTimer,
}

impl Shared {
    fn new(timeout: Duration) -> Self {
        Self {
            active: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            stop_signal: Notify::new(),
            headers: Mutex::new(Headers::new()),
            idle: IdleTimer::new(timeout),
        }
    }

    fn stop(&self) {
        let already = self.stopped.swap(true, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
        if !already {
            self.stop_signal.notify_one();
        }
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Mark the connection active unless a stop got in first
    fn activate(&self) {
        self.active.store(true, Ordering::SeqCst);
        if self.is_stopped() {
            self.active.store(false, Ordering::SeqCst);
        }
    }

    async fn stopped(&self) {
        while !self.is_stopped() {
            self.stop_signal.notified().await;
        }
    }
}

/// How an exchange ended
enum Outcome {
    Eof,
    Failed(Error),
    /// The event receiver was dropped
    Detached,
    Stopped,
}

/// The engine task
struct Driver {
    conn: Connection,
    shared: Arc<Shared>,
    input: ReadBuffer,
    events: mpsc::Sender<Event>,
    outgoing: mpsc::Receiver<Bytes>,
    /// Outgoing payloads are written only once the body is flowing
    streaming: bool,
}

impl Driver {
    async fn run(mut self) {
        let shared = Arc::clone(&self.shared);
        let mut socket: Option<Stream> = None;

        let outcome = tokio::select! {
            biased;
            _ = shared.stopped() => Outcome::Stopped,
            _ = shared.idle.expired() => Outcome::Failed(Error::ConnectionTimeout),
            outcome = self.exchange(&mut socket) => outcome,
        };

        shared.active.store(false, Ordering::SeqCst);
        // Release senders waiting on a queue nobody drains any more
        self.outgoing.close();
        let label = &self.conn.label;

        match outcome {
            Outcome::Eof if !shared.is_stopped() => {
                debug!("[{}] End of stream", label);
                let _ = self.events.send(Event::Eof).await;
            }
            Outcome::Failed(e) if !shared.is_stopped() => {
                match &e {
                    Error::ConnectionTimeout => info!("[{}] Connection timeout detected, shutting it down", label),
                    _ => debug!("[{}] Connection failed: {}", label, e),
                }
                let _ = self.events.send(Event::Error(e)).await;
            }
            Outcome::Detached => debug!("[{}] Event receiver dropped", label),
            _ => debug!("[{}] Stopped", label),
        }

        if let Some(mut stream) = socket.take() {
            // The peer may already be gone
            let _ = stream.shutdown().await;
        }
        debug!("[{}] Connection closed", label);
    }

    async fn exchange(&mut self, socket: &mut Option<Stream>) -> Outcome {
        match self.session(socket).await {
            Ok(outcome) => outcome,
            Err(e) => Outcome::Failed(e),
        }
    }

    async fn session(&mut self, socket: &mut Option<Stream>) -> Result<Outcome> {
        let stream = socket.insert(self.connect().await?);

        self.send_request(stream).await?;

        let status = self.read_status(stream).await?;
        if status.is_legacy() {
            debug!("[{}] Legacy {} response, no headers", self.conn.label, status.protocol);
            self.shared.activate();
            return self.stream_raw(stream).await;
        }

        let (headers, chunked) = self.read_headers(stream).await?;
        *self.shared.headers.lock() = headers.clone();
        if !self.emit(Event::Headers(headers)).await {
            return Ok(Outcome::Detached);
        }

        self.shared.activate();
        if chunked {
            self.stream_chunked(stream).await
        } else {
            self.stream_raw(stream).await
        }
    }

    // ========================================================================
    // Handshake
    // ========================================================================

    async fn connect(&self) -> Result<Stream> {
        let label = &self.conn.label;
        let address = &self.conn.address;

        let endpoints = self
            .conn
            .transport
            .resolve(address)
            .await
            .map_err(|e| Error::Resolve(format!("{}: {}", address, e)))?;
        if endpoints.is_empty() {
            return Err(Error::Resolve(address.to_string()));
        }
        self.shared.idle.touch();
        debug!("[{}] Resolved {} to {:?}", label, address, endpoints);

        let mut last_error = None;
        for endpoint in endpoints {
            debug!("[{}] Trying to connect to {}", label, endpoint);
            match self.conn.transport.connect(endpoint).await {
                Ok(stream) => {
                    self.shared.idle.touch();
                    debug!("[{}] Connected to {}", label, endpoint);
                    return Ok(stream);
                }
                Err(e) => {
                    self.shared.idle.touch();
                    debug!("[{}] Error connecting to {}: {}", label, endpoint, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Resolve(address.to_string())))
    }

    async fn send_request(&self, stream: &mut Stream) -> Result<()> {
        let host = self.conn.address.host();
        let target = RequestTarget {
            uri: &self.conn.uri,
            host: &host,
            auth: &self.conn.auth,
        };
        let request = self.conn.role.build_request(&target);
        trace!("[{}] Request:\n{}", self.conn.label, request);

        stream.write_all(request.as_bytes()).await?;
        stream.flush().await?;
        self.shared.idle.touch();
        Ok(())
    }

    async fn read_status(&mut self, stream: &mut Stream) -> Result<StatusLine> {
        let line = self
            .next_line(stream)
            .await?
            .ok_or_else(|| closed_while("reading the status line"))?;
        let text = String::from_utf8_lossy(&line);
        let text = text.trim_end();

        let status = response::parse_status_line(text);
        if !status.is_ok() {
            error!("[{}] Invalid status string: {}", self.conn.label, text);
            return Err(Error::InvalidStatus(text.to_string()));
        }

        debug!("[{}] Status: {}", self.conn.label, status);
        Ok(status)
    }

    /// Read the header block; also reports whether the body is chunked
    async fn read_headers(&mut self, stream: &mut Stream) -> Result<(Headers, bool)> {
        let mut headers = Headers::new();
        let mut chunked = false;

        loop {
            let line = self
                .next_line(stream)
                .await?
                .ok_or_else(|| closed_while("reading headers"))?;

            // Drop the LF only; the CR takes part in the value trim
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            if text == "\r" {
                break;
            }

            let (name, value) = response::parse_header_line(&text);
            trace!("[{}] Header {}: {}", self.conn.label, name, value);
            if response::is_chunked_encoding(&name, &value) {
                chunked = true;
            }
            headers.entry(name).or_insert(value);
        }

        debug!("[{}] {} headers, chunked: {}", self.conn.label, headers.len(), chunked);
        Ok((headers, chunked))
    }

    // ========================================================================
    // Body
    // ========================================================================

    async fn stream_raw(&mut self, stream: &mut Stream) -> Result<Outcome> {
        self.streaming = true;

        loop {
            if !self.input.is_empty() {
                let data = self.input.take_all();
                if !self.emit(Event::Data(data)).await {
                    return Ok(Outcome::Detached);
                }
            }

            if self.read(stream).await? == 0 {
                return Ok(Outcome::Eof);
            }
        }
    }

    async fn stream_chunked(&mut self, stream: &mut Stream) -> Result<Outcome> {
        self.streaming = true;

        loop {
            let line = match self.next_line(stream).await? {
                Some(line) => line,
                None => return Ok(Outcome::Eof),
            };

            let length = response::parse_chunk_length(&line)?;
            if length == 0 {
                debug!("[{}] Terminal chunk received", self.conn.label);
                return Ok(Outcome::Eof);
            }
            trace!("[{}] Chunk of {} bytes", self.conn.label, length);

            let mut remaining = length;
            loop {
                let open = self.fill(stream, remaining.saturating_add(2)).await?;
                let buffered = self.input.len();

                if remaining > buffered {
                    // Larger than the buffer, or cut short: pass on what we have
                    if buffered > 0 {
                        let data = self.input.take_all();
                        if !self.emit(Event::Data(data)).await {
                            return Ok(Outcome::Detached);
                        }
                    }
                    remaining -= buffered;
                    if !open {
                        return Ok(Outcome::Eof);
                    }
                    continue;
                }

                let data = self.input.take(remaining);
                if !self.emit(Event::Data(data)).await {
                    return Ok(Outcome::Detached);
                }
                break;
            }

            // Chunk terminator
            if !self.fill(stream, 2).await? {
                return Ok(Outcome::Eof);
            }
            self.input.consume(2);
        }
    }

    // ========================================================================
    // I/O helpers
    // ========================================================================

    /// Next CRLF-terminated line; `None` if the peer closed first
    async fn next_line(&mut self, stream: &mut Stream) -> Result<Option<BytesMut>> {
        loop {
            if let Some(line) = self.input.take_line() {
                return Ok(Some(line));
            }
            if self.input.is_full() {
                return Err(Error::Protocol(format!(
                    "line longer than the {} byte read buffer",
                    self.input.limit()
                )));
            }
            if self.read(stream).await? == 0 {
                return Ok(None);
            }
        }
    }

    /// Read until `target` bytes are buffered or the buffer is full.
    /// Returns `false` on EOF.
    async fn fill(&mut self, stream: &mut Stream, target: usize) -> Result<bool> {
        while self.input.len() < target && !self.input.is_full() {
            if self.read(stream).await? == 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// One read from the socket. While streaming, queued payloads are
    /// written out as they arrive. Returns 0 on EOF.
    async fn read(&mut self, stream: &mut Stream) -> Result<usize> {
        if !self.streaming {
            let n = self.input.read_more(stream).await?;
            self.shared.idle.touch();
            return Ok(n);
        }

        loop {
            tokio::select! {
                read = self.input.read_more(stream) => {
                    let n = read?;
                    self.shared.idle.touch();
                    return Ok(n);
                }
                Some(payload) = self.outgoing.recv() => {
                    stream.write_all(&payload).await?;
                    self.shared.idle.touch();
                    trace!("[{}] Sent {} bytes", self.conn.label, payload.len());
                }
            }
        }
    }

    /// Hand an event to the consumer; `false` once nobody is listening
    async fn emit(&self, event: Event) -> bool {
        self.events.send(event).await.is_ok()
    }
}

fn closed_while(step: &str) -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("connection closed while {}", step),
    ))
}
