//! NTRIP Protocol Layer
//!
//! Responsibilities:
//! - Basic authentication
//! - Role-specific request construction (client GET, server POST)
//! - Outgoing payload framing
//! - Response status/header/chunk-length parsing
//!
//! Nothing in here performs I/O; the connection engine feeds bytes in and
//! writes what comes out.

mod auth;
pub mod client;
pub mod response;
pub mod server;

pub use auth::Authenticator;
pub use response::StatusLine;

use bytes::Bytes;

/// What a request is addressed to
#[derive(Debug, Clone, Copy)]
pub struct RequestTarget<'a> {
    /// Request URI, always starting with `/`
    pub uri: &'a str,
    /// Caster host name sent in the `Host` header
    pub host: &'a str,
    pub auth: &'a Authenticator,
}

/// Role a connection plays towards its caster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Pulls a correction stream (`GET`), optionally reporting a GGA position
    Client { gga: Option<String> },
    /// Pushes a correction stream (`POST`, chunked)
    Server,
}

impl Role {
    pub fn client() -> Self {
        Role::Client { gga: None }
    }

    pub fn server() -> Self {
        Role::Server
    }

    /// Attach a GGA sentence. Has no effect on a server role.
    pub fn set_gga(&mut self, sentence: impl Into<String>) {
        if let Role::Client { gga } = self {
            *gga = Some(sentence.into());
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Role::Client { .. } => "client",
            Role::Server => "server",
        }
    }

    /// Build the complete request for this role
    pub fn build_request(&self, target: &RequestTarget<'_>) -> String {
        match self {
            Role::Client { gga } => client::build_request(target, gga.as_deref()),
            Role::Server => server::build_request(target),
        }
    }

    /// Frame an outgoing payload for the wire
    pub fn frame(&self, payload: &[u8]) -> Bytes {
        match self {
            Role::Client { .. } => Bytes::copy_from_slice(payload),
            Role::Server => server::frame_chunk(payload),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Request line plus the headers shared by both roles
fn write_preamble(method: &str, target: &RequestTarget<'_>, user_agent: &str) -> String {
    let mut request = format!("{} {} HTTP/1.1\r\n", method, target.uri);
    request.push_str(&format!("Host: {}\r\n", target.host));
    request.push_str("Ntrip-Version: Ntrip/2.0\r\n");
    request.push_str(&format!("User-Agent: {}\r\n", user_agent));

    if let Some(authorization) = target.auth.authorization() {
        request.push_str(&format!("Authorization: {}\r\n", authorization));
    }

    request
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_dispatch() {
        let auth = Authenticator::default();
        let target = RequestTarget { uri: "/M", host: "h", auth: &auth };

        assert!(Role::client().build_request(&target).starts_with("GET /M HTTP/1.1\r\n"));
        assert!(Role::server().build_request(&target).starts_with("POST /M HTTP/1.1\r\n"));
    }

    #[test]
    fn test_gga_only_for_client() {
        let mut role = Role::client();
        role.set_gga("$GPGGA");
        assert_eq!(role, Role::Client { gga: Some("$GPGGA".into()) });

        let mut role = Role::server();
        role.set_gga("$GPGGA");
        assert_eq!(role, Role::Server);
    }

    #[test]
    fn test_framing_by_role() {
        assert_eq!(&Role::client().frame(b"$GPGGA\r\n")[..], b"$GPGGA\r\n");
        assert_eq!(&Role::server().frame(b"xyz")[..], b"3\r\nxyz\r\n");
    }
}
