//! NTRIP client request (source caster side)

use super::{write_preamble, RequestTarget};

const USER_AGENT: &str = concat!("NTRIP Relay Client ", env!("CARGO_PKG_VERSION"));

/// Build the GET request for a mountpoint.
///
/// When a GGA sentence is given it is sent both as the `Ntrip-GGA` header
/// (NTRIP 2.0) and as a raw line after the header block, which is where
/// NTRIP 1.0 casters expect it.
pub fn build_request(target: &RequestTarget<'_>, gga: Option<&str>) -> String {
    let mut request = write_preamble("GET", target, USER_AGENT);

    if let Some(gga) = gga {
        request.push_str(&format!("Ntrip-GGA: {}\r\n", gga));
    }

    request.push_str("Connection: close\r\n");
    request.push_str("\r\n");

    if let Some(gga) = gga {
        request.push_str(&format!("{}\r\n", gga));
    }

    request
}
