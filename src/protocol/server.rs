//! NTRIP server request and chunk framing (destination caster side)

use bytes::{BufMut, Bytes, BytesMut};

use super::{write_preamble, RequestTarget};

const USER_AGENT: &str = concat!("NTRIP Relay Server ", env!("CARGO_PKG_VERSION"));

/// Build the POST request that opens an upload to a mountpoint.
/// The body is always chunk framed.
pub fn build_request(target: &RequestTarget<'_>) -> String {
    let mut request = write_preamble("POST", target, USER_AGENT);
    request.push_str("Connection: close\r\n");
    request.push_str("Transfer-Encoding: chunked\r\n");
    request.push_str("\r\n");
    request
}

/// Wrap a payload as a single HTTP chunk: `<hex len>\r\n<payload>\r\n`.
pub fn frame_chunk(payload: &[u8]) -> Bytes {
    let length = format!("{:x}\r\n", payload.len());
    let mut chunk = BytesMut::with_capacity(length.len() + payload.len() + 2);
    chunk.put_slice(length.as_bytes());
    chunk.put_slice(payload);
    chunk.put_slice(b"\r\n");
    chunk.freeze()
}
