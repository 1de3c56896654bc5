//! Bounded inbound buffer

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Inbound bytes waiting to be parsed or delivered.
///
/// The buffer never grows past its limit: reads only fill the free space,
/// and a line longer than the limit can never be completed.
pub(crate) struct ReadBuffer {
    buf: BytesMut,
    limit: usize,
}

impl ReadBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(limit),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() >= self.limit
    }

    /// Read whatever is available into the free space. `Ok(0)` means EOF,
    /// so callers check [`is_full`](Self::is_full) first.
    ///
    /// Cancel safe: if the future is dropped before completion nothing has
    /// been read.
    pub async fn read_more<S>(&mut self, stream: &mut S) -> io::Result<usize>
    where
        S: AsyncRead + Unpin,
    {
        let room = self.limit.saturating_sub(self.buf.len());
        self.buf.reserve(room);
        let mut window = (&mut self.buf).limit(room);
        stream.read_buf(&mut window).await
    }

    /// Split off the next line, CRLF included
    pub fn take_line(&mut self) -> Option<BytesMut> {
        let end = self.buf.windows(2).position(|w| w == b"\r\n")?;
        Some(self.buf.split_to(end + 2))
    }

    /// Split off up to `n` bytes
    pub fn take(&mut self, n: usize) -> Bytes {
        let n = n.min(self.buf.len());
        self.buf.split_to(n).freeze()
    }

    pub fn take_all(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Discard up to `n` bytes
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        self.buf.advance(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lines_and_leftover() {
        let mut input: &[u8] = b"ICY 200 OK\r\n\xd3\x00\x13";
        let mut buf = ReadBuffer::new(1024);

        assert_eq!(buf.read_more(&mut input).await.unwrap(), 15);
        assert_eq!(&buf.take_line().unwrap()[..], b"ICY 200 OK\r\n");
        assert!(buf.take_line().is_none());
        assert_eq!(&buf.take_all()[..], b"\xd3\x00\x13");
        assert!(buf.is_empty());

        // exhausted source reads as EOF
        assert_eq!(buf.read_more(&mut input).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reads_stop_at_limit() {
        let mut input: &[u8] = b"0123456789abcdefghij";
        let mut buf = ReadBuffer::new(8);

        assert_eq!(buf.read_more(&mut input).await.unwrap(), 8);
        assert!(buf.is_full());

        assert_eq!(&buf.take(3)[..], b"012");
        assert_eq!(buf.read_more(&mut input).await.unwrap(), 3);
        assert_eq!(&buf.take_all()[..], b"3456789ab");
    }

    #[test]
    fn test_take_and_consume_clamp() {
        let mut buf = ReadBuffer::new(16);
        buf.buf.extend_from_slice(b"abc");

        assert_eq!(&buf.take(10)[..], b"abc");
        buf.buf.extend_from_slice(b"\r");
        buf.consume(2);
        assert!(buf.is_empty());
    }
}
