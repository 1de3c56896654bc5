//! Byte stream owned by a connection engine

use tokio::io::{AsyncRead, AsyncWrite};

/// The socket behind one caster connection.
///
/// The engine reads the response and body from it and writes the request and
/// outgoing payloads to it, all from a single task. `Unpin + Send` lets that
/// task hold it across awaits and be spawned. Tests plug in
/// `tokio::io::DuplexStream` in place of a `TcpStream`.
pub type Stream = Box<dyn AsyncReadWrite + Unpin + Send>;

/// Read and write halves in one object, as both `Stream` directions are driven
/// by the same engine
pub trait AsyncReadWrite: AsyncRead + AsyncWrite {}

impl<T: AsyncRead + AsyncWrite> AsyncReadWrite for T {}

/// Boxing into a [`Stream`] for anything a transport can hand back
pub trait IntoStream {
    fn into_stream(self) -> Stream;
}

impl<T> IntoStream for T
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn into_stream(self) -> Stream {
        Box::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_boxed_pipe_carries_both_directions() {
        let (local, mut remote) = tokio::io::duplex(64);
        let mut stream = local.into_stream();

        stream.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();
        let mut request = [0u8; 16];
        remote.read_exact(&mut request).await.unwrap();
        assert_eq!(&request, b"GET / HTTP/1.1\r\n");

        remote.write_all(b"ICY 200 OK\r\n").await.unwrap();
        let mut status = [0u8; 12];
        stream.read_exact(&mut status).await.unwrap();
        assert_eq!(&status, b"ICY 200 OK\r\n");
    }
}
