//! Pooled connection handle.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncRead, BufReader};
use tokio::sync::{Mutex, MutexGuard};

use crate::config::DEFAULT_READ_BUFFER_SIZE;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A transport connection paired with its read buffer.
///
/// The buffer is allocated once, when the connection is opened, and lives
/// as long as the connection. Handles are cheap to clone; clones refer to
/// the same underlying stream.
pub struct Connection<S> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    id: u64,
    io: Mutex<BufReader<S>>,
}

impl<S: AsyncRead> Connection<S> {
    /// Wrap a stream with the default 1 KiB read buffer.
    pub fn new(stream: S) -> Self {
        Self::with_capacity(DEFAULT_READ_BUFFER_SIZE, stream)
    }

    /// Wrap a stream with a read buffer of the given capacity.
    pub fn with_capacity(capacity: usize, stream: S) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                io: Mutex::new(BufReader::with_capacity(capacity, stream)),
            }),
        }
    }
}

impl<S> Connection<S> {
    /// Process-unique identifier of this connection.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Lock the connection for I/O.
    ///
    /// Reads go through the buffer, writes go straight to the stream.
    pub async fn lock(&self) -> MutexGuard<'_, BufReader<S>> {
        self.inner.io.lock().await
    }

    /// Lock the connection if no one else is using it.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, BufReader<S>>> {
        self.inner.io.try_lock().ok()
    }

    /// Whether both handles refer to the same transport connection.
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<S> Clone for Connection<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> PartialEq for Connection<S> {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl<S> Eq for Connection<S> {}

impl<S> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").field("id", &self.inner.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_read_through_buffer() {
        let (client, mut server) = tokio::io::duplex(64);
        let conn = Connection::new(client);

        server.write_all(b"+PONG\r\n$3\r\nbar\r\n").await.unwrap();

        let mut io = conn.lock().await;
        let mut line = String::new();
        io.read_line(&mut line).await.unwrap();
        assert_eq!(line, "+PONG\r\n");
        assert_eq!(io.buffer(), b"$3\r\nbar\r\n");
    }

    #[tokio::test]
    async fn test_write_reaches_peer() {
        let (client, mut server) = tokio::io::duplex(64);
        let conn = Connection::with_capacity(16, client);

        {
            let mut io = conn.lock().await;
            io.write_all(b"PING\r\n").await.unwrap();
            io.flush().await.unwrap();
        }

        let mut buf = [0u8; 6];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"PING\r\n");
    }

    #[tokio::test]
    async fn test_default_buffer_bounds_each_fill() {
        let (client, mut server) = tokio::io::duplex(4096);
        let conn = Connection::new(client);

        server.write_all(&[b'x'; 1500]).await.unwrap();

        let mut io = conn.lock().await;
        assert_eq!(io.fill_buf().await.unwrap().len(), DEFAULT_READ_BUFFER_SIZE);
        io.consume(DEFAULT_READ_BUFFER_SIZE);
        assert_eq!(io.fill_buf().await.unwrap().len(), 1500 - DEFAULT_READ_BUFFER_SIZE);
    }

    #[tokio::test]
    async fn test_custom_buffer_bounds_each_fill() {
        let (client, mut server) = tokio::io::duplex(256);
        let conn = Connection::with_capacity(16, client);

        server.write_all(b"$11\r\nhello world\r\n").await.unwrap();

        let mut io = conn.lock().await;
        let chunk = io.fill_buf().await.unwrap();
        assert_eq!(chunk, b"$11\r\nhello worl");
        assert_eq!(chunk.len(), 16);
    }

    #[test]
    fn test_identity() {
        let (a, _peer_a) = tokio::io::duplex(8);
        let (b, _peer_b) = tokio::io::duplex(8);
        let first = Connection::new(a);
        let second = Connection::new(b);

        assert_eq!(first, first.clone());
        assert_ne!(first, second);
        assert_ne!(first.id(), second.id());
        assert!(format!("{:?}", first).contains(&first.id().to_string()));
    }

    #[tokio::test]
    async fn test_try_lock_while_in_use() {
        let (client, _server) = tokio::io::duplex(8);
        let conn = Connection::new(client);

        let guard = conn.lock().await;
        assert!(conn.try_lock().is_none());
        drop(guard);
        assert!(conn.try_lock().is_some());
    }
}
