//! Transport open/close capability.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

/// Opens and closes transport connections on behalf of a pool.
///
/// The pool never serializes calls, so `open` and `close` may run
/// concurrently with each other and with other pool operations.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Byte stream produced by [`open`](Connector::open).
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Open a new transport connection.
    async fn open(&self) -> io::Result<Self::Stream>;

    /// Tear down a retired connection.
    ///
    /// Called once per removed connection, outside the pool lock. The
    /// default does nothing; the stream is closed when it is dropped.
    async fn close(&self, stream: &mut Self::Stream) -> io::Result<()> {
        let _ = stream;
        Ok(())
    }
}

/// A [`Connector`] built from a plain async function.
///
/// ```rust,ignore
/// let connector = FnConnector::new(|| Box::pin(TcpStream::connect("127.0.0.1:6379")));
/// ```
pub struct FnConnector<S, F> {
    open: F,
    _stream: std::marker::PhantomData<fn() -> S>,
}

impl<S, F> FnConnector<S, F>
where
    F: Fn() -> BoxFuture<'static, io::Result<S>> + Send + Sync + 'static,
{
    /// Create a connector that opens connections with `open`.
    pub fn new(open: F) -> Self {
        Self {
            open,
            _stream: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<S, F> Connector for FnConnector<S, F>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    F: Fn() -> BoxFuture<'static, io::Result<S>> + Send + Sync + 'static,
{
    type Stream = S;

    async fn open(&self) -> io::Result<S> {
        (self.open)().await
    }
}
