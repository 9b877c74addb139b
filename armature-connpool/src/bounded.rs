//! Capacity-limited blocking pool.
//!
//! At most `max_size` transport connections are open at any time. Idle
//! connections are reused most-recently-returned first; when none is idle
//! and the pool is at capacity, `get` suspends until a connection is
//! returned or retired.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{Span, debug, info, warn};

use crate::{ConnPool, Connection, Connector, PoolConfig, PoolError, PoolStats, Result};

/// A bounded pool that suspends callers at capacity.
pub struct BoundedPool<C: Connector> {
    connector: C,
    config: PoolConfig,
    state: Mutex<State<C::Stream>>,
    available: Notify,
    span: Span,
}

struct State<S> {
    // LIFO: the top of the stack is the warmest connection.
    idle: Vec<Connection<S>>,
    // Open connections, including ones still being dialed.
    outstanding: usize,
}

impl<C: Connector> BoundedPool<C> {
    /// Create a pool with the given configuration.
    pub fn new(connector: C, config: PoolConfig) -> Result<Self> {
        Self::builder(connector).config(config).build()
    }

    /// Create a builder.
    pub fn builder(connector: C) -> BoundedPoolBuilder<C> {
        BoundedPoolBuilder::new(connector)
    }

    /// Get the configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Get the connector.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Capacity limit.
    pub fn max_size(&self) -> usize {
        self.config.max_size
    }

    /// Connections currently open, idle or checked out.
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }

    /// Get pool statistics.
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            outstanding: state.outstanding,
            idle: state.idle.len(),
            max_size: self.config.max_size,
        }
    }

    /// Acquire a connection, giving up after `timeout`.
    ///
    /// On timeout the pool is left exactly as it was.
    pub async fn get_timeout(&self, timeout: Duration) -> Result<(Connection<C::Stream>, bool)> {
        match tokio::time::timeout(timeout, self.acquire()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(parent: &self.span, ?timeout, "Timed out waiting for a pooled connection");
                Err(PoolError::Timeout(timeout))
            }
        }
    }

    async fn acquire(&self) -> Result<(Connection<C::Stream>, bool)> {
        loop {
            let mut notified = std::pin::pin!(self.available.notified());

            {
                let mut state = self.state.lock();
                if let Some(conn) = state.idle.pop() {
                    return Ok((conn, false));
                }
                if state.outstanding < self.config.max_size {
                    state.outstanding += 1;
                    break;
                }
                // Register before unlocking so a signal sent in between is not lost.
                notified.as_mut().enable();
            }

            notified.await;
        }

        let slot = Reservation::new(self);
        match self.connector.open().await {
            Ok(stream) => {
                slot.commit();
                let conn = Connection::with_capacity(self.config.read_buffer_size, stream);
                debug!(parent: &self.span, conn_id = conn.id(), "Opened new connection");
                Ok((conn, true))
            }
            Err(err) => {
                drop(slot);
                warn!(parent: &self.span, error = %err, "Failed to open connection");
                Err(PoolError::Open(err))
            }
        }
    }

    fn release_slot(&self) {
        let mut state = self.state.lock();
        self.release_slot_locked(&mut state);
    }

    fn release_slot_locked(&self, state: &mut State<C::Stream>) {
        match state.outstanding.checked_sub(1) {
            Some(n) => state.outstanding = n,
            None => warn!(parent: &self.span, "Outstanding connection count would go negative"),
        }
        self.available.notify_one();
    }
}

#[async_trait]
impl<C: Connector> ConnPool for BoundedPool<C> {
    type Stream = C::Stream;

    async fn get(&self) -> Result<(Connection<C::Stream>, bool)> {
        match self.config.acquire_timeout {
            Some(timeout) => self.get_timeout(timeout).await,
            None => self.acquire().await,
        }
    }

    fn add(&self, conn: Connection<C::Stream>) {
        let mut state = self.state.lock();
        state.idle.push(conn);
        self.available.notify_one();
    }

    async fn remove(&self, conn: Connection<C::Stream>) {
        {
            let mut state = self.state.lock();
            state.idle.retain(|idle| !idle.same_as(&conn));
            self.release_slot_locked(&mut state);
        }

        let mut io = conn.lock().await;
        if let Err(err) = self.connector.close(io.get_mut()).await {
            warn!(parent: &self.span, conn_id = conn.id(), error = %err, "Failed to close connection");
        }
        debug!(parent: &self.span, conn_id = conn.id(), "Removed connection");
    }

    fn len(&self) -> usize {
        self.state.lock().idle.len()
    }
}

/// Holds a capacity slot while a connection is being opened.
///
/// Dropping it without [`commit`](Reservation::commit) gives the slot back,
/// which also covers an acquire future cancelled mid-dial.
struct Reservation<'a, C: Connector> {
    pool: &'a BoundedPool<C>,
    armed: bool,
}

impl<'a, C: Connector> Reservation<'a, C> {
    fn new(pool: &'a BoundedPool<C>) -> Self {
        Self { pool, armed: true }
    }

    fn commit(mut self) {
        self.armed = false;
    }
}

impl<C: Connector> Drop for Reservation<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            self.pool.release_slot();
        }
    }
}

/// Builder for [`BoundedPool`].
pub struct BoundedPoolBuilder<C: Connector> {
    connector: C,
    config: PoolConfig,
    span: Span,
}

impl<C: Connector> BoundedPoolBuilder<C> {
    /// Create a new builder with the default configuration.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            config: PoolConfig::default(),
            span: Span::none(),
        }
    }

    /// Set the configuration.
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the capacity limit.
    pub fn max_size(mut self, size: usize) -> Self {
        self.config.max_size = size;
        self
    }

    /// Bound how long `get` waits for a connection.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquire_timeout = Some(timeout);
        self
    }

    /// Span that parents every event the pool logs.
    pub fn span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Build the pool.
    pub fn build(self) -> Result<BoundedPool<C>> {
        self.config.validate()?;

        info!(
            parent: &self.span,
            max_size = self.config.max_size,
            acquire_timeout = ?self.config.acquire_timeout,
            "Connection pool created"
        );

        Ok(BoundedPool {
            connector: self.connector,
            config: self.config,
            state: Mutex::new(State {
                idle: Vec::new(),
                outstanding: 0,
            }),
            available: Notify::new(),
            span: self.span,
        })
    }
}
