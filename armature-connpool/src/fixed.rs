//! Single dedicated connection exposed as a pool.

use async_trait::async_trait;

use crate::{ConnPool, Connection, Result};

/// A pool that always hands out the same connection.
///
/// Useful for exchanges that must not interleave with other pool traffic,
/// such as a transaction or a subscription. The bound connection is never
/// queued for reuse by others and never closed here; whoever created the
/// pool owns its lifecycle.
pub struct FixedPool<S> {
    conn: Connection<S>,
}

impl<S> FixedPool<S> {
    /// Bind a pool to `conn`.
    pub fn new(conn: Connection<S>) -> Self {
        Self { conn }
    }

    /// The bound connection.
    pub fn connection(&self) -> &Connection<S> {
        &self.conn
    }

    /// Release the bound connection.
    pub fn into_inner(self) -> Connection<S> {
        self.conn
    }
}

#[async_trait]
impl<S: Send + 'static> ConnPool for FixedPool<S> {
    type Stream = S;

    async fn get(&self) -> Result<(Connection<S>, bool)> {
        Ok((self.conn.clone(), false))
    }

    fn add(&self, _conn: Connection<S>) {}

    async fn remove(&self, _conn: Connection<S>) {}

    fn len(&self) -> usize {
        1
    }
}
