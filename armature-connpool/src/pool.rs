//! The pool capability contract.

use async_trait::async_trait;

use crate::{Connection, Result};

/// Operations shared by every pool variant.
///
/// Code written against this trait works the same whether it is backed by
/// a [`BoundedPool`](crate::BoundedPool) or a dedicated
/// [`FixedPool`](crate::FixedPool).
///
/// ```rust,ignore
/// let (conn, is_new) = pool.get().await?;
/// if is_new {
///     handshake(&conn).await?;
/// }
/// match exchange(&conn).await {
///     Ok(reply) => pool.add(conn),
///     Err(_) => pool.remove(conn).await,
/// }
/// ```
#[async_trait]
pub trait ConnPool: Send + Sync {
    /// Stream type carried by the pooled connections.
    type Stream: Send + 'static;

    /// Acquire a connection.
    ///
    /// The flag is `true` when the connection was just opened and carries
    /// no protocol state yet.
    async fn get(&self) -> Result<(Connection<Self::Stream>, bool)>;

    /// Return a connection for reuse.
    fn add(&self, conn: Connection<Self::Stream>);

    /// Retire a connection for good.
    async fn remove(&self, conn: Connection<Self::Stream>);

    /// Number of idle connections right now. Advisory only.
    fn len(&self) -> usize;

    /// Whether no connection is idle right now.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Connection pool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Open connections, idle or checked out.
    pub outstanding: usize,
    /// Idle connections.
    pub idle: usize,
    /// Capacity limit.
    pub max_size: usize,
}

impl PoolStats {
    /// Connections currently held by callers.
    pub fn checked_out(&self) -> usize {
        self.outstanding.saturating_sub(self.idle)
    }

    /// Calculate utilization (0.0 - 1.0).
    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            return 0.0;
        }
        self.outstanding as f64 / self.max_size as f64
    }
}
