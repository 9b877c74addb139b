//! # Armature Connection Pool
//!
//! Bounded connection pooling for protocol clients.
//!
//! ## Features
//!
//! - **Bounded Pool**: At most `max_size` open connections; callers wait
//!   when the pool is exhausted instead of dialing more
//! - **LIFO Reuse**: The most recently returned connection is handed out first
//! - **Fixed Pool**: Run pool-based code against one dedicated connection
//! - **Command Hooks**: Before/after observers for commands and pipelines,
//!   with a ready-made tracing observer
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use armature_connpool::prelude::*;
//! use futures::future::BoxFuture;
//! use tokio::io::AsyncWriteExt;
//! use tokio::net::TcpStream;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let connector = FnConnector::new(|| -> BoxFuture<'static, std::io::Result<TcpStream>> {
//!         Box::pin(TcpStream::connect("127.0.0.1:6379"))
//!     });
//!
//!     let pool = BoundedPool::builder(connector)
//!         .max_size(10)
//!         .span(tracing::info_span!("redis_pool"))
//!         .build()?;
//!
//!     let (conn, is_new) = pool.get().await?;
//!     if is_new {
//!         // fresh transport: authenticate, select database, ...
//!     }
//!
//!     {
//!         let mut io = conn.lock().await;
//!         io.write_all(b"PING\r\n").await?;
//!     }
//!
//!     // Hand it back for reuse, or `pool.remove(conn).await` if it broke.
//!     pool.add(conn);
//!     Ok(())
//! }
//! ```

mod bounded;
mod config;
mod connection;
mod connector;
mod error;
mod fixed;
pub mod hooks;
mod pool;

pub use bounded::{BoundedPool, BoundedPoolBuilder};
pub use config::{DEFAULT_READ_BUFFER_SIZE, PoolConfig, PoolConfigBuilder};
pub use connection::Connection;
pub use connector::{Connector, FnConnector};
pub use error::{PoolError, Result};
pub use fixed::FixedPool;
pub use pool::{ConnPool, PoolStats};

/// Prelude for common imports.
///
/// ```
/// use armature_connpool::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bounded::{BoundedPool, BoundedPoolBuilder};
    pub use crate::config::{PoolConfig, PoolConfigBuilder};
    pub use crate::connection::Connection;
    pub use crate::connector::{Connector, FnConnector};
    pub use crate::error::{PoolError, Result};
    pub use crate::fixed::FixedPool;
    pub use crate::hooks::{Cmd, CommandError, Hook, HookContext, Hooks, TracingHook};
    pub use crate::pool::{ConnPool, PoolStats};
}
