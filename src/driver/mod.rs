//! Driver context: caches, strategy selection, pool sizing, tracing.
//!
//! Methods are split across modules:
//! - `context.rs` - the shared per-connection context
//! - `cache.rs` - bounded query/type/stat caches
//! - `transport.rs` - the external RPC transport contract
//! - `pool.rs` - session pool contract and the atomics-backed handle
//! - `tracer.rs` - per-execution trace sink
//! - `statement.rs` - execute/execute_batch on a bound strategy

mod cache;
mod context;
mod pool;
mod statement;
mod tracer;
mod transport;

pub use cache::{CacheStats, QueryStat};
pub use context::Context;
pub use pool::{PoolStats, SessionPool, SharedSessionPool};
pub use statement::{StrataStatement, SUCCESS_NO_INFO};
pub use tracer::Tracer;
pub use transport::{ExecuteResult, ExplainData, Transport};
