//! Strata client query-preparation engine.
//!
//! This crate is the client-side half of a driver for the Strata
//! distributed table store: it turns SQL text plus untyped caller
//! values into protocol-correct, strongly typed request payloads.
//!
//! # Architecture
//!
//! ## Pure layer (no I/O)
//! - `types` - the typed protocol model and value conversion
//! - `query` - parsed query descriptors and the binding strategies
//!
//! ## Driver layer (async, shared)
//! - `driver::Context` - query/type/stat caches, strategy selection,
//!   session pool sizing
//! - `driver::StrataStatement` - executes a bound strategy over the
//!   transport
//!
//! The SQL dialect parser and the RPC transport are collaborators
//! behind the [`QueryParser`] and [`Transport`] traits; this crate
//! never parses SQL or speaks the wire protocol itself.
//!
//! # Example
//!
//! ```ignore
//! let context = Context::new(config, parser, transport, pool);
//! let query = context.find_or_parse_query(sql).await?;
//! let mut params = context.find_or_bind_params(&query, PrepareMode::Auto).await?;
//! params.set_by_index(1, &SqlValue::Int64(42), None)?;
//! let statement = StrataStatement::new(&context);
//! let mut tracer = context.tracer();
//! statement.execute(params.as_mut(), &mut tracer).await?;
//! tracer.close();
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod query;
pub mod types;

pub use config::{ClientConfig, ClientConfigBuilder};
pub use driver::{
    CacheStats, Context, ExecuteResult, ExplainData, PoolStats, QueryStat, SessionPool,
    SharedSessionPool, StrataStatement, Tracer, Transport, SUCCESS_NO_INFO,
};
pub use error::{StrataError, StrataResult};
pub use query::params::{
    BatchConfiguration, BatchedParams, BoundQueryParams, ImmediateParams, InListParam,
    ParamDescription, PrepareMode, PreparedParams,
};
pub use query::{
    BatchHint, ParsedQuery, PlaceholderSpec, QueryKind, QueryOptions, QueryParser, ResolvedTypes,
};
pub use types::{
    Column, ParamSet, SqlValue, StrataType, StrataValue, StructShape, TypeDescriptor, TypeRegistry,
};
