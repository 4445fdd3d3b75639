//! External RPC transport contract.
//!
//! The transport owns retries, timeouts and the wire protocol; this
//! layer only supplies a deadline hint and consumes typed results.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StrataResult;
use crate::query::ResolvedTypes;
use crate::types::{Column, ParamSet};

/// Server-produced query analysis, stored for full-scan detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainData {
    pub ast: String,
    pub plan: String,
}

/// Outcome of one execution round trip.
///
/// Result materialization belongs to the adapter layer; the core only
/// forwards what the transport reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteResult {
    /// Affected row count, when the server reports one.
    pub rows_affected: Option<u64>,
}

/// Typed RPC channel to the Strata store.
///
/// Every method is wrapped in the transport's own retry/timeout policy;
/// callers here never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Server-side preparation: authoritative parameter name to type map.
    async fn prepare(
        &self,
        sql: &str,
        deadline: Option<Duration>,
    ) -> StrataResult<ResolvedTypes>;

    /// Column list of a table, for bulk-upsert type resolution.
    async fn describe_table(
        &self,
        path: &str,
        deadline: Option<Duration>,
    ) -> StrataResult<Vec<Column>>;

    /// Plan inspection for usage statistics.
    async fn explain(&self, sql: &str, deadline: Option<Duration>) -> StrataResult<ExplainData>;

    /// Execute a prepared text with a fully typed parameter set.
    async fn execute(
        &self,
        sql: &str,
        params: ParamSet,
        deadline: Option<Duration>,
    ) -> StrataResult<ExecuteResult>;

    /// Database root path, used to absolutize table names.
    fn database(&self) -> &str;
}
