//! Shared per-connection context.
//!
//! One `Context` lives for the lifetime of a physical connection and is
//! shared, read-mostly, by every logical connection multiplexed over
//! it: parsed-query, parameter-type and usage-stat caches, the type
//! registry, and the session pool sizing controller.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::{StrataError, StrataResult};
use crate::query::params::{
    BatchConfiguration, BatchedParams, BoundQueryParams, ImmediateParams, PreparedParams,
    PrepareMode,
};
use crate::query::{ParsedQuery, QueryOptions, QueryParser, ResolvedTypes};
use crate::types::TypeRegistry;

use super::cache::{BoundedCache, CacheStats, QueryStat};
use super::pool::SessionPool;
use super::tracer::Tracer;
use super::transport::Transport;

const SESSION_POOL_RESIZE_STEP: usize = 50;
const SESSION_POOL_RESIZE_THRESHOLD: usize = 10;

/// Long-lived engine state shared across logical connections.
pub struct Context {
    config: ClientConfig,
    parser: Arc<dyn QueryParser>,
    transport: Arc<dyn Transport>,
    pool: Arc<dyn SessionPool>,
    registry: Arc<TypeRegistry>,
    queries: BoundedCache<ParsedQuery>,
    param_types: BoundedCache<ResolvedTypes>,
    stats: BoundedCache<QueryStat>,
    connections: AtomicI64,
}

impl Context {
    pub fn new(
        config: ClientConfig,
        parser: Arc<dyn QueryParser>,
        transport: Arc<dyn Transport>,
        pool: Arc<dyn SessionPool>,
    ) -> Self {
        let queries = BoundedCache::new(config.query_cache_size);
        let param_types = BoundedCache::new(config.types_cache_size);
        let stats = if config.full_scan_stats {
            BoundedCache::new(config.stats_cache_size)
        } else {
            BoundedCache::new(0)
        };
        Self {
            config,
            parser,
            transport,
            pool,
            registry: Arc::new(TypeRegistry::new()),
            queries,
            param_types,
            stats,
            connections: AtomicI64::new(0),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn type_registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Deadline hint forwarded to every resolution round trip.
    pub fn operation_deadline(&self) -> Option<Duration> {
        self.config.operation_deadline()
    }

    /// A fresh trace sink for one execution scope.
    pub fn tracer(&self) -> Tracer {
        Tracer::new()
    }

    /// Parse without touching the cache.
    pub fn parse_query(&self, sql: &str) -> StrataResult<ParsedQuery> {
        let options = QueryOptions::from(&self.config);
        self.parser.parse(sql, &options)
    }

    /// Cached parse of one SQL text.
    ///
    /// A hit returns the shared descriptor. A miss parses, stores, and
    /// (with usage stats enabled) performs the one-time explain analysis
    /// for this text. Parse failures are fatal to the call and never
    /// cached. Racing callers may both parse once; both results are
    /// equivalent and fully built before anyone can read them.
    pub async fn find_or_parse_query(&self, sql: &str) -> StrataResult<Arc<ParsedQuery>> {
        if !self.queries.is_enabled() {
            return Ok(Arc::new(self.parse_query(sql)?));
        }

        if let Some(cached) = self.queries.get(sql) {
            return Ok(cached);
        }

        let query = Arc::new(self.parse_query(sql)?);
        self.queries.put(sql, query.clone());

        if self.stats.is_enabled() {
            let stat = match self.stats.get(sql) {
                Some(stat) => stat,
                None => {
                    let stat = self.analyze_query(&query).await;
                    self.stats.put(sql, stat.clone());
                    stat
                }
            };
            stat.increment_usage();
        }

        Ok(query)
    }

    /// One-time explain round trip backing the usage stats. Failures
    /// are stored too, so a query the server cannot explain does not
    /// pay the round trip on every re-parse.
    async fn analyze_query(&self, query: &ParsedQuery) -> Arc<QueryStat> {
        let deadline = self.operation_deadline();
        match self.transport.explain(query.prepared_sql(), deadline).await {
            Ok(data) => Arc::new(QueryStat::success(query.prepared_sql(), data.ast, data.plan)),
            Err(err) => {
                tracing::debug!("explain failed for query analysis: {}", err);
                let status = err.status().unwrap_or("CLIENT_ERROR").to_string();
                Arc::new(QueryStat::failure(query.prepared_sql(), status))
            }
        }
    }

    /// Usage stat of one SQL text, for the full-scan detector.
    pub fn query_stat(&self, sql: &str) -> Option<Arc<QueryStat>> {
        self.stats.get(sql)
    }

    /// Pick and build a binding strategy for a parsed query.
    pub async fn find_or_bind_params(
        &self,
        query: &ParsedQuery,
        mode: PrepareMode,
    ) -> StrataResult<Box<dyn BoundQueryParams>> {
        // Bulk-upsert shape first: types come from the table itself, no
        // server prepare involved.
        if let Some(hint) = query.batch_hint() {
            if mode == PrepareMode::Auto || mode == PrepareMode::ForceBatch {
                if let Some(params) = self.try_auto_batch(query).await {
                    return Ok(params);
                }
                if mode == PrepareMode::ForceBatch {
                    return Err(StrataError::NotABatch(query.origin_sql().to_string()));
                }
                tracing::debug!(
                    "auto-batch declined for {}, falling back",
                    hint.param_name
                );
            }
        }

        if !query.is_plain() || mode == PrepareMode::ForceImmediate || !self.config.server_prepare
        {
            return Ok(Box::new(ImmediateParams::new(query, self.registry.clone())));
        }

        let types = self.resolve_param_types(query).await?;

        let require_batch = mode == PrepareMode::ForceBatch;
        if require_batch || (mode == PrepareMode::Auto && self.config.auto_batch_detection) {
            if let Some(cfg) = BatchConfiguration::detect(&types, &self.registry) {
                return Ok(Box::new(BatchedParams::new(query.prepared_sql(), cfg)));
            }
            if require_batch {
                return Err(StrataError::NotABatch(query.origin_sql().to_string()));
            }
        }

        Ok(Box::new(PreparedParams::new(query, &types, &self.registry)))
    }

    /// Resolve the batch shape through the parameter-type cache or a
    /// describe-table round trip. Any failure declines silently; the
    /// caller falls through to the next strategy.
    async fn try_auto_batch(&self, query: &ParsedQuery) -> Option<Box<dyn BoundQueryParams>> {
        let hint = query.batch_hint()?;

        if let Some(types) = self.param_types.get(query.origin_sql()) {
            let cfg = BatchConfiguration::detect(&types, &self.registry)?;
            return Some(Box::new(BatchedParams::new(query.prepared_sql(), cfg)));
        }

        let path = self.table_path(&hint.table);
        let deadline = self.operation_deadline();
        let columns = match self.transport.describe_table(&path, deadline).await {
            Ok(columns) => columns,
            Err(err) => {
                tracing::debug!("describe-table failed for {}: {}", path, err);
                return None;
            }
        };

        let cfg = BatchConfiguration::from_described_columns(hint, &columns, &self.registry)?;
        self.param_types
            .put(query.origin_sql(), Arc::new(cfg.resolved_types()));
        Some(Box::new(BatchedParams::new(query.prepared_sql(), cfg)))
    }

    /// Resolved parameter types, keyed by the origin SQL text, through
    /// the cache or a server prepare round trip.
    pub async fn resolve_param_types(
        &self,
        query: &ParsedQuery,
    ) -> StrataResult<Arc<ResolvedTypes>> {
        if let Some(types) = self.param_types.get(query.origin_sql()) {
            return Ok(types);
        }

        let deadline = self.operation_deadline();
        let types = self
            .transport
            .prepare(query.prepared_sql(), deadline)
            .await
            .map_err(|err| {
                StrataError::RemoteResolution(format!(
                    "cannot prepare query: {}",
                    err
                ))
            })?;
        let types = Arc::new(types);
        self.param_types.put(query.origin_sql(), types.clone());
        Ok(types)
    }

    /// Absolutize a table name against the database root.
    fn table_path(&self, table: &str) -> String {
        if table.starts_with('/') {
            table.to_string()
        } else {
            format!("{}/{}", self.transport.database(), table)
        }
    }

    pub fn connection_count(&self) -> i64 {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn has_connections(&self) -> bool {
        self.connection_count() > 0
    }

    /// Register one more active logical connection and grow the session
    /// pool when the active count presses against the maximum.
    pub fn on_connection_opened(&self) {
        let active = self.connections.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.config.auto_resize_pool {
            return;
        }
        let max = self.pool.max_size();
        if active >= max as i64 - SESSION_POOL_RESIZE_THRESHOLD as i64 {
            self.pool
                .compare_and_set_max(max, max + SESSION_POOL_RESIZE_STEP);
        }
    }

    /// Deregister one active logical connection and shrink the pool
    /// once the active count falls well below the grow trigger. The
    /// wide gap between the two thresholds keeps load hovering at a
    /// boundary from flapping the pool size.
    pub fn on_connection_closed(&self) {
        let active = self.connections.fetch_sub(1, Ordering::SeqCst) - 1;
        if !self.config.auto_resize_pool {
            return;
        }
        let max = self.pool.max_size();
        if max > SESSION_POOL_RESIZE_STEP
            && active
                < max as i64
                    - (SESSION_POOL_RESIZE_STEP + 2 * SESSION_POOL_RESIZE_THRESHOLD) as i64
        {
            self.pool
                .compare_and_set_max(max, max - SESSION_POOL_RESIZE_STEP);
        }
    }

    /// Cache observability for diagnostics.
    pub fn cache_stats(&self) -> (CacheStats, CacheStats, CacheStats) {
        (
            self.queries.stats(),
            self.param_types.stats(),
            self.stats.stats(),
        )
    }

    /// Release cached state. Copies already handed out stay valid.
    pub fn close(&self) {
        tracing::debug!(
            "closing context with {} active connections",
            self.connection_count()
        );
        self.queries.clear();
        self.param_types.clear();
        self.stats.clear();
    }
}
