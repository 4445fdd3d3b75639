//! Shared test doubles: a lookup-table parser and a scripted transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use strata_client::{
    Column, ExecuteResult, ExplainData, ParamSet, ParsedQuery, QueryKind, QueryOptions,
    QueryParser, ResolvedTypes, StrataError, StrataResult, Transport,
};

/// Parser stub: preconfigured descriptors by origin text, plain data
/// queries otherwise.
#[derive(Default)]
pub struct TestParser {
    queries: Mutex<HashMap<String, ParsedQuery>>,
    pub parse_calls: AtomicUsize,
}

impl TestParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(self, query: ParsedQuery) -> Self {
        self.queries
            .lock()
            .unwrap()
            .insert(query.origin_sql().to_string(), query.clone());
        self
    }
}

impl QueryParser for TestParser {
    fn parse(&self, sql: &str, _options: &QueryOptions) -> StrataResult<ParsedQuery> {
        self.parse_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(query) = self.queries.lock().unwrap().get(sql) {
            return Ok(query.clone());
        }
        Ok(ParsedQuery::new(sql, sql, QueryKind::Data))
    }
}

/// Scripted transport with call counters.
pub struct MockTransport {
    pub database: String,
    pub prepare_types: ResolvedTypes,
    pub columns: Vec<Column>,
    pub fail_prepare: bool,
    pub fail_describe: bool,
    pub fail_explain: bool,
    pub prepare_calls: AtomicUsize,
    pub describe_calls: AtomicUsize,
    pub explain_calls: AtomicUsize,
    pub execute_calls: AtomicUsize,
    pub last_deadline: Mutex<Option<Duration>>,
    pub last_params: Mutex<Option<ParamSet>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            database: "/local".to_string(),
            prepare_types: ResolvedTypes::new(),
            columns: Vec::new(),
            fail_prepare: false,
            fail_describe: false,
            fail_explain: false,
            prepare_calls: AtomicUsize::new(0),
            describe_calls: AtomicUsize::new(0),
            explain_calls: AtomicUsize::new(0),
            execute_calls: AtomicUsize::new(0),
            last_deadline: Mutex::new(None),
            last_params: Mutex::new(None),
        }
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prepare_types(mut self, types: ResolvedTypes) -> Self {
        self.prepare_types = types;
        self
    }

    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn prepare(
        &self,
        _sql: &str,
        deadline: Option<Duration>,
    ) -> StrataResult<ResolvedTypes> {
        self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_deadline.lock().unwrap() = deadline;
        if self.fail_prepare {
            return Err(StrataError::transport("UNAVAILABLE", "prepare refused"));
        }
        Ok(self.prepare_types.clone())
    }

    async fn describe_table(
        &self,
        _path: &str,
        deadline: Option<Duration>,
    ) -> StrataResult<Vec<Column>> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_deadline.lock().unwrap() = deadline;
        if self.fail_describe {
            return Err(StrataError::transport("SCHEME_ERROR", "no such table"));
        }
        Ok(self.columns.clone())
    }

    async fn explain(&self, sql: &str, deadline: Option<Duration>) -> StrataResult<ExplainData> {
        self.explain_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_deadline.lock().unwrap() = deadline;
        if self.fail_explain {
            return Err(StrataError::transport("UNSUPPORTED", "cannot explain"));
        }
        Ok(ExplainData {
            ast: format!("(ast {})", sql),
            plan: format!("(plan {})", sql),
        })
    }

    async fn execute(
        &self,
        _sql: &str,
        params: ParamSet,
        deadline: Option<Duration>,
    ) -> StrataResult<ExecuteResult> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_deadline.lock().unwrap() = deadline;
        *self.last_params.lock().unwrap() = Some(params);
        Ok(ExecuteResult {
            rows_affected: Some(1),
        })
    }

    fn database(&self) -> &str {
        &self.database
    }
}
