//! Execution façade over a bound strategy.
//!
//! The relational adapter wraps this with its statement objects; the
//! façade only knows how to turn a bound parameter strategy into
//! transport requests, including the empty-batch short circuit.

use std::sync::Arc;
use std::time::Duration;

use crate::error::StrataResult;
use crate::query::params::BoundQueryParams;

use super::context::Context;
use super::tracer::Tracer;
use super::transport::{ExecuteResult, Transport};

/// Per-row marker for batched execution: the request succeeded but the
/// server cannot attribute a row count to an individual logical row.
pub const SUCCESS_NO_INFO: i64 = -2;

/// Stateless executor bound to one transport.
pub struct StrataStatement {
    transport: Arc<dyn Transport>,
    deadline: Option<Duration>,
}

impl StrataStatement {
    pub fn new(context: &Context) -> Self {
        Self {
            transport: context.transport().clone(),
            deadline: context.operation_deadline(),
        }
    }

    /// Execute the currently bound values as one request.
    ///
    /// For a row-accumulating strategy this first flushes the current
    /// row, sends every accumulated row in the single list parameter,
    /// and consumes the batch.
    pub async fn execute(
        &self,
        params: &mut dyn BoundQueryParams,
        tracer: &mut Tracer,
    ) -> StrataResult<ExecuteResult> {
        if params.flattens_batch() {
            params.add_batch()?;
        }
        let set = params.current_params()?;
        tracer.query(params.query_text());
        let result = self
            .transport
            .execute(params.query_text(), set, self.deadline)
            .await?;
        tracer.trace("request done");
        if params.flattens_batch() {
            params.clear_batch();
        }
        Ok(result)
    }

    /// Execute the accumulated batch.
    ///
    /// An empty batch returns an empty result without a remote call. A
    /// row-accumulating strategy sends exactly one request; the others
    /// send one request per snapshot. Per-row outcomes are reported as
    /// [`SUCCESS_NO_INFO`] because the server does not attribute them.
    pub async fn execute_batch(
        &self,
        params: &mut dyn BoundQueryParams,
        tracer: &mut Tracer,
    ) -> StrataResult<Vec<i64>> {
        let batch_size = params.batch_size();
        if batch_size == 0 {
            tracing::debug!("batch is empty, nothing to execute");
            return Ok(Vec::new());
        }

        if params.flattens_batch() {
            let set = params.current_params()?;
            tracer.query(params.query_text());
            self.transport
                .execute(params.query_text(), set, self.deadline)
                .await?;
            tracer.trace("request done");
        } else {
            for set in params.batch_params() {
                tracer.query(params.query_text());
                self.transport
                    .execute(params.query_text(), set, self.deadline)
                    .await?;
                tracer.trace("request done");
            }
        }

        params.clear_batch();
        Ok(vec![SUCCESS_NO_INFO; batch_size])
    }
}
