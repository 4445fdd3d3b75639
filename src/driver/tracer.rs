//! Per-execution trace sink.
//!
//! A `Tracer` is created for one logical execution scope and passed
//! explicitly down the call path; there is no ambient registry. Closing
//! it emits a timing summary when the trace is interesting enough
//! (explicitly marked, or debug logging is enabled).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};

static ANONYMOUS_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug)]
struct Record {
    at: Instant,
    message: String,
    is_request: bool,
}

/// Ordered request/response log of one execution scope.
#[derive(Debug)]
pub struct Tracer {
    started_at: Instant,
    started_wall: DateTime<Utc>,
    records: Vec<Record>,
    tx_id: Option<String>,
    label: Option<String>,
    marked: bool,
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracer {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            started_wall: Utc::now(),
            records: Vec::new(),
            tx_id: None,
            label: None,
            marked: false,
        }
    }

    /// Append a diagnostic marker.
    pub fn trace(&mut self, message: impl Into<String>) {
        self.records.push(Record {
            at: Instant::now(),
            message: message.into(),
            is_request: false,
        });
    }

    /// Append a request marker.
    pub fn query(&mut self, text: impl Into<String>) {
        self.records.push(Record {
            at: Instant::now(),
            message: text.into(),
            is_request: true,
        });
    }

    /// Attach the transaction id. No-op when the id is unchanged, so
    /// call sites may re-mark without flooding the trace.
    pub fn set_id(&mut self, id: &str) {
        if self.tx_id.as_deref() != Some(id) {
            self.tx_id = Some(id.to_string());
            self.trace(format!("set-id {}", id));
        }
    }

    /// Force the summary out at INFO level on close. Idempotent for an
    /// unchanged label.
    pub fn mark_to_print(&mut self, label: &str) {
        if !self.marked || self.label.as_deref() != Some(label) {
            self.marked = true;
            self.label = Some(label.to_string());
            self.trace(format!("mark {}", label));
        }
    }

    pub fn is_marked(&self) -> bool {
        self.marked
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Emit the summary and consume the tracer.
    pub fn close(self) {
        let emit_info = self.marked;
        let enabled = if emit_info {
            tracing::enabled!(tracing::Level::INFO)
        } else {
            tracing::enabled!(tracing::Level::DEBUG)
        };
        if !enabled || self.records.is_empty() {
            return;
        }

        let finished_at = Instant::now();
        let id = match &self.tx_id {
            Some(id) => id.clone(),
            None => format!(
                "anonymous-{}",
                ANONYMOUS_COUNTER.fetch_add(1, Ordering::SeqCst) + 1
            ),
        };
        let trace_id = match &self.label {
            Some(label) => format!("{}-{}", label, id),
            None => id,
        };

        emit(
            emit_info,
            format!("Trace[{}] started at {}", trace_id, self.started_wall),
        );

        let mut last = self.started_at;
        let mut requests: u64 = 0;
        let mut requests_ms: u128 = 0;
        let mut last_is_request = false;
        for record in &self.records {
            if record.is_request {
                requests += 1;
                last_is_request = true;
                let flat = record.message.split_whitespace().collect::<Vec<_>>().join(" ");
                emit(emit_info, format!("Query[{}] {}", trace_id, flat));
            } else {
                let ms = record.at.duration_since(last).as_millis();
                if last_is_request {
                    requests_ms += ms;
                    last_is_request = false;
                }
                emit(
                    emit_info,
                    format!("Trace[{}] {} ms {}", trace_id, ms, record.message),
                );
                last = record.at;
            }
        }

        emit(
            emit_info,
            format!(
                "Trace[{}] finished in {} ms, {} requests take {} ms",
                trace_id,
                finished_at.duration_since(self.started_at).as_millis(),
                requests,
                requests_ms
            ),
        );
    }
}

fn emit(info: bool, line: String) {
    if info {
        tracing::info!("{}", line);
    } else {
        tracing::debug!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_id_dedups_unchanged_values() {
        let mut tracer = Tracer::new();
        tracer.set_id("tx1");
        tracer.set_id("tx1");
        assert_eq!(tracer.record_count(), 1);

        tracer.set_id("tx2");
        assert_eq!(tracer.record_count(), 2);
    }

    #[test]
    fn test_mark_to_print_is_idempotent() {
        let mut tracer = Tracer::new();
        tracer.mark_to_print("slow");
        tracer.mark_to_print("slow");
        assert_eq!(tracer.record_count(), 1);
        assert!(tracer.is_marked());

        tracer.mark_to_print("slower");
        assert_eq!(tracer.record_count(), 2);
    }

    #[test]
    fn test_close_consumes_empty_trace() {
        let tracer = Tracer::new();
        tracer.close();
    }

    #[test]
    fn test_records_keep_order() {
        let mut tracer = Tracer::new();
        tracer.query("SELECT 1");
        tracer.trace("response");
        tracer.query("SELECT 2");
        assert_eq!(tracer.record_count(), 3);
        tracer.close();
    }
}
