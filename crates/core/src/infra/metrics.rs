use parking_lot::Mutex;
use serde::Serialize;

use crate::domain::error::ErrorCode;

const MAX_LATENCY_RECORDS: usize = 1000;

/// ローカルメトリクス収集器
pub struct Metrics {
    counters: Mutex<MetricsCounters>,
    latencies: Mutex<Vec<LatencyRecord>>,
}

#[derive(Debug, Default)]
struct MetricsCounters {
    submissions_started: u64,
    submissions_succeeded: u64,
    submissions_failed: u64,
    errors_no_input: u64,
    errors_in_flight: u64,
    errors_unknown_label: u64,
    errors_internal: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyRecord {
    pub phase: String,
    pub duration_ms: u64,
    pub timestamp: String,
}

/// メトリクスサマリー
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub submissions_started: u64,
    pub submissions_succeeded: u64,
    pub submissions_failed: u64,
    pub error_counts: ErrorCounts,
    pub avg_analyze_latency_ms: Option<f64>,
    pub recent_latencies: Vec<LatencyRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorCounts {
    pub no_input: u64,
    pub in_flight: u64,
    pub unknown_label: u64,
    pub internal: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(MetricsCounters::default()),
            latencies: Mutex::new(Vec::new()),
        }
    }

    pub fn inc_submissions_started(&self) {
        self.counters.lock().submissions_started += 1;
    }

    pub fn inc_submissions_succeeded(&self) {
        self.counters.lock().submissions_succeeded += 1;
    }

    pub fn inc_submissions_failed(&self) {
        self.counters.lock().submissions_failed += 1;
    }

    pub fn inc_error(&self, code: ErrorCode) {
        let mut c = self.counters.lock();
        match code {
            ErrorCode::NoInputProvided => c.errors_no_input += 1,
            ErrorCode::SubmissionInFlight => c.errors_in_flight += 1,
            ErrorCode::UnknownLabel => c.errors_unknown_label += 1,
            // 失敗は submissions_failed で数える
            ErrorCode::AnalysisRequestFailed => {}
            ErrorCode::InvalidState | ErrorCode::Internal => c.errors_internal += 1,
        }
    }

    pub fn record_latency(&self, phase: &str, duration_ms: u64) {
        let record = LatencyRecord {
            phase: phase.to_string(),
            duration_ms,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let mut latencies = self.latencies.lock();
        latencies.push(record);
        if latencies.len() > MAX_LATENCY_RECORDS {
            let excess = latencies.len() - MAX_LATENCY_RECORDS;
            latencies.drain(0..excess);
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let c = self.counters.lock();
        let latencies = self.latencies.lock();

        let analyze: Vec<f64> = latencies
            .iter()
            .filter(|r| r.phase == "analyze")
            .map(|r| r.duration_ms as f64)
            .collect();
        let avg = if analyze.is_empty() {
            None
        } else {
            Some(analyze.iter().sum::<f64>() / analyze.len() as f64)
        };

        let recent: Vec<LatencyRecord> = latencies.iter().rev().take(20).cloned().collect();

        MetricsSummary {
            submissions_started: c.submissions_started,
            submissions_succeeded: c.submissions_succeeded,
            submissions_failed: c.submissions_failed,
            error_counts: ErrorCounts {
                no_input: c.errors_no_input,
                in_flight: c.errors_in_flight,
                unknown_label: c.errors_unknown_label,
                internal: c.errors_internal,
            },
            avg_analyze_latency_ms: avg,
            recent_latencies: recent,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
