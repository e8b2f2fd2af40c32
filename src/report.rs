use std::fmt;
use std::time::Duration;

use hdrhistogram::Histogram;

use crate::config::RunConfig;
use crate::stats::Snapshot;

/// Derived figures for a finished run.
///
/// Rates are `None` when they would divide by zero (no elapsed time or no
/// issued requests) and render as `n/a`.
#[derive(Debug, Clone)]
pub struct Report {
    pub url: String,
    pub server_software: Option<String>,
    pub document_length: Option<u64>,
    pub seconds: f64,
    pub requests_issued: u64,
    pub errors: u64,
    pub failure_percent: Option<f64>,
    pub slowest: f64,
    pub fastest: f64,
    pub percentiles: Percentiles,
    pub concurrency: usize,
    pub requests_per_second: Option<f64>,
    pub time_per_request: Option<f64>,
    pub total_transferred: u64,
    pub transfer_rate_kb_per_sec: Option<f64>,
    pub non_success: u64,
    pub non_success_statuses: Vec<u16>,
}

/// Latency percentiles in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Percentiles {
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

impl Report {
    pub fn from_snapshot(snapshot: &Snapshot, config: &RunConfig) -> Self {
        let state = &snapshot.state;
        let seconds = snapshot.elapsed.as_secs_f64();
        let issued = snapshot.requests_issued;

        let per_second = |value: f64| (seconds > 0.0).then(|| value / seconds);

        Report {
            url: config.url.to_string(),
            server_software: state.server_software.clone(),
            document_length: state.document_length,
            seconds,
            requests_issued: issued,
            errors: state.errors,
            failure_percent: (issued > 0)
                .then(|| state.errors as f64 / issued as f64 * 100.0),
            slowest: state
                .latencies
                .iter()
                .max()
                .map_or(0.0, Duration::as_secs_f64),
            fastest: state
                .latencies
                .iter()
                .min()
                .map_or(0.0, Duration::as_secs_f64),
            percentiles: percentiles(&state.latencies),
            concurrency: config.concurrency,
            requests_per_second: per_second(config.total_requests as f64),
            time_per_request: (seconds > 0.0 && issued > 0)
                .then(|| config.concurrency as f64 * seconds / issued as f64),
            total_transferred: state.bytes_transferred,
            transfer_rate_kb_per_sec: per_second(state.bytes_read as f64 / 1024.0),
            non_success: state.non_success,
            non_success_statuses: state.non_success_statuses.iter().copied().collect(),
        }
    }
}

fn percentiles(latencies: &[Duration]) -> Percentiles {
    let Ok(mut histogram) = Histogram::<u64>::new(3) else {
        return Percentiles::default();
    };
    for latency in latencies {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        histogram.saturating_record(micros);
    }
    if histogram.is_empty() {
        return Percentiles::default();
    }

    let at = |quantile: f64| histogram.value_at_quantile(quantile) as f64 / 1_000_000.0;
    Percentiles {
        p50: at(0.5),
        p90: at(0.9),
        p99: at(0.99),
    }
}

struct Rate(Option<f64>, usize);

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{:.*}", self.1, value),
            None => f.write_str("n/a"),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Document Path: {}", self.url)?;
        writeln!(
            f,
            "Server Software: {}",
            self.server_software.as_deref().unwrap_or("")
        )?;
        if let Some(length) = self.document_length {
            writeln!(f, "Document Length: {} bytes", length)?;
        }
        writeln!(f, "Time taken for tests: {:.3} seconds", self.seconds)?;
        writeln!(
            f,
            "Completed requests: {}, Failed requests: {}%",
            self.requests_issued,
            Rate(self.failure_percent, 1)
        )?;
        writeln!(
            f,
            "Slowest response: {:.2} secs, Fastest response: {:.2} secs",
            self.slowest, self.fastest
        )?;
        writeln!(
            f,
            "Latency p50: {:.3} secs, p90: {:.3} secs, p99: {:.3} secs",
            self.percentiles.p50, self.percentiles.p90, self.percentiles.p99
        )?;
        writeln!(f, "Concurrency: {}", self.concurrency)?;
        writeln!(f, "Requests per second: {}", Rate(self.requests_per_second, 2))?;
        writeln!(f, "Time per request: {} secs", Rate(self.time_per_request, 2))?;
        writeln!(f, "Total Transfer: {} bytes", self.total_transferred)?;
        writeln!(
            f,
            "Transfer rate: {} KB/sec",
            Rate(self.transfer_rate_kb_per_sec, 3)
        )?;
        if self.non_success > 0 {
            let statuses: Vec<String> = self
                .non_success_statuses
                .iter()
                .map(u16::to_string)
                .collect();
            writeln!(
                f,
                "Non-success responses (>206): {} (statuses: {})",
                self.non_success,
                statuses.join(", ")
            )?;
        }
        Ok(())
    }
}
