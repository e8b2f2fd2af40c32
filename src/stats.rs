use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::worker::Outcome;

/// Everything observed during a run. Only mutated through [`Aggregator::record`].
#[derive(Debug, Clone, Default)]
pub struct RunState {
    pub errors: u64,
    pub non_success: u64,
    pub non_success_statuses: BTreeSet<u16>,
    pub bytes_transferred: u64,
    pub bytes_read: u64,
    pub latencies: Vec<Duration>,
    pub server_software: Option<String>,
    pub document_length: Option<u64>,
    pub(crate) first_response_seen: bool,
}

/// Frozen view of a finished run.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub requests_issued: u64,
    pub elapsed: Duration,
    pub state: RunState,
}

/// Shared accumulator for every request of a run.
///
/// The issued counter is a plain atomic so the dispatcher can read progress
/// without touching the lock; everything an outcome touches is updated in
/// one critical section.
#[derive(Debug, Default)]
pub struct Aggregator {
    issued: AtomicU64,
    state: Mutex<RunState>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a request as issued. Returns the new total.
    pub fn begin_request(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn requests_issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    pub fn record(&self, outcome: &Outcome) {
        metrics::counter!("rustab_requests_total").increment(1);

        let mut state = self.lock();
        if outcome.is_transport_error() {
            state.errors += 1;
            metrics::counter!("rustab_transport_errors_total").increment(1);
            return;
        }

        if let Some(status) = outcome.status.filter(|_| outcome.is_non_success()) {
            state.non_success += 1;
            state.non_success_statuses.insert(status.as_u16());
            metrics::counter!("rustab_non_success_total").increment(1);
        }

        if let Some(length) = outcome.body_length {
            state.bytes_read += length;
            state.bytes_transferred += length;
            metrics::counter!("rustab_bytes_read_total").increment(length);

            // first fully read response wins, even without a Server header
            if !state.first_response_seen {
                state.first_response_seen = true;
                state.server_software = outcome.server.clone();
                state.document_length = outcome.content_length;
            }
        }

        state.latencies.push(outcome.duration);
        metrics::histogram!("rustab_request_duration_seconds")
            .record(outcome.duration.as_secs_f64());
    }

    /// Copy out the accumulated state. Call once every request task has been joined.
    pub fn snapshot(&self, elapsed: Duration) -> Snapshot {
        Snapshot {
            requests_issued: self.requests_issued(),
            elapsed,
            state: self.lock().clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
