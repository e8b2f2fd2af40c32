//! Batch dispatcher and run controller.
//!
//! A run is a sequence of batches. Each batch spawns `concurrency` request
//! tasks on the multi-thread runtime and waits for all of them before the
//! next one starts. The loop stops once the issued count reaches the
//! configured total, so the last batch can overshoot by up to
//! `concurrency - 1` requests.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;

use crate::config::RunConfig;
use crate::error::RunError;
use crate::stats::{Aggregator, Snapshot};
use crate::worker::{self, Transport};

pub struct Dispatcher<T> {
    transport: T,
    config: Arc<RunConfig>,
    aggregator: Arc<Aggregator>,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(transport: T, config: Arc<RunConfig>, aggregator: Arc<Aggregator>) -> Self {
        Self {
            transport,
            config,
            aggregator,
        }
    }

    /// Run one batch of `concurrency` requests and wait for every one of them.
    ///
    /// # Errors
    ///
    /// Returns an error if a request task panicked or was cancelled.
    pub async fn run_batch(&self) -> Result<(), RunError> {
        let mut handles = Vec::with_capacity(self.config.concurrency);

        for _ in 0..self.config.concurrency {
            let transport = self.transport.clone();
            let config = Arc::clone(&self.config);
            let aggregator = Arc::clone(&self.aggregator);

            handles.push(tokio::spawn(async move {
                aggregator.begin_request();
                let outcome = worker::execute(&transport, &config).await;
                aggregator.record(&outcome);
            }));
        }

        for joined in join_all(handles).await {
            joined?;
        }
        Ok(())
    }

    /// Keep running batches until the issued count reaches the configured total.
    ///
    /// # Errors
    ///
    /// Returns an error if any batch fails.
    pub async fn run(&self) -> Result<(), RunError> {
        let mut batches = 0u64;
        while self.aggregator.requests_issued() < self.config.total_requests {
            self.run_batch().await?;
            batches += 1;
            tracing::debug!(
                batch = batches,
                issued = self.aggregator.requests_issued(),
                "Batch finished"
            );
        }
        Ok(())
    }
}

/// Drive a whole run and return the frozen result.
///
/// # Errors
///
/// Returns an error if a request task failed to complete.
pub async fn run<T: Transport>(config: Arc<RunConfig>, transport: T) -> Result<Snapshot, RunError> {
    let aggregator = Arc::new(Aggregator::new());
    let dispatcher = Dispatcher::new(transport, Arc::clone(&config), Arc::clone(&aggregator));

    tracing::info!(
        url = %config.url,
        requests = config.total_requests,
        concurrency = config.concurrency,
        "Starting run"
    );
    let start = Instant::now();
    dispatcher.run().await?;
    let elapsed = start.elapsed();

    Ok(aggregator.snapshot(elapsed))
}
