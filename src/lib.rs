//! Fixed-count HTTP load generation: send N requests to one URL in batches
//! of C concurrent requests and summarise latency, bytes and failures.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod report;
pub mod stats;
pub mod worker;

#[cfg(test)]
mod testing;

pub use config::RunConfig;
pub use dispatch::{run, Dispatcher};
pub use error::{ConfigError, RunError, TransportError};
pub use report::Report;
pub use stats::{Aggregator, Snapshot};
pub use worker::{execute, HyperTransport, Outcome, Transport};
