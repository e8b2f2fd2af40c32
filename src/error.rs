use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Problems found while turning command-line input into a [`RunConfig`](crate::config::RunConfig).
/// All of them are raised before the first request is sent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Unsupported URL scheme '{scheme}', expected http or https.")]
    UnsupportedScheme { scheme: String },
    #[error("URL '{url}' is not a valid request target: {source}")]
    InvalidTarget {
        url: String,
        #[source]
        source: hyper::http::uri::InvalidUri,
    },
    #[error("Request count and concurrency must be positive.")]
    NonPositiveCount,
    #[error("Concurrency {requested} is above the supported maximum of {max}.")]
    ConcurrencyTooHigh { requested: usize, max: usize },
    #[error("Header '{item}' is missing a ':' separator.")]
    MalformedHeader { item: String },
    #[error("Invalid header name '{name}': {source}")]
    InvalidHeaderName {
        name: String,
        #[source]
        source: hyper::header::InvalidHeaderName,
    },
    #[error("Invalid value for header '{name}': {source}")]
    InvalidHeaderValue {
        name: String,
        #[source]
        source: hyper::header::InvalidHeaderValue,
    },
    #[error("Failed to read cookie file '{path}': {source}")]
    ReadCookieFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed cookie on line {line}: {reason}")]
    MalformedCookie { line: usize, reason: String },
}

/// Failure to get a response out of the HTTP client.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Client(#[from] hyper_util::client::legacy::Error),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Failed to build request: {0}")]
    InvalidRequest(#[from] hyper::http::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Request task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),
}
