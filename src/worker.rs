use std::future::Future;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty};
use hyper::header;
use hyper::{Request, Response, StatusCode};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use tokio::time;

use crate::config::RunConfig;
use crate::error::TransportError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
pub type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

type Client = HyperClient<HttpsConnector<HttpConnector>, Empty<Bytes>>;

/// The "send one request, get a response back" capability the executor
/// depends on. Cloned into every task.
pub trait Transport: Clone + Send + Sync + 'static {
    fn send(
        &self,
        request: Request<Empty<Bytes>>,
    ) -> impl Future<Output = Result<Response<ResponseBody>, TransportError>> + Send;
}

/// Pooled hyper client over http and https.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client,
}

impl HyperTransport {
    pub fn new() -> Self {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        let https = HttpsConnector::new_with_connector(http);
        let client = HyperClient::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(30))
            .build(https);

        HyperTransport { client }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HyperTransport {
    async fn send(
        &self,
        request: Request<Empty<Bytes>>,
    ) -> Result<Response<ResponseBody>, TransportError> {
        let response = self.client.request(request).await?;
        Ok(response.map(|body| body.map_err(|err| Box::new(err) as BoxError).boxed_unsync()))
    }
}

/// What happened to a single request.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    pub duration: Duration,
    pub status: Option<StatusCode>,
    /// Set only when the body was read to the end.
    pub body_length: Option<u64>,
    pub transport_error: Option<String>,
    pub server: Option<String>,
    pub content_length: Option<u64>,
}

impl Outcome {
    pub fn is_transport_error(&self) -> bool {
        self.transport_error.is_some()
    }

    /// Statuses above 206 are counted against the run.
    pub fn is_non_success(&self) -> bool {
        self.status.is_some_and(|status| !is_accepted(status))
    }
}

pub fn is_accepted(status: StatusCode) -> bool {
    (100..=206).contains(&status.as_u16())
}

struct Exchange {
    status: StatusCode,
    server: Option<String>,
    content_length: Option<u64>,
    body_length: Option<u64>,
}

/// Send one request built from the configured template and measure it.
///
/// Timing starts right before the send and stops once the body has been
/// read or abandoned. The configured timeout covers both the send and the
/// body read; running out of time is a transport error. The response body
/// is dropped before returning.
pub async fn execute<T: Transport>(transport: &T, config: &RunConfig) -> Outcome {
    let start = Instant::now();

    let pending = exchange(transport, config);
    let result = match config.timeout {
        Some(limit) => time::timeout(limit, pending)
            .await
            .unwrap_or_else(|_| Err(TransportError::Timeout(limit))),
        None => pending.await,
    };
    let duration = start.elapsed();

    match result {
        Ok(exchange) => {
            tracing::debug!(
                status = exchange.status.as_u16(),
                bytes = exchange.body_length.unwrap_or_default(),
                elapsed = ?duration,
                "Request completed"
            );
            Outcome {
                duration,
                status: Some(exchange.status),
                body_length: exchange.body_length,
                transport_error: None,
                server: exchange.server,
                content_length: exchange.content_length,
            }
        }
        Err(err) => {
            tracing::debug!(error = %err, elapsed = ?duration, "Request error");
            Outcome {
                duration,
                transport_error: Some(err.to_string()),
                ..Outcome::default()
            }
        }
    }
}

async fn exchange<T: Transport>(
    transport: &T,
    config: &RunConfig,
) -> Result<Exchange, TransportError> {
    let request = config.template.build(&config.target)?;
    let response = transport.send(request).await?;

    let status = response.status();
    if !is_accepted(status) {
        tracing::debug!(status = status.as_u16(), "Non-success status");
    }
    let server = response
        .headers()
        .get(header::SERVER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let content_length = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());

    let body_length = match response.into_body().collect().await {
        Ok(collected) => Some(collected.to_bytes().len() as u64),
        Err(err) => {
            tracing::debug!(error = %err, status = status.as_u16(), "Failed to read body");
            None
        }
    };

    Ok(Exchange {
        status,
        server,
        content_length,
        body_length,
    })
}
