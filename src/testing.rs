//! In-process transport double for unit tests.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::Frame;
use hyper::header::{self, HeaderMap};
use hyper::{Request, Response};
use tokio::sync::Semaphore;

use crate::error::TransportError;
use crate::worker::{BoxError, ResponseBody, Transport};

#[derive(Debug, Clone)]
pub enum Step {
    Respond {
        status: u16,
        body_len: usize,
        server: Option<String>,
    },
    Refuse,
    /// Headers arrive, then the body errors half way.
    BrokenBody(u16),
    /// Headers arrive, then the body never finishes.
    StalledBody(u16),
}

impl Step {
    pub fn respond(status: u16, body_len: usize) -> Self {
        Step::Respond {
            status,
            body_len,
            server: None,
        }
    }

    pub fn with_server(self, name: &str) -> Self {
        match self {
            Step::Respond {
                status, body_len, ..
            } => Step::Respond {
                status,
                body_len,
                server: Some(name.to_owned()),
            },
            other => other,
        }
    }
}

type Script = Box<dyn Fn(usize) -> Step + Send + Sync>;

struct Inner {
    script: Script,
    gate: Option<Arc<Semaphore>>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    completed: AtomicUsize,
    // completed count observed by each call as it started
    starts: Mutex<Vec<usize>>,
    seen_headers: Mutex<Vec<HeaderMap>>,
}

#[derive(Clone)]
pub struct ScriptedTransport {
    inner: Arc<Inner>,
}

impl ScriptedTransport {
    pub fn new(step: Step) -> Self {
        Self::scripted(move |_| step.clone())
    }

    /// `script` receives the zero-based call index.
    pub fn scripted(script: impl Fn(usize) -> Step + Send + Sync + 'static) -> Self {
        Self::build(Box::new(script), None, Duration::ZERO)
    }

    /// Every call waits for one permit from `gate` before answering.
    pub fn gated(step: Step, gate: Arc<Semaphore>) -> Self {
        Self::build(Box::new(move |_| step.clone()), Some(gate), Duration::ZERO)
    }

    pub fn delayed(step: Step, delay: Duration) -> Self {
        Self::build(Box::new(move |_| step.clone()), None, delay)
    }

    fn build(script: Script, gate: Option<Arc<Semaphore>>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                script,
                gate,
                delay,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
                starts: Mutex::new(Vec::new()),
                seen_headers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> Vec<usize> {
        self.inner.starts.lock().unwrap().clone()
    }

    pub fn seen_headers(&self) -> Vec<HeaderMap> {
        self.inner.seen_headers.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: Request<Empty<Bytes>>,
    ) -> Result<Response<ResponseBody>, TransportError> {
        let inner = &self.inner;
        inner.seen_headers.lock().unwrap().push(request.headers().clone());
        inner
            .starts
            .lock()
            .unwrap()
            .push(inner.completed.load(Ordering::SeqCst));
        let index = inner.calls.fetch_add(1, Ordering::SeqCst);
        let now = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &inner.gate {
            gate.acquire().await.unwrap().forget();
        }
        if !inner.delay.is_zero() {
            tokio::time::sleep(inner.delay).await;
        }

        let result = respond((inner.script)(index));
        inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        inner.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}

fn respond(step: Step) -> Result<Response<ResponseBody>, TransportError> {
    match step {
        Step::Respond {
            status,
            body_len,
            server,
        } => {
            let mut builder = Response::builder()
                .status(status)
                .header(header::CONTENT_LENGTH, body_len);
            if let Some(server) = server {
                builder = builder.header(header::SERVER, server);
            }
            let body = Full::new(Bytes::from(vec![b'x'; body_len]))
                .map_err(|never| -> BoxError { match never {} })
                .boxed_unsync();
            Ok(builder.body(body)?)
        }
        Step::Refuse => Err(TransportError::Io(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "connection refused",
        ))),
        Step::BrokenBody(status) => {
            let frames: Vec<Result<Frame<Bytes>, BoxError>> = vec![
                Ok(Frame::data(Bytes::from_static(b"partial"))),
                Err(Box::new(io::Error::new(io::ErrorKind::UnexpectedEof, "reset"))),
            ];
            let body = StreamBody::new(stream::iter(frames)).boxed_unsync();
            Ok(Response::builder().status(status).body(body)?)
        }
        Step::StalledBody(status) => {
            let first = stream::iter(vec![Ok::<_, BoxError>(Frame::data(Bytes::from_static(
                b"ab",
            )))]);
            let body = StreamBody::new(first.chain(stream::pending())).boxed_unsync();
            Ok(Response::builder()
                .status(status)
                .header(header::CONTENT_LENGTH, 10)
                .body(body)?)
        }
    }
}
