//! Run configuration: the immutable description of what to hit, how hard,
//! and with which request template.

use std::fs;
use std::path::Path;
use std::time::Duration;

use base64::Engine as _;
use bytes::Bytes;
use http_body_util::Empty;
use hyper::header::{self, HeaderName, HeaderValue};
use hyper::{Method, Request, Uri};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// Upper bound for `-c`. Every slot is a spawned task per batch.
pub const MAX_CONCURRENCY: usize = 100_000;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub url: Url,
    pub target: Uri,
    pub total_requests: u64,
    pub concurrency: usize,
    pub timeout: Option<Duration>,
    pub template: RequestTemplate,
}

impl RunConfig {
    /// Validate `url` and build a configuration with the default template.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse, is not http(s), either
    /// count is zero, or concurrency exceeds [`MAX_CONCURRENCY`].
    pub fn new(url: &str, total_requests: u64, concurrency: usize) -> Result<Self, ConfigError> {
        if total_requests == 0 || concurrency == 0 {
            return Err(ConfigError::NonPositiveCount);
        }
        if concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::ConcurrencyTooHigh {
                requested: concurrency,
                max: MAX_CONCURRENCY,
            });
        }
        let parsed = Url::parse(url).map_err(|source| ConfigError::InvalidUrl {
            url: url.to_owned(),
            source,
        })?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ConfigError::UnsupportedScheme {
                    scheme: other.to_owned(),
                })
            }
        }
        let target = parsed
            .as_str()
            .parse::<Uri>()
            .map_err(|source| ConfigError::InvalidTarget {
                url: url.to_owned(),
                source,
            })?;

        Ok(Self {
            url: parsed,
            target,
            total_requests,
            concurrency,
            timeout: None,
            template: RequestTemplate::default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Everything needed to stamp out one request. Built once, shared by every task.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    pub method: Method,
    pub content_type: HeaderValue,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub cookies: Vec<Cookie>,
    pub credentials: Option<Credentials>,
}

impl Default for RequestTemplate {
    fn default() -> Self {
        Self {
            method: Method::GET,
            content_type: HeaderValue::from_static(DEFAULT_CONTENT_TYPE),
            headers: Vec::new(),
            cookies: Vec::new(),
            credentials: None,
        }
    }
}

impl RequestTemplate {
    /// Build a request for `target`.
    ///
    /// Custom headers are appended in order, so repeated names accumulate
    /// instead of replacing each other.
    ///
    /// # Errors
    ///
    /// Returns an error if the request builder rejects any part.
    pub fn build(&self, target: &Uri) -> Result<Request<Empty<Bytes>>, hyper::http::Error> {
        let mut builder = Request::builder()
            .method(self.method.clone())
            .uri(target.clone())
            .header(header::CONTENT_TYPE, self.content_type.clone());

        if let Some(cookie) = self.cookie_header() {
            builder = builder.header(header::COOKIE, cookie);
        }
        if let Some(credentials) = &self.credentials {
            let token = format!("{}:{}", credentials.username, credentials.password);
            let encoded = base64::engine::general_purpose::STANDARD.encode(token.as_bytes());
            builder = builder.header(header::AUTHORIZATION, format!("Basic {}", encoded));
        }
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }

        builder.body(Empty::<Bytes>::new())
    }

    fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect();
        Some(pairs.join("; "))
    }
}

/// Parse a `-T` content type.
///
/// # Errors
///
/// Returns an error if the value is not a legal header value.
pub fn parse_content_type(value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|source| ConfigError::InvalidHeaderValue {
        name: header::CONTENT_TYPE.as_str().to_owned(),
        source,
    })
}

/// Parse `name:value;name2:value2`. Each item splits at its first colon,
/// so values may themselves contain colons.
///
/// # Errors
///
/// Returns an error for an item with no colon or an invalid name/value.
pub fn parse_headers(line: &str) -> Result<Vec<(HeaderName, HeaderValue)>, ConfigError> {
    let mut headers = Vec::new();
    for item in line.split(';') {
        if item.trim().is_empty() {
            continue;
        }
        let (name, value) = item
            .split_once(':')
            .ok_or_else(|| ConfigError::MalformedHeader {
                item: item.to_owned(),
            })?;
        let name = name.trim();
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|source| {
                ConfigError::InvalidHeaderName {
                    name: name.to_owned(),
                    source,
                }
            })?;
        let header_value = HeaderValue::from_str(value.trim()).map_err(|source| {
            ConfigError::InvalidHeaderValue {
                name: name.to_owned(),
                source,
            }
        })?;
        headers.push((header_name, header_value));
    }
    Ok(headers)
}

/// Parse `user:password`. Anything that does not yield two non-empty halves
/// means no credentials; a warning is logged and the run goes ahead.
pub fn parse_basic_auth(raw: &str) -> Option<Credentials> {
    match raw.split_once(':') {
        Some((username, password)) if !username.is_empty() && !password.is_empty() => {
            Some(Credentials {
                username: username.to_owned(),
                password: password.to_owned(),
            })
        }
        _ => {
            tracing::warn!("Ignoring basic auth, expected username:password");
            None
        }
    }
}

/// Parse one cookie line such as `session=abc; path=/; domain=example.com`.
/// `line_no` is only used for error messages.
///
/// # Errors
///
/// Returns an error if an item has no `=` or the line names no cookie.
pub fn parse_cookie_line(line: &str, line_no: usize) -> Result<Cookie, ConfigError> {
    let mut name = None;
    let mut value = String::new();
    let mut path = None;
    let mut domain = None;

    for option in line.split(';') {
        if option.trim().is_empty() {
            continue;
        }
        let (key, val) = option
            .split_once('=')
            .ok_or_else(|| ConfigError::MalformedCookie {
                line: line_no,
                reason: format!("'{}' is not a key=value pair", option.trim()),
            })?;
        match key.trim() {
            "path" => path = Some(val.trim().to_owned()),
            "domain" => domain = Some(val.trim().to_owned()),
            other => {
                name = Some(other.to_owned());
                value = val.trim().to_owned();
            }
        }
    }

    let name = name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ConfigError::MalformedCookie {
            line: line_no,
            reason: "no cookie name".to_owned(),
        })?;

    Ok(Cookie {
        name,
        value,
        path,
        domain,
    })
}

/// Read a cookie file, one cookie per line. Blank lines are skipped.
///
/// # Errors
///
/// Returns an error if the file cannot be read or any line is malformed.
pub fn parse_cookie_file(path: &Path) -> Result<Vec<Cookie>, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadCookieFile {
        path: path.to_path_buf(),
        source,
    })?;

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| parse_cookie_line(line, idx + 1))
        .collect()
}
