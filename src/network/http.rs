//! HTTP(S) client bound to one device endpoint.
//!
//! GET responses are cached per (scheme, port, path) for the lifetime of the
//! client, so the several recipes reading one status page share a fetch.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::hints::HttpSettings;
use crate::error::{Error, Result};

/// Characters escaped inside one path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'%')
    .add(b'/');

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

type CacheKey = (Scheme, u16, String);

#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    scheme: Scheme,
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    content_type: Option<String>,
    cache: Arc<Mutex<HashMap<CacheKey, HttpResponse>>>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Percent-encode each `/`-separated segment of `path`.
pub fn encode_path(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    let mut out = String::with_capacity(path.len() + 1);
    for segment in trimmed.split('/') {
        out.push('/');
        out.extend(utf8_percent_encode(segment, SEGMENT));
    }
    out
}

impl HttpClient {
    pub fn new(
        ip: IpAddr,
        scheme: Scheme,
        port: u16,
        settings: &HttpSettings,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(settings.insecure_skip_verify)
            .timeout(timeout)
            .build()
            .map_err(|source| {
                Error::Http {
                    url: format!("{}://{ip}:{port}", scheme.as_str()).into(),
                    source,
                }
                .boxed()
            })?;
        let host = match ip {
            IpAddr::V4(v4) => v4.to_string(),
            IpAddr::V6(v6) => format!("[{v6}]"),
        };
        Ok(Self {
            client,
            scheme,
            host,
            port,
            username: settings.username.clone(),
            password: settings.password.clone(),
            content_type: None,
            cache: Arc::default(),
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Same endpoint and cache, different `Content-Type`.
    pub fn with_content_type(&self, content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            ..self.clone()
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme.as_str(),
            self.host,
            self.port,
            encode_path(path)
        )
    }

    /// Send one request and return whatever the server answered.
    pub async fn send(&self, method: Method, path: &str, body: Option<String>) -> Result<HttpResponse> {
        let url = self.url(path);
        let mut request = self.client.request(method, &url);
        if let Some(user) = &self.username {
            request = request.basic_auth(user, self.password.as_ref());
        }
        if let Some(content_type) = &self.content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        if let Some(body) = body {
            request = request.body(body);
        }
        let to_error = |source: reqwest::Error| {
            Error::Http {
                url: url.clone().into(),
                source,
            }
            .boxed()
        };
        let response = request.send().await.map_err(to_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(to_error)?;
        tracing::trace!(target: "async_devmon::network", { http.url = %url, http.status = status }, "http response");
        Ok(HttpResponse { status, body })
    }

    /// Cached GET; fails on a non-success status.
    pub async fn get(&self, path: &str) -> Result<HttpResponse> {
        let key = (self.scheme, self.port, path.to_owned());
        if let Some(hit) = self.cache.lock().get(&key).cloned() {
            return Ok(hit);
        }
        let response = self.send(Method::GET, path, None).await?;
        if !(200..300).contains(&response.status) {
            return Err(Error::HttpStatus {
                url: self.url(path).into(),
                status: response.status,
            }
            .boxed());
        }
        self.cache.lock().insert(key, response.clone());
        Ok(response)
    }

    /// Reachability check: any HTTP answer counts.
    pub async fn probe(&self) -> Result<()> {
        self.send(Method::GET, "/", None).await.map(|_| ())
    }
}

/// Connection data that reproduces a working HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConnectionData {
    pub scheme: Scheme,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_password: Option<String>,
}

impl From<&HttpClient> for HttpConnectionData {
    fn from(client: &HttpClient) -> Self {
        Self {
            scheme: client.scheme,
            port: client.port,
            auth_username: client.username.clone(),
            auth_password: client.password.clone(),
        }
    }
}
