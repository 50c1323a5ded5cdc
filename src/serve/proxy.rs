// src/serve/proxy.rs

//! Upstream proxy for the dev server.
//!
//! Requests go out through hyper's pooled HTTP/1 client. Waiting on the
//! upstream (response head and, for pages, the buffered body) is bounded by
//! a timeout. `Accept-Encoding` is dropped so HTML comes back uncompressed
//! and the reload script can be injected.

use std::fmt;
use std::time::Duration;

use axum::body::{Body, Bytes, to_bytes};
use axum::http::{HeaderMap, HeaderValue, Request, Response, Uri, Version, header};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use tracing::debug;

use crate::errors::{PipelineError, Result};

/// How long the upstream may take before the request fails with 504.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_BODY: usize = 16 * 1024 * 1024;

const HOP_HEADERS: [header::HeaderName; 7] = [
    header::CONNECTION,
    header::HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// `host[:port]` of the proxied site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub host: String,
    pub port: u16,
}

impl Upstream {
    /// Accepts `host`, `host:port` and `http://host[:port][/]`.
    pub fn parse(target: &str) -> Result<Self> {
        let target = target.trim();
        if target.starts_with("https://") {
            return Err(PipelineError::config(format!(
                "proxy target {target:?}: https upstreams are not supported"
            )));
        }
        let authority = target
            .trim_start_matches("http://")
            .split('/')
            .next()
            .unwrap_or_default();
        if authority.is_empty() {
            return Err(PipelineError::config("proxy target is empty"));
        }

        match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| PipelineError::config(format!("proxy target {target:?}: invalid port")))?;
                Ok(Self {
                    host: host.to_string(),
                    port,
                })
            }
            None => Ok(Self {
                host: authority.to_string(),
                port: 80,
            }),
        }
    }

    fn host_header(&self) -> String {
        if self.port == 80 {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Why a proxied request produced no upstream response.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("upstream {upstream} did not answer within {timeout:?}")]
    Timeout { upstream: String, timeout: Duration },

    #[error("upstream {upstream} unavailable: {message}")]
    Unavailable { upstream: String, message: String },
}

impl ProxyError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProxyError::Timeout { .. })
    }
}

/// Forwards dev-server requests to one upstream.
#[derive(Clone)]
pub struct Proxy {
    upstream: Upstream,
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("upstream", &self.upstream)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Proxy {
    pub fn new(upstream: Upstream) -> Self {
        Self::with_timeout(upstream, UPSTREAM_TIMEOUT)
    }

    pub fn with_timeout(upstream: Upstream, timeout: Duration) -> Self {
        Self {
            upstream,
            client: Client::builder(TokioExecutor::new()).build_http(),
            timeout,
        }
    }

    pub fn upstream(&self) -> &Upstream {
        &self.upstream
    }

    /// Send `request` upstream and wait for the response head. The body is
    /// left streaming; use [`Proxy::collect`] to buffer it.
    pub async fn forward(&self, request: Request<Body>) -> std::result::Result<Response<Body>, ProxyError> {
        let (mut parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        parts.uri = Uri::try_from(format!("http://{}{path_and_query}", self.upstream))
            .map_err(|e| self.unavailable(e))?;
        parts.version = Version::HTTP_11;
        strip_hop_headers(&mut parts.headers);
        parts.headers.remove(header::ACCEPT_ENCODING);
        let host = HeaderValue::from_str(&self.upstream.host_header()).map_err(|e| self.unavailable(e))?;
        parts.headers.insert(header::HOST, host);

        let pending = self.client.request(Request::from_parts(parts, body));
        let response = tokio::time::timeout(self.timeout, pending)
            .await
            .map_err(|_| self.timed_out())?
            .map_err(|e| self.unavailable(e))?;

        let (mut parts, body) = response.into_parts();
        strip_hop_headers(&mut parts.headers);
        debug!(upstream = %self.upstream, path = %path_and_query, status = %parts.status, "proxied");
        Ok(Response::from_parts(parts, Body::new(body)))
    }

    /// Buffer a response body from [`Proxy::forward`] under the same timeout.
    pub async fn collect(&self, body: Body) -> std::result::Result<Bytes, ProxyError> {
        tokio::time::timeout(self.timeout, to_bytes(body, MAX_BODY))
            .await
            .map_err(|_| self.timed_out())?
            .map_err(|e| self.unavailable(e))
    }

    fn timed_out(&self) -> ProxyError {
        ProxyError::Timeout {
            upstream: self.upstream.to_string(),
            timeout: self.timeout,
        }
    }

    fn unavailable(&self, e: impl fmt::Display) -> ProxyError {
        ProxyError::Unavailable {
            upstream: self.upstream.to_string(),
            message: e.to_string(),
        }
    }
}

fn strip_hop_headers(headers: &mut HeaderMap) {
    for name in &HOP_HEADERS {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn upstream_forms() {
        assert_eq!(
            Upstream::parse("shopia-Semen.loc").unwrap(),
            Upstream { host: "shopia-Semen.loc".into(), port: 80 }
        );
        assert_eq!(Upstream::parse("http://localhost:8080/").unwrap().port, 8080);
        assert!(Upstream::parse("https://example.com").unwrap_err().is_fatal());
        assert!(Upstream::parse("host:notaport").is_err());
    }

    #[tokio::test]
    async fn silent_upstream_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // Accept and hold the connection without ever answering.
        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let proxy = Proxy::with_timeout(
            Upstream { host: "127.0.0.1".into(), port },
            Duration::from_millis(200),
        );
        let request = Request::get("/slow").body(Body::empty()).unwrap();
        let err = proxy.forward(request).await.unwrap_err();
        assert!(err.is_timeout(), "{err}");
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let proxy = Proxy::new(Upstream { host: "127.0.0.1".into(), port });
        let request = Request::get("/").body(Body::empty()).unwrap();
        let err = proxy.forward(request).await.unwrap_err();
        assert!(!err.is_timeout());
    }
}
