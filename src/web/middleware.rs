//! Caller identification middleware
//!
//! Authentication is handled by the host in front of this service. The host
//! forwards the signed-in user's capabilities in a request header, which this
//! layer parses into a [`Caller`] request extension for handlers to check.

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, Request},
    response::Response,
};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Capabilities the host granted to the current caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    capabilities: Vec<String>,
}

impl Caller {
    pub fn new(capabilities: Vec<String>) -> Self {
        Self { capabilities }
    }

    pub fn can(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    pub fn can_any(&self, capabilities: &[String]) -> bool {
        capabilities.iter().any(|c| self.can(c))
    }
}

/// Parse a comma separated capability header. Repeated headers are merged.
fn parse_capabilities(headers: &HeaderMap, header: &HeaderName) -> Vec<String> {
    headers
        .get_all(header)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Layer that attaches a [`Caller`] to every request
#[derive(Clone)]
pub struct CallerLayer {
    header: HeaderName,
}

impl CallerLayer {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }
}

impl<S> Layer<S> for CallerLayer {
    type Service = CallerMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CallerMiddleware {
            inner,
            header: self.header.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CallerMiddleware<S> {
    inner: S,
    header: HeaderName,
}

impl<S> Service<Request<Body>> for CallerMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let caller = Caller::new(parse_capabilities(request.headers(), &self.header));
        request.extensions_mut().insert(caller);

        // Take the service that was driven to readiness
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move { inner.call(request).await })
    }
}
