//! Response decoration for axum routers.
//!
//! Two attachment modes:
//! - [`LifecycleLayer`], a tower layer for a single route:
//!   `get(handler).layer(lifecycle.into_layer()?)`
//! - [`lifecycle_middleware`], a router-wide middleware driven by a
//!   [`LifecycleRegistry`], attached with
//!   `axum::middleware::from_fn_with_state`.
//!
//! Both run the wrapped handler untouched and merge the precomputed
//! lifecycle headers into whatever response it produced.

use crate::config::{HeaderSettings, Lifecycle, LifecycleError, LifecycleRegistry};
use crate::headers::LifecycleHeaders;
use crate::metrics::LifecycleMetrics;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::{debug, info, warn};

impl Lifecycle {
    /// Turn the metadata into a per-route layer.
    ///
    /// Validation and header rendering happen here, once; the per-request
    /// cost is a header merge.
    pub fn into_layer(self) -> Result<LifecycleLayer, LifecycleError> {
        LifecycleLayer::new(&self)
    }
}

/// Tower layer that attaches lifecycle headers to a single route.
#[derive(Debug, Clone)]
pub struct LifecycleLayer {
    headers: LifecycleHeaders,
}

impl LifecycleLayer {
    /// Validate the metadata and render its headers.
    pub fn new(lifecycle: &Lifecycle) -> Result<Self, LifecycleError> {
        lifecycle.validate()?;
        let headers = LifecycleHeaders::render(lifecycle, None, &HeaderSettings::default())?;
        Ok(Self { headers })
    }

    /// The headers this layer will attach.
    pub fn headers(&self) -> &LifecycleHeaders {
        &self.headers
    }
}

impl<S> Layer<S> for LifecycleLayer {
    type Service = LifecycleService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LifecycleService {
            inner,
            headers: self.headers.clone(),
        }
    }
}

/// Service produced by [`LifecycleLayer`].
#[derive(Debug, Clone)]
pub struct LifecycleService<S> {
    inner: S,
    headers: LifecycleHeaders,
}

impl<S> Service<Request<Body>> for LifecycleService<S>
where
    S: Service<Request<Body>, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let headers = self.headers.clone();
        let future = self.inner.call(request);
        Box::pin(async move {
            let mut response = future.await?;
            headers.apply(response.headers_mut());
            Ok(response)
        })
    }
}

/// Shared state for [`lifecycle_middleware`]: a compiled registry, the
/// headers rendered for each rule, and the usage metrics.
pub struct LifecycleState {
    registry: LifecycleRegistry,
    rendered: HashMap<String, LifecycleHeaders>,
    metrics: LifecycleMetrics,
}

impl LifecycleState {
    /// Compile the registry and render every rule's headers.
    pub fn new(mut registry: LifecycleRegistry) -> Result<Self, LifecycleError> {
        registry.compile()?;

        let metrics = LifecycleMetrics::new(&registry.metrics.prefix);
        let mut rendered = HashMap::new();

        for endpoint in &registry.endpoints {
            let headers = LifecycleHeaders::render(
                &endpoint.lifecycle,
                Some(&endpoint.path),
                &registry.settings,
            )?;
            rendered.insert(endpoint.id.clone(), headers);

            if let Some(days) = endpoint.lifecycle.days_until_sunset() {
                metrics.set_days_until_sunset(&endpoint.id, &endpoint.path, days);
            }
        }

        info!(
            endpoints = registry.endpoints.len(),
            "Lifecycle registry initialized"
        );

        Ok(Self {
            registry,
            rendered,
            metrics,
        })
    }

    /// The compiled registry.
    pub fn registry(&self) -> &LifecycleRegistry {
        &self.registry
    }

    /// The usage metrics collector.
    pub fn metrics(&self) -> &LifecycleMetrics {
        &self.metrics
    }

    fn decorate(
        &self,
        id: &str,
        path: &str,
        method: &str,
        elapsed: std::time::Duration,
        response: &mut Response,
    ) {
        let Some(endpoint) = self.registry.endpoints.iter().find(|e| e.id == id) else {
            return;
        };

        if self.registry.metrics.enabled {
            self.metrics.record_request(id, &endpoint.path, method);
            self.metrics.observe_duration(id, elapsed.as_secs_f64());

            // The gauge is set at construction; keep it current as time
            // advances in a long-running process.
            if let Some(days) = endpoint.lifecycle.days_until_sunset() {
                self.metrics.set_days_until_sunset(id, &endpoint.path, days);
            }
        }

        if self.registry.settings.log_access {
            info!(
                endpoint_id = %id,
                path = %path,
                method = %method,
                "Deprecated endpoint accessed"
            );
        }

        if endpoint.lifecycle.is_past_sunset() {
            warn!(
                endpoint_id = %id,
                sunset = ?endpoint.lifecycle.sunset_at,
                "Request to endpoint past sunset date"
            );
        }

        if self.registry.settings.include_headers {
            if let Some(headers) = self.rendered.get(id) {
                headers.apply(response.headers_mut());
            }
        }
    }
}

/// Router-wide middleware that matches requests against the registry and
/// attaches the matched rule's headers to the response.
///
/// Attach with
/// `axum::middleware::from_fn_with_state(state, lifecycle_middleware)`
/// where `state` is an `Arc<LifecycleState>`.
pub async fn lifecycle_middleware(
    State(state): State<Arc<LifecycleState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let matched = state
        .registry
        .find(request.uri().path(), request.method().as_str())
        .map(|rule| rule.id.clone());

    let Some(id) = matched else {
        return next.run(request).await;
    };

    debug!(
        endpoint_id = %id,
        path = %request.uri().path(),
        "Request matches lifecycle rule"
    );

    let path = request.uri().path().to_string();
    let method = request.method().to_string();
    let start = Instant::now();

    let mut response = next.run(request).await;
    state.decorate(&id, &path, &method, start.elapsed(), &mut response);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_registry() -> LifecycleRegistry {
        LifecycleRegistry::from_yaml(
            r#"
endpoints:
  - id: legacy-users
    path: /api/v1/users
    methods: [GET, POST]
    deprecated_at: "2024-01-15T00:00:00Z"
    sunset_at: "2030-06-01T00:00:00Z"
    replacement: /api/v2/users
    migration_url: https://docs.example.com/migration
  - id: legacy-wildcard
    path: /api/v0/*
    sunset_at: "2030-01-01"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_layer_renders_headers_once() {
        let layer = Lifecycle::builder()
            .version("1.0")
            .deprecated_at("2024-01-15T00:00:00Z")
            .build()
            .unwrap()
            .into_layer()
            .unwrap();

        let headers = layer.headers().header_map();
        assert_eq!(headers.get("deprecation").unwrap(), "@1705276800");
        assert_eq!(headers.get("x-api-version").unwrap(), "1.0");
    }

    #[test]
    fn test_layer_rejects_invalid_metadata() {
        let mut lifecycle = Lifecycle::default();
        lifecycle.reason = Some("line\nbreak".to_string());
        assert!(LifecycleLayer::new(&lifecycle).is_err());
    }

    #[test]
    fn test_state_prerenders_all_rules() {
        let state = LifecycleState::new(test_registry()).unwrap();
        assert_eq!(state.rendered.len(), 2);
        assert!(state.rendered.contains_key("legacy-users"));
        assert!(state.rendered.contains_key("legacy-wildcard"));
    }

    #[test]
    fn test_state_initializes_sunset_gauges() {
        let state = LifecycleState::new(test_registry()).unwrap();
        let output = state.metrics().encode();
        assert!(output.contains("days_until_sunset"));
        assert!(output.contains("legacy-users"));
    }

    #[test]
    fn test_decorate_attaches_headers() {
        let state = LifecycleState::new(test_registry()).unwrap();
        let mut response = Response::new(Body::empty());

        state.decorate(
            "legacy-users",
            "/api/v1/users",
            "GET",
            std::time::Duration::from_millis(3),
            &mut response,
        );

        assert!(response.headers().get("deprecation").is_some());
        assert!(response.headers().get("sunset").is_some());
        assert!(response.headers().get("link").is_some());

        let output = state.metrics().encode();
        assert!(output.contains("requests_total"));
    }

    #[test]
    fn test_decorate_refreshes_sunset_gauge() {
        let state = LifecycleState::new(test_registry()).unwrap();

        // Skew the gauge, then decorate and expect it recomputed
        state
            .metrics()
            .set_days_until_sunset("legacy-users", "/api/v1/users", 9999);

        let mut response = Response::new(Body::empty());
        state.decorate(
            "legacy-users",
            "/api/v1/users",
            "GET",
            std::time::Duration::from_millis(1),
            &mut response,
        );

        let expected = state.registry().endpoints[0]
            .lifecycle
            .days_until_sunset()
            .unwrap();
        let current = state
            .metrics()
            .days_until_sunset
            .with_label_values(&["legacy-users", "/api/v1/users"])
            .get();
        assert_ne!(current, 9999);
        assert_eq!(current, expected);
    }

    #[test]
    fn test_decorate_respects_include_headers() {
        let mut registry = test_registry();
        registry.settings.include_headers = false;
        let state = LifecycleState::new(registry).unwrap();
        let mut response = Response::new(Body::empty());

        state.decorate(
            "legacy-users",
            "/api/v1/users",
            "GET",
            std::time::Duration::from_millis(1),
            &mut response,
        );

        assert!(response.headers().get("deprecation").is_none());
    }
}
