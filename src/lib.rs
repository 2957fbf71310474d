//! API lifecycle headers for axum.
//!
//! Annotate individual handlers (or whole path patterns) with lifecycle
//! metadata and have it translated into standards-aligned response headers
//! on every response the handler produces:
//!
//! - **Deprecation** (RFC 9745): `@<unix-timestamp>`, or `true` when
//!   deprecation is inferred from a sunset date
//! - **Sunset** (RFC 8594): HTTP date of the removal
//! - **Link** (RFC 8288): migration documentation (`rel="deprecation"`)
//!   and replacement endpoint (`rel="successor-version"`)
//! - **X-API-Version**, **X-API-Replacement**,
//!   **X-API-Deprecation-Reason**: metadata carried verbatim
//!
//! The handler's status, body, and unrelated headers are never touched.
//!
//! # Per-route layer
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use axum_lifecycle::Lifecycle;
//!
//! # fn main() -> Result<(), axum_lifecycle::LifecycleError> {
//! async fn users_v1() -> &'static str {
//!     "[]"
//! }
//!
//! let lifecycle = Lifecycle::builder()
//!     .version("1.0")
//!     .deprecated_at("2024-01-15T00:00:00Z")
//!     .sunset_at("2024-06-15")
//!     .migration_url("https://api.example.com/docs/migration")
//!     .replacement("/v2/users")
//!     .reason("Moving to the v2 API")
//!     .build()?;
//!
//! let app: Router = Router::new().route("/v1/users", get(users_v1).layer(lifecycle.into_layer()?));
//! # Ok(())
//! # }
//! ```
//!
//! # Registry middleware
//!
//! A YAML registry covers existing routers without touching each route:
//!
//! ```yaml
//! endpoints:
//!   - id: legacy-users-api
//!     path: /api/v1/users
//!     methods: [GET, POST]
//!     deprecated_at: "2024-01-15T00:00:00Z"
//!     sunset_at: "2025-06-01T00:00:00Z"
//!     replacement: /api/v2/users
//!     migration_url: https://docs.example.com/migration
//! ```
//!
//! ```no_run
//! use std::sync::Arc;
//! use axum::{middleware, routing::get, Router};
//! use axum_lifecycle::{lifecycle_middleware, LifecycleRegistry, LifecycleState};
//!
//! # fn main() -> Result<(), axum_lifecycle::LifecycleError> {
//! let registry = LifecycleRegistry::from_file("lifecycle.yaml".as_ref())?;
//! let state = Arc::new(LifecycleState::new(registry)?);
//!
//! async fn users_v1() -> &'static str {
//!     "[]"
//! }
//!
//! let app: Router = Router::new()
//!     .route("/api/v1/users", get(users_v1))
//!     .layer(middleware::from_fn_with_state(state, lifecycle_middleware));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod headers;
pub mod metrics;
pub mod middleware;

pub use config::{
    DateInput, EndpointRule, HeaderSettings, Lifecycle, LifecycleBuilder, LifecycleError,
    LifecycleRegistry, MetricsSettings,
};
pub use headers::LifecycleHeaders;
pub use metrics::LifecycleMetrics;
pub use middleware::{lifecycle_middleware, LifecycleLayer, LifecycleState};
