//! Lifecycle metadata model and normalization.
//!
//! A [`Lifecycle`] describes the lifecycle state of a single endpoint
//! (deprecation date, sunset date, migration link, replacement, reason,
//! version). A [`LifecycleRegistry`] maps path patterns to lifecycles for
//! router-wide use and can be loaded from a YAML file.

use axum::http::{HeaderName, HeaderValue};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Errors produced while parsing or validating lifecycle metadata.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// A date input could not be normalized to a UTC timestamp.
    #[error("unrecognized date {0:?} (expected RFC 3339, YYYY-MM-DD, or @epoch)")]
    InvalidDate(String),

    /// The sunset date precedes the deprecation date.
    #[error("sunset date {sunset} is earlier than deprecation date {deprecated}")]
    SunsetBeforeDeprecation {
        deprecated: DateTime<Utc>,
        sunset: DateTime<Utc>,
    },

    /// An endpoint rule is missing its id.
    #[error("endpoint rule id cannot be empty")]
    EmptyId,

    /// Two endpoint rules share the same id.
    #[error("duplicate endpoint rule id: {0}")]
    DuplicateId(String),

    /// An endpoint rule is missing its path pattern.
    #[error("endpoint rule {0} has an empty path")]
    EmptyPath(String),

    /// A glob path pattern failed to compile.
    #[error("invalid path pattern {pattern:?} for rule {id}")]
    InvalidPattern {
        id: String,
        pattern: String,
        source: globset::Error,
    },

    /// A configured header name is not a valid HTTP header name.
    #[error("invalid header name {0:?}")]
    InvalidHeaderName(String),

    /// A configured value contains bytes that cannot appear in a header.
    #[error("value for {0} is not a valid HTTP header value")]
    InvalidHeaderValue(String),

    /// Reading the configuration file failed.
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for this schema.
    #[error("failed to parse lifecycle configuration")]
    Parse(#[from] serde_yaml::Error),
}

/// A date-like input that has not yet been normalized.
///
/// Accepts an already-canonical [`DateTime<Utc>`], an RFC 3339 timestamp,
/// a bare `YYYY-MM-DD` calendar date (midnight UTC), or a Unix timestamp
/// (integer, or a string with an `@` prefix).
#[derive(Debug, Clone)]
pub enum DateInput {
    Timestamp(DateTime<Utc>),
    Text(String),
    Epoch(i64),
}

impl DateInput {
    /// Normalize into a canonical UTC timestamp.
    pub fn normalize(&self) -> Result<DateTime<Utc>, LifecycleError> {
        match self {
            DateInput::Timestamp(dt) => Ok(*dt),
            DateInput::Epoch(secs) => DateTime::from_timestamp(*secs, 0)
                .ok_or_else(|| LifecycleError::InvalidDate(format!("@{secs}"))),
            DateInput::Text(s) => parse_date(s),
        }
    }
}

impl From<DateTime<Utc>> for DateInput {
    fn from(dt: DateTime<Utc>) -> Self {
        DateInput::Timestamp(dt)
    }
}

impl From<&str> for DateInput {
    fn from(s: &str) -> Self {
        DateInput::Text(s.to_string())
    }
}

impl From<String> for DateInput {
    fn from(s: String) -> Self {
        DateInput::Text(s)
    }
}

impl From<i64> for DateInput {
    fn from(secs: i64) -> Self {
        DateInput::Epoch(secs)
    }
}

/// Parse a textual date into a canonical UTC timestamp.
///
/// Accepted forms: RFC 3339 (`2024-01-15T00:00:00Z` and offset variants),
/// bare calendar dates (`2024-06-15`, interpreted as midnight UTC), and
/// `@<epoch>` Unix seconds.
pub fn parse_date(input: &str) -> Result<DateTime<Utc>, LifecycleError> {
    let s = input.trim();

    if let Some(epoch) = s.strip_prefix('@') {
        return epoch
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| LifecycleError::InvalidDate(input.to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = s.parse::<NaiveDate>() {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(LifecycleError::InvalidDate(input.to_string()))
}

/// Deserialize an optional date from a string or integer epoch.
fn deserialize_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Epoch(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Epoch(secs)) => DateInput::Epoch(secs)
            .normalize()
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(Raw::Text(s)) => parse_date(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Lifecycle metadata for a single endpoint.
///
/// All fields are optional; the endpoint counts as deprecated when a
/// deprecation or sunset date is present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lifecycle {
    /// API version served by the endpoint
    #[serde(default)]
    pub version: Option<String>,

    /// When the endpoint was deprecated
    #[serde(default, deserialize_with = "deserialize_date")]
    pub deprecated_at: Option<DateTime<Utc>>,

    /// When the endpoint will be (or was) removed, per RFC 8594
    #[serde(default, deserialize_with = "deserialize_date")]
    pub sunset_at: Option<DateTime<Utc>>,

    /// Link to migration documentation
    #[serde(default)]
    pub migration_url: Option<String>,

    /// Replacement endpoint, as a path (`/v2/users`) or a description
    /// (`GET /v2/users`)
    #[serde(default)]
    pub replacement: Option<String>,

    /// Human-readable explanation for the lifecycle state
    #[serde(default)]
    pub reason: Option<String>,

    /// Additional headers to attach verbatim
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Lifecycle {
    /// Start building lifecycle metadata in code.
    pub fn builder() -> LifecycleBuilder {
        LifecycleBuilder::default()
    }

    /// Whether the endpoint counts as deprecated.
    ///
    /// Inferred from the presence of either date field; an endpoint that
    /// only carries a version is not deprecated.
    pub fn is_deprecated(&self) -> bool {
        self.deprecated_at.is_some() || self.sunset_at.is_some()
    }

    /// Whether the sunset date has already passed.
    pub fn is_past_sunset(&self) -> bool {
        self.sunset_at
            .map(|sunset| Utc::now() > sunset)
            .unwrap_or(false)
    }

    /// Days remaining until sunset (negative once past).
    pub fn days_until_sunset(&self) -> Option<i64> {
        self.sunset_at.map(|sunset| (sunset - Utc::now()).num_days())
    }

    /// Human-readable deprecation notice.
    ///
    /// A custom `reason` takes precedence; otherwise the notice is
    /// assembled from the path, sunset date, replacement, and migration
    /// link.
    pub fn notice(&self, path: Option<&str>) -> String {
        if let Some(reason) = &self.reason {
            return reason.clone();
        }

        let mut message = match path {
            Some(p) => format!("This endpoint ({}) is deprecated", p),
            None => "This endpoint is deprecated".to_string(),
        };

        if let Some(sunset) = &self.sunset_at {
            message.push_str(&format!(
                " and will be removed on {}",
                sunset.format("%Y-%m-%d")
            ));
        }

        if let Some(replacement) = &self.replacement {
            message.push_str(&format!(". Please migrate to {}", replacement));
        }

        if let Some(docs) = &self.migration_url {
            message.push_str(&format!(". See {} for the migration guide", docs));
        }

        message.push('.');
        message
    }

    /// Validate the metadata.
    ///
    /// Rejects a sunset date earlier than the deprecation date and any
    /// value that cannot appear on the wire as a header. Logs a warning
    /// for sunset dates already in the past.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if let (Some(deprecated), Some(sunset)) = (self.deprecated_at, self.sunset_at) {
            if sunset < deprecated {
                return Err(LifecycleError::SunsetBeforeDeprecation { deprecated, sunset });
            }
        }

        if self.is_past_sunset() {
            tracing::warn!(
                sunset = ?self.sunset_at,
                "Sunset date is in the past"
            );
        }

        let text_fields = [
            ("version", &self.version),
            ("migration_url", &self.migration_url),
            ("replacement", &self.replacement),
            ("reason", &self.reason),
        ];
        for (field, value) in text_fields {
            if let Some(value) = value {
                HeaderValue::from_str(value)
                    .map_err(|_| LifecycleError::InvalidHeaderValue(field.to_string()))?;
            }
        }

        for (name, value) in &self.headers {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| LifecycleError::InvalidHeaderName(name.clone()))?;
            HeaderValue::from_str(value)
                .map_err(|_| LifecycleError::InvalidHeaderValue(name.clone()))?;
        }

        Ok(())
    }
}

/// Builder for [`Lifecycle`].
///
/// Dates are normalized and the result is validated when
/// [`build`](LifecycleBuilder::build) is called, so a misconfigured
/// endpoint fails at decoration time rather than at request time.
#[derive(Debug, Clone, Default)]
pub struct LifecycleBuilder {
    version: Option<String>,
    deprecated_at: Option<DateInput>,
    sunset_at: Option<DateInput>,
    migration_url: Option<String>,
    replacement: Option<String>,
    reason: Option<String>,
    headers: HashMap<String, String>,
}

impl LifecycleBuilder {
    /// Set the API version reported by the endpoint.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set when the endpoint was deprecated.
    pub fn deprecated_at(mut self, at: impl Into<DateInput>) -> Self {
        self.deprecated_at = Some(at.into());
        self
    }

    /// Set when the endpoint will be removed.
    pub fn sunset_at(mut self, at: impl Into<DateInput>) -> Self {
        self.sunset_at = Some(at.into());
        self
    }

    /// Set the migration documentation URL.
    pub fn migration_url(mut self, url: impl Into<String>) -> Self {
        self.migration_url = Some(url.into());
        self
    }

    /// Set the replacement endpoint.
    pub fn replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = Some(replacement.into());
        self
    }

    /// Set the human-readable reason for the lifecycle state.
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attach an extra header verbatim.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Normalize dates and validate the assembled metadata.
    pub fn build(self) -> Result<Lifecycle, LifecycleError> {
        let lifecycle = Lifecycle {
            version: self.version,
            deprecated_at: self.deprecated_at.map(|d| d.normalize()).transpose()?,
            sunset_at: self.sunset_at.map(|d| d.normalize()).transpose()?,
            migration_url: self.migration_url,
            replacement: self.replacement,
            reason: self.reason,
            headers: self.headers,
        };
        lifecycle.validate()?;
        Ok(lifecycle)
    }
}

/// A single registry rule: a path pattern plus lifecycle metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointRule {
    /// Unique identifier for this rule
    pub id: String,

    /// Path pattern to match (supports glob patterns like /api/v1/*)
    pub path: String,

    /// HTTP methods to match (empty means all methods)
    #[serde(default)]
    pub methods: Vec<String>,

    /// Lifecycle metadata attached to matching responses
    #[serde(flatten)]
    pub lifecycle: Lifecycle,

    /// Compiled path matcher (built by `compile`, not serialized)
    #[serde(skip)]
    matcher: Option<globset::GlobMatcher>,
}

impl EndpointRule {
    /// Create a rule from parts.
    pub fn new(id: impl Into<String>, path: impl Into<String>, lifecycle: Lifecycle) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            methods: Vec::new(),
            lifecycle,
            matcher: None,
        }
    }

    /// Restrict the rule to the given HTTP methods.
    pub fn with_methods(mut self, methods: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.methods = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Validate the rule and compile its path matcher.
    pub fn compile(&mut self) -> Result<(), LifecycleError> {
        if self.id.is_empty() {
            return Err(LifecycleError::EmptyId);
        }
        if self.path.is_empty() {
            return Err(LifecycleError::EmptyPath(self.id.clone()));
        }
        self.lifecycle.validate()?;

        if is_glob(&self.path) {
            let glob =
                globset::Glob::new(&self.path).map_err(|source| LifecycleError::InvalidPattern {
                    id: self.id.clone(),
                    pattern: self.path.clone(),
                    source,
                })?;
            self.matcher = Some(glob.compile_matcher());
        }

        Ok(())
    }

    /// Check if this rule matches the given path and method.
    pub fn matches(&self, path: &str, method: &str) -> bool {
        // Check method first (quick check)
        if !self.methods.is_empty() && !self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
        {
            return false;
        }

        self.matches_path(path)
    }

    fn matches_path(&self, path: &str) -> bool {
        if let Some(matcher) = &self.matcher {
            return matcher.is_match(path);
        }

        if !is_glob(&self.path) {
            // Exact match or prefix match with trailing slash
            return path == self.path
                || path.starts_with(&format!("{}/", self.path))
                || (self.path.ends_with('/') && path.starts_with(&self.path));
        }

        // Uncompiled glob pattern, compile on the fly
        match globset::Glob::new(&self.path) {
            Ok(glob) => glob.compile_matcher().is_match(path),
            Err(_) => false,
        }
    }
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?') || pattern.contains('[')
}

/// Registry of endpoint rules for router-wide header attachment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LifecycleRegistry {
    /// Endpoint rules, checked in order; the first match wins
    #[serde(default)]
    pub endpoints: Vec<EndpointRule>,

    /// Header naming and attachment settings
    #[serde(default)]
    pub settings: HeaderSettings,

    /// Metrics settings
    #[serde(default)]
    pub metrics: MetricsSettings,
}

impl LifecycleRegistry {
    /// Load and compile a registry from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, LifecycleError> {
        let content = std::fs::read_to_string(path).map_err(|source| LifecycleError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and compile a registry from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, LifecycleError> {
        let mut registry: Self = serde_yaml::from_str(yaml)?;
        registry.compile()?;
        Ok(registry)
    }

    /// Validate all rules and settings and compile path matchers.
    pub fn compile(&mut self) -> Result<(), LifecycleError> {
        self.settings.validate()?;

        let mut seen = std::collections::HashSet::new();
        for endpoint in &mut self.endpoints {
            endpoint.compile()?;
            if !seen.insert(endpoint.id.clone()) {
                return Err(LifecycleError::DuplicateId(endpoint.id.clone()));
            }
        }
        Ok(())
    }

    /// Find the first rule matching a path and method.
    pub fn find(&self, path: &str, method: &str) -> Option<&EndpointRule> {
        self.endpoints.iter().find(|e| e.matches(path, method))
    }
}

/// Header naming and attachment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderSettings {
    /// Header carrying the deprecation timestamp (default: Deprecation)
    #[serde(default = "default_deprecation_header")]
    pub deprecation_header: String,

    /// Header carrying the sunset date (default: Sunset)
    #[serde(default = "default_sunset_header")]
    pub sunset_header: String,

    /// Header carrying migration and successor links (default: Link)
    #[serde(default = "default_link_header")]
    pub link_header: String,

    /// Header carrying the human-readable notice
    /// (default: X-Deprecation-Notice)
    #[serde(default = "default_notice_header")]
    pub notice_header: String,

    /// Whether to attach lifecycle headers at all
    #[serde(default = "default_true")]
    pub include_headers: bool,

    /// Whether to log each request to a matched endpoint
    #[serde(default = "default_true")]
    pub log_access: bool,
}

impl HeaderSettings {
    /// Check that all configured header names are valid on the wire.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        for name in [
            &self.deprecation_header,
            &self.sunset_header,
            &self.link_header,
            &self.notice_header,
        ] {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| LifecycleError::InvalidHeaderName(name.clone()))?;
        }
        Ok(())
    }
}

impl Default for HeaderSettings {
    fn default() -> Self {
        Self {
            deprecation_header: default_deprecation_header(),
            sunset_header: default_sunset_header(),
            link_header: default_link_header(),
            notice_header: default_notice_header(),
            include_headers: true,
            log_access: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_deprecation_header() -> String {
    "Deprecation".to_string()
}

fn default_sunset_header() -> String {
    "Sunset".to_string()
}

fn default_link_header() -> String {
    "Link".to_string()
}

fn default_notice_header() -> String {
    "X-Deprecation-Notice".to_string()
}

/// Metrics settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSettings {
    /// Whether to record Prometheus metrics
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Prefix for metric names
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: default_metrics_prefix(),
        }
    }
}

fn default_metrics_prefix() -> String {
    "api_lifecycle".to_string()
}
