//! Header rendering for endpoint lifecycle metadata.
//!
//! Implements the standard lifecycle headers:
//! - Deprecation header (RFC 9745): `@<unix-timestamp>` or `true`
//! - Sunset header (RFC 8594): HTTP date
//! - Link header (RFC 8288): `rel="deprecation"` and `rel="successor-version"`
//!
//! plus the `X-API-Version`, `X-API-Replacement`, and
//! `X-API-Deprecation-Reason` companion headers.

use crate::config::{HeaderSettings, Lifecycle, LifecycleError};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use chrono::{DateTime, NaiveDateTime, Utc};

/// Version of the API serving the response.
pub static X_API_VERSION: HeaderName = HeaderName::from_static("x-api-version");

/// Replacement endpoint for a deprecated one.
pub static X_API_REPLACEMENT: HeaderName = HeaderName::from_static("x-api-replacement");

/// Explanation for the deprecation.
pub static X_API_DEPRECATION_REASON: HeaderName =
    HeaderName::from_static("x-api-deprecation-reason");

/// A rendered, validated set of lifecycle headers.
///
/// Rendering happens once, at decoration time; attaching to a response is
/// a plain header merge and cannot fail.
#[derive(Debug, Clone)]
pub struct LifecycleHeaders {
    headers: HeaderMap,
    link: HeaderName,
}

impl LifecycleHeaders {
    /// Render the headers for an endpoint's lifecycle metadata.
    ///
    /// `path` is used to build the default notice text when the endpoint
    /// has no custom reason; pass `None` for per-route layers where the
    /// path is not known at decoration time.
    pub fn render(
        lifecycle: &Lifecycle,
        path: Option<&str>,
        settings: &HeaderSettings,
    ) -> Result<Self, LifecycleError> {
        let deprecation = header_name(&settings.deprecation_header)?;
        let sunset = header_name(&settings.sunset_header)?;
        let link = header_name(&settings.link_header)?;
        let notice = header_name(&settings.notice_header)?;

        let mut headers = HeaderMap::new();

        // Deprecation header (RFC 9745)
        // Format: Deprecation: @<unix-timestamp> or Deprecation: true
        if lifecycle.is_deprecated() {
            let value = match &lifecycle.deprecated_at {
                Some(at) => format!("@{}", at.timestamp()),
                None => "true".to_string(),
            };
            headers.insert(
                deprecation,
                header_value(&settings.deprecation_header, &value)?,
            );
        }

        // Sunset header (RFC 8594)
        // Format: Sunset: <HTTP-date>
        if let Some(sunset_at) = &lifecycle.sunset_at {
            headers.insert(
                sunset,
                header_value(&settings.sunset_header, &format_http_date(sunset_at))?,
            );
        }

        // Link header (RFC 8288): migration docs and successor version
        let mut links = Vec::new();
        if let Some(docs_url) = &lifecycle.migration_url {
            links.push(format!("<{}>; rel=\"deprecation\"", docs_url));
        }
        if let Some(replacement) = &lifecycle.replacement {
            // Only linkable replacements belong in the Link header;
            // descriptive ones ("GET /v2/users") still appear in
            // X-API-Replacement below.
            if replacement.starts_with('/') || replacement.starts_with("http") {
                links.push(format!("<{}>; rel=\"successor-version\"", replacement));
            }
        }
        if !links.is_empty() {
            headers.insert(
                link.clone(),
                header_value(&settings.link_header, &links.join(", "))?,
            );
        }

        if let Some(version) = &lifecycle.version {
            headers.insert(X_API_VERSION.clone(), header_value("version", version)?);
        }

        if let Some(replacement) = &lifecycle.replacement {
            headers.insert(
                X_API_REPLACEMENT.clone(),
                header_value("replacement", replacement)?,
            );
        }

        if let Some(reason) = &lifecycle.reason {
            headers.insert(
                X_API_DEPRECATION_REASON.clone(),
                header_value("reason", reason)?,
            );
        }

        // Human-readable notice, only for deprecated endpoints
        if lifecycle.is_deprecated() {
            headers.insert(
                notice,
                header_value(&settings.notice_header, &lifecycle.notice(path))?,
            );
        }

        // Custom headers from the endpoint config
        for (name, value) in &lifecycle.headers {
            headers.insert(header_name(name)?, header_value(name, value)?);
        }

        Ok(Self { headers, link })
    }

    /// Merge the rendered headers into a response header map.
    ///
    /// `Link` is appended so handler-set links survive; every other
    /// lifecycle header replaces any existing value. Unrelated headers are
    /// never touched.
    pub fn apply(&self, target: &mut HeaderMap) {
        for (name, value) in &self.headers {
            if *name == self.link {
                target.append(name.clone(), value.clone());
            } else {
                target.insert(name.clone(), value.clone());
            }
        }
    }

    /// The rendered headers.
    pub fn header_map(&self) -> &HeaderMap {
        &self.headers
    }

    /// Number of rendered headers.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Whether the metadata produced no headers at all.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

fn header_name(name: &str) -> Result<HeaderName, LifecycleError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| LifecycleError::InvalidHeaderName(name.to_string()))
}

fn header_value(field: &str, value: &str) -> Result<HeaderValue, LifecycleError> {
    HeaderValue::from_str(value).map_err(|_| LifecycleError::InvalidHeaderValue(field.to_string()))
}

/// Format a datetime as an HTTP date (RFC 7231).
/// Example: Sun, 06 Nov 1994 08:49:37 GMT
pub fn format_http_date(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an HTTP date to `DateTime<Utc>`.
pub fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC 7231 format first (strip " GMT" suffix and parse as naive, then add UTC)
    if let Some(without_tz) = s.strip_suffix(" GMT") {
        if let Ok(naive) = NaiveDateTime::parse_from_str(without_tz, "%a, %d %b %Y %H:%M:%S") {
            return Some(naive.and_utc());
        }
    }

    // Try ISO 8601 as fallback
    if let Ok(dt) = s.parse::<DateTime<Utc>>() {
        return Some(dt);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    fn test_lifecycle() -> Lifecycle {
        Lifecycle::builder()
            .version("1.0")
            .deprecated_at("2024-01-01T00:00:00Z")
            .sunset_at("2025-06-01T00:00:00Z")
            .migration_url("https://docs.example.com/migration")
            .replacement("/api/v2/users")
            .build()
            .unwrap()
    }

    fn render(lifecycle: &Lifecycle) -> LifecycleHeaders {
        LifecycleHeaders::render(lifecycle, Some("/api/v1/users"), &HeaderSettings::default())
            .unwrap()
    }

    #[test]
    fn test_deprecation_header_timestamp() {
        let headers = render(&test_lifecycle());
        let value = headers.header_map().get("deprecation").unwrap();
        assert_eq!(value, "@1704067200");
    }

    #[test]
    fn test_deprecation_header_inferred_boolean() {
        let lifecycle = Lifecycle::builder()
            .sunset_at("2025-06-01T00:00:00Z")
            .build()
            .unwrap();
        let headers = render(&lifecycle);
        assert_eq!(headers.header_map().get("deprecation").unwrap(), "true");
    }

    #[test]
    fn test_no_deprecation_header_for_versioned_endpoint() {
        let lifecycle = Lifecycle::builder().version("2.0").build().unwrap();
        let headers = render(&lifecycle);
        assert!(headers.header_map().get("deprecation").is_none());
        assert!(headers.header_map().get("x-deprecation-notice").is_none());
        assert_eq!(headers.header_map().get("x-api-version").unwrap(), "2.0");
    }

    #[test]
    fn test_sunset_header() {
        let headers = render(&test_lifecycle());
        let value = headers.header_map().get("sunset").unwrap().to_str().unwrap();
        assert_eq!(value, "Sun, 01 Jun 2025 00:00:00 GMT");
    }

    #[test]
    fn test_link_header() {
        let headers = render(&test_lifecycle());
        let link = headers.header_map().get("link").unwrap().to_str().unwrap();
        assert!(link.contains("<https://docs.example.com/migration>; rel=\"deprecation\""));
        assert!(link.contains("</api/v2/users>; rel=\"successor-version\""));
    }

    #[test]
    fn test_descriptive_replacement_skips_link() {
        let lifecycle = Lifecycle::builder()
            .deprecated_at("2024-01-01")
            .replacement("GET /v2/users")
            .build()
            .unwrap();
        let headers = render(&lifecycle);
        assert!(headers.header_map().get("link").is_none());
        assert_eq!(
            headers.header_map().get("x-api-replacement").unwrap(),
            "GET /v2/users"
        );
    }

    #[test]
    fn test_notice_header() {
        let headers = render(&test_lifecycle());
        let notice = headers
            .header_map()
            .get("x-deprecation-notice")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(notice.contains("deprecated"));
        assert!(notice.contains("/api/v1/users"));
    }

    #[test]
    fn test_custom_header_names() {
        let settings = HeaderSettings {
            notice_header: "X-Legacy-Warning".to_string(),
            ..HeaderSettings::default()
        };
        let headers =
            LifecycleHeaders::render(&test_lifecycle(), None, &settings).unwrap();
        assert!(headers.header_map().get("x-legacy-warning").is_some());
        assert!(headers.header_map().get("x-deprecation-notice").is_none());
    }

    #[test]
    fn test_invalid_value_error_names_configured_header() {
        let settings = HeaderSettings {
            link_header: "X-Migration-Link".to_string(),
            ..HeaderSettings::default()
        };
        let mut lifecycle = Lifecycle::default();
        lifecycle.migration_url = Some("https://docs.example.com/\nmigration".to_string());

        let err = LifecycleHeaders::render(&lifecycle, None, &settings).unwrap_err();
        assert!(
            matches!(err, LifecycleError::InvalidHeaderValue(ref name) if name == "X-Migration-Link")
        );
    }

    #[test]
    fn test_apply_inserts_and_appends() {
        let headers = render(&test_lifecycle());

        let mut target = HeaderMap::new();
        target.insert(header::LINK, HeaderValue::from_static("</other>; rel=\"up\""));
        target.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        headers.apply(&mut target);

        // Handler-set Link survives, lifecycle links are appended
        let links: Vec<_> = target.get_all(header::LINK).iter().collect();
        assert_eq!(links.len(), 2);
        // Unrelated headers untouched
        assert_eq!(target.get(header::CONTENT_TYPE).unwrap(), "application/json");
        assert!(target.get("deprecation").is_some());
        assert!(target.get("sunset").is_some());
    }

    #[test]
    fn test_apply_is_idempotent_for_non_link_headers() {
        let headers = render(&test_lifecycle());

        let mut target = HeaderMap::new();
        headers.apply(&mut target);
        let deprecation_count = target.get_all("deprecation").iter().count();
        headers.apply(&mut target);
        assert_eq!(
            target.get_all("deprecation").iter().count(),
            deprecation_count
        );
    }

    #[test]
    fn test_extra_headers_rendered() {
        let lifecycle = Lifecycle::builder()
            .deprecated_at("2024-01-01")
            .header("X-Custom", "value")
            .build()
            .unwrap();
        let headers = render(&lifecycle);
        assert_eq!(headers.header_map().get("x-custom").unwrap(), "value");
    }

    #[test]
    fn test_format_http_date() {
        let dt: DateTime<Utc> = "2025-06-01T12:00:00Z".parse().unwrap();
        assert_eq!(format_http_date(&dt), "Sun, 01 Jun 2025 12:00:00 GMT");
    }

    #[test]
    fn test_parse_http_date() {
        let parsed = parse_http_date("Sun, 01 Jun 2025 12:00:00 GMT").unwrap();
        assert_eq!(parsed, "2025-06-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap());

        // Also works with ISO 8601
        assert!(parse_http_date("2025-06-01T12:00:00Z").is_some());
        assert!(parse_http_date("not a date").is_none());
    }

    #[test]
    fn test_http_date_round_trip() {
        let dt: DateTime<Utc> = "2025-06-01T12:00:00Z".parse().unwrap();
        assert_eq!(parse_http_date(&format_http_date(&dt)), Some(dt));
    }
}
