use hyper::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
    ACCESS_CONTROL_MAX_AGE, VARY,
};

pub const EXPOSED_HEADERS: &str =
    "mcp-session-id, MCP-Session-Id, MCP-Protocol-Version, Access-Control-Expose-Headers";
pub const ALLOWED_METHODS: &str = "DELETE, GET, HEAD, OPTIONS, PATCH, POST, PUT";
const PREFLIGHT_MAX_AGE: &str = "600";

/// Exact-match origin allow list with credentials enabled.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
}

impl CorsPolicy {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == origin)
    }

    fn allow_origin(&self, origin: Option<&str>, headers: &mut HeaderMap) -> bool {
        let Some(origin) = origin.filter(|o| self.is_allowed(o)) else {
            return false;
        };
        let Ok(value) = HeaderValue::from_str(origin) else {
            return false;
        };

        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
        headers.insert(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.append(VARY, HeaderValue::from_static("Origin"));
        true
    }

    /// Decorates a normal response; no-op for missing or disallowed origins.
    pub fn apply(&self, origin: Option<&str>, headers: &mut HeaderMap) {
        if self.allow_origin(origin, headers) {
            headers.insert(
                ACCESS_CONTROL_EXPOSE_HEADERS,
                HeaderValue::from_static(EXPOSED_HEADERS),
            );
        }
    }

    /// Fills in preflight headers. Returns false when the origin is not allowed.
    pub fn preflight(
        &self,
        origin: Option<&str>,
        requested_headers: Option<&HeaderValue>,
        headers: &mut HeaderMap,
    ) -> bool {
        if !self.allow_origin(origin, headers) {
            return false;
        }

        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(PREFLIGHT_MAX_AGE),
        );
        if let Some(requested) = requested_headers {
            headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
        }
        true
    }
}
