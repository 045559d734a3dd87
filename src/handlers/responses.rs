use axum::body::Body;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE,
};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use serde_json::Value;

/// The fixed permissive cross-origin header set each endpoint attaches to
/// every response it produces, preflight included.
#[derive(Debug, Clone, Copy)]
pub struct CorsPolicy {
    pub allow_headers: &'static str,
    pub allow_methods: &'static str,
}

pub const ANALYZE_CORS: CorsPolicy = CorsPolicy {
    allow_headers: "Content-Type, Authorization",
    allow_methods: "POST, OPTIONS",
};

pub const UPLOAD_CORS: CorsPolicy = CorsPolicy {
    allow_headers: "Content-Type, Authorization, x-uploadthing-version, x-uploadthing-api-key, x-uploadthing-fe-package, x-uploadthing-be-adapter",
    allow_methods: "GET, POST, OPTIONS",
};

impl CorsPolicy {
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(self.allow_headers),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(self.allow_methods),
        );
    }

    /// JSON response with the CORS set and an explicit JSON content type.
    pub fn json(&self, status: StatusCode, body: Value) -> Response {
        let mut response = Response::new(Body::from(body.to_string()));
        *response.status_mut() = status;
        self.apply(response.headers_mut());
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }

    /// Preflight answer: 200, empty body, CORS headers only.
    pub fn preflight(&self) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::OK;
        self.apply(response.headers_mut());
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_response_carries_cors_and_content_type() {
        let response = ANALYZE_CORS.json(StatusCode::OK, json!({"success": true}));
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            headers[ACCESS_CONTROL_ALLOW_HEADERS],
            "Content-Type, Authorization"
        );
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn preflight_is_empty_with_cors_only() {
        let response = ANALYZE_CORS.preflight();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(CONTENT_TYPE).is_none());
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}
