use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::Response;
use serde_json::json;
use tracing::{error, info, warn};

use crate::handlers::responses::UPLOAD_CORS;
use crate::state::AppState;
use crate::utils::http::get_http_client;
use crate::utils::timing::RequestTimer;

/// Provider route config: one image per request, 16MB ceiling, enforced
/// before any bytes are forwarded upstream.
pub const UPLOAD_ROUTE_SLUG: &str = "imageUploader";
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

const ROUTE_PREFIX: &str = "/api/uploadthing";

const PROVIDER_KEY_HEADER: HeaderName = HeaderName::from_static("x-uploadthing-api-key");

fn is_hop_by_hop(name: &HeaderName) -> bool {
    name == HOST || name == CONTENT_LENGTH || name == TRANSFER_ENCODING || name == CONNECTION
}

fn forwardable_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in inbound {
        if !is_hop_by_hop(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}

/// Format adapter around the file-storage provider: rebuild the provider URL
/// from the inbound path and query, forward the request with the provider
/// credential attached, and hand the provider's answer back with the CORS set
/// merged in. No business logic lives here.
pub async fn uploadthing_relay(State(state): State<AppState>, request: Request) -> Response {
    let method = request.method().clone();
    let mut timer = RequestTimer::start("uploadthing_relay", method.as_str());
    let response = relay(&state, request).await;
    timer.complete(response.status().as_u16());
    response
}

async fn relay(state: &AppState, request: Request) -> Response {
    if request.method() == Method::OPTIONS {
        return UPLOAD_CORS.preflight();
    }

    let token = state.config.uploadthing_token.trim();
    if token.is_empty() {
        error!("UPLOADTHING_TOKEN is not set");
        return UPLOAD_CORS.json(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "Server configuration error: UPLOADTHING_TOKEN not set" }),
        );
    }

    let method = request.method().clone();
    let uri = request.uri().clone();

    // The provider is configured with a single file route; anything else is
    // not worth a round trip.
    if let Some(slug) = uri.query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "slug")
            .map(|(_, value)| value.into_owned())
    }) {
        if slug != UPLOAD_ROUTE_SLUG {
            warn!("Unknown upload route slug '{slug}'");
            return UPLOAD_CORS.json(
                StatusCode::NOT_FOUND,
                json!({ "error": format!("Unknown upload route: {slug}") }),
            );
        }
    }

    let path = uri.path().strip_prefix(ROUTE_PREFIX).unwrap_or("");
    let path = if path.is_empty() { "/" } else { path };
    let upstream_url = match uri.query() {
        Some(query) => format!("{}{}?{}", state.config.uploadthing_api_base, path, query),
        None => format!("{}{}", state.config.uploadthing_api_base, path),
    };

    info!(
        "Upload relay request: method={} path={} query={:?}",
        method,
        uri.path(),
        uri.query()
    );

    let mut headers = forwardable_headers(request.headers());
    match HeaderValue::from_str(token) {
        Ok(value) => {
            headers.insert(PROVIDER_KEY_HEADER, value);
        }
        Err(_) => {
            error!("UPLOADTHING_TOKEN contains non-header-safe characters");
            return UPLOAD_CORS.json(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Server configuration error: UPLOADTHING_TOKEN not set" }),
            );
        }
    }

    let body = match axum::body::to_bytes(request.into_body(), MAX_UPLOAD_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Upload body rejected: {err}");
            return UPLOAD_CORS.json(
                StatusCode::PAYLOAD_TOO_LARGE,
                json!({ "error": format!("File exceeds the {}MB upload limit", MAX_UPLOAD_BYTES / (1024 * 1024)) }),
            );
        }
    };

    let client = get_http_client();
    let upstream = match client
        .request(method, &upstream_url)
        .headers(headers)
        .body(body)
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            error!("Upload relay failed: {err}");
            return UPLOAD_CORS.json(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "Internal server error",
                    "message": err.to_string(),
                }),
            );
        }
    };

    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();
    let body = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!("Failed to read provider response: {err}");
            return UPLOAD_CORS.json(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "Internal server error",
                    "message": err.to_string(),
                }),
            );
        }
    };

    if status.as_u16() >= 400 {
        warn!(
            "Provider error response: status={} body={}",
            status,
            String::from_utf8_lossy(&body[..body.len().min(800)])
        );
    }

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    for (name, value) in &upstream_headers {
        if !is_hop_by_hop(name) {
            response.headers_mut().append(name.clone(), value.clone());
        }
    }
    UPLOAD_CORS.apply(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::llm::{InlineImage, VisionModel};
    use crate::router;
    use crate::state::AppState;

    use std::sync::Arc;

    use async_trait::async_trait;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct UnusedModel;

    #[async_trait]
    impl VisionModel for UnusedModel {
        async fn analyze_image(
            &self,
            _prompt: &str,
            _image: &InlineImage,
        ) -> anyhow::Result<String> {
            unreachable!("the upload relay never calls the model")
        }
    }

    fn state_with(config: Config) -> AppState {
        AppState::new(config, Arc::new(UnusedModel))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn preflight_returns_upload_cors_set() {
        let request = axum::http::Request::builder()
            .method("OPTIONS")
            .uri("/api/uploadthing")
            .body(Body::empty())
            .unwrap();
        let response = router(state_with(Config::for_tests()))
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers().clone();
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-methods"], "GET, POST, OPTIONS");
        assert!(headers["access-control-allow-headers"]
            .to_str()
            .unwrap()
            .contains("x-uploadthing-version"));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn missing_token_is_a_configuration_error() {
        let mut config = Config::for_tests();
        config.uploadthing_token = String::new();
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/uploadthing?actionType=upload")
            .body(Body::empty())
            .unwrap();
        let response = router(state_with(config)).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(
            body,
            serde_json::json!({ "error": "Server configuration error: UPLOADTHING_TOKEN not set" })
        );
    }

    #[tokio::test]
    async fn forwards_to_provider_and_relays_the_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("actionType".into(), "upload".into()),
                mockito::Matcher::UrlEncoded("slug".into(), UPLOAD_ROUTE_SLUG.into()),
            ]))
            .match_header("x-uploadthing-api-key", "test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_header("x-uploadthing-version", "7.0.0")
            .with_body(r#"{"url": "https://utfs.io/f/abc123.png", "key": "abc123"}"#)
            .create_async()
            .await;

        let mut config = Config::for_tests();
        config.uploadthing_api_base = server.url();
        let request = axum::http::Request::builder()
            .method("POST")
            .uri(format!(
                "/api/uploadthing?actionType=upload&slug={UPLOAD_ROUTE_SLUG}"
            ))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"fileName": "ad.png"}"#))
            .unwrap();
        let response = router(state_with(config)).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        // Provider headers survive and the CORS set is merged on top.
        assert_eq!(response.headers()["x-uploadthing-version"], "7.0.0");
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        let body = body_json(response).await;
        assert_eq!(body["key"], "abc123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn subpaths_map_onto_the_provider_api() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/route-metadata")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let mut config = Config::for_tests();
        config.uploadthing_api_base = server.url();
        let request = axum::http::Request::builder()
            .method("GET")
            .uri("/api/uploadthing/route-metadata")
            .body(Body::empty())
            .unwrap();
        let response = router(state_with(config)).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unknown_route_slug_is_rejected_without_forwarding() {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/uploadthing?actionType=upload&slug=videoUploader")
            .body(Body::empty())
            .unwrap();
        let response = router(state_with(Config::for_tests()))
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Unknown upload route: videoUploader");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_before_forwarding() {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/uploadthing")
            .body(Body::from(vec![0u8; MAX_UPLOAD_BYTES + 1]))
            .unwrap();
        let response = router(state_with(Config::for_tests()))
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = body_json(response).await;
        assert_eq!(body["error"], "File exceeds the 16MB upload limit");
    }
}
