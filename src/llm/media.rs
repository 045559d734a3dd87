use std::net::IpAddr;

use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::utils::http::get_http_client;

#[derive(Debug, Error)]
pub enum ImageFetchError {
    #[error("Image URL rejected: {0}")]
    Rejected(String),
    #[error("Failed to fetch image: {0}")]
    Request(String),
    #[error("Failed to fetch image: {0}")]
    Status(String),
    #[error("Failed to read image bytes: {0}")]
    Body(String),
}

#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

/// MIME resolution order: the upstream content-type header, then byte
/// sniffing, then the `image/jpeg` default.
pub fn resolve_mime_type(content_type: Option<&str>, bytes: &[u8]) -> String {
    if let Some(header) = content_type {
        let trimmed = header.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    detect_mime_type(bytes).unwrap_or_else(|| "image/jpeg".to_string())
}

fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_link_local()
                || v4.octets()[0] == 10
                || (v4.octets()[0] == 172 && (16..=31).contains(&v4.octets()[1]))
                || (v4.octets()[0] == 192 && v4.octets()[1] == 168)
                || (v4.octets()[0] == 169 && v4.octets()[1] == 254)
        }
        IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

fn host_matches(host: &str, allowed: &str) -> bool {
    host == allowed || host.ends_with(&format!(".{allowed}"))
}

/// Guard against server-side request forgery. Callers control the URL, so
/// only http/https to public hosts is fetched; an operator allow-list, when
/// configured, both restricts the fetch to those hosts and expresses explicit
/// trust in them.
pub fn validate_image_url(raw: &str, allowed_hosts: &[String]) -> Result<Url, ImageFetchError> {
    let url =
        Url::parse(raw).map_err(|err| ImageFetchError::Rejected(format!("invalid URL: {err}")))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ImageFetchError::Rejected(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }

    let Some(host) = url.host_str() else {
        return Err(ImageFetchError::Rejected("URL has no host".to_string()));
    };
    let host = host.to_lowercase();

    if !allowed_hosts.is_empty() {
        if allowed_hosts.iter().any(|allowed| host_matches(&host, allowed)) {
            return Ok(url);
        }
        return Err(ImageFetchError::Rejected(format!(
            "host '{host}' is not in the allow-list"
        )));
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_private_ip(ip) {
            return Err(ImageFetchError::Rejected(format!(
                "address '{host}' is private or loopback"
            )));
        }
    } else if host == "localhost" || host.ends_with(".local") || host.ends_with(".internal") {
        return Err(ImageFetchError::Rejected(format!(
            "host '{host}' is internal"
        )));
    }

    Ok(url)
}

/// Fetch the creative from the caller-supplied URL. Single attempt: a failed
/// fetch is terminal for the request and retried, if at all, by the caller.
pub async fn fetch_image(
    raw_url: &str,
    allowed_hosts: &[String],
) -> Result<FetchedImage, ImageFetchError> {
    let url = validate_image_url(raw_url, allowed_hosts)?;

    let client = get_http_client();
    let response = client.get(url.as_str()).send().await.map_err(|err| {
        warn!(
            "Failed to fetch image {url}: {err} (timeout={}, connect={})",
            err.is_timeout(),
            err.is_connect()
        );
        ImageFetchError::Request(err.to_string())
    })?;

    let status = response.status();
    if !status.is_success() {
        warn!("Image download failed for {url} with status {status}");
        let status_text = status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string());
        return Err(ImageFetchError::Status(status_text));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let bytes = response
        .bytes()
        .await
        .map_err(|err| ImageFetchError::Body(err.to_string()))?
        .to_vec();

    let mime_type = resolve_mime_type(content_type.as_deref(), &bytes);
    Ok(FetchedImage { bytes, mime_type })
}
