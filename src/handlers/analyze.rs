use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::Response;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::handlers::responses::ANALYZE_CORS;
use crate::llm::media::{fetch_image, ImageFetchError};
use crate::llm::InlineImage;
use crate::prompts::{build_analysis_prompt, AnalysisContext};
use crate::state::AppState;
use crate::utils::timing::RequestTimer;

pub const REQUIRED_FIELDS: [&str; 5] =
    ["imageUrl", "industry", "platform", "targetAudience", "goal"];

/// Internal failure taxonomy for the analysis pipeline. Every variant
/// surfaces to the caller as the same generic message; the underlying causes
/// stay in the server logs.
#[derive(Debug, Error)]
enum AnalysisError {
    #[error("Failed to analyze ad creative")]
    BodyParse(#[source] serde_json::Error),
    #[error("Failed to analyze ad creative")]
    ImageFetch(#[source] ImageFetchError),
    #[error("Failed to analyze ad creative")]
    Model(#[source] anyhow::Error),
}

struct AnalyzeRequest {
    image_url: String,
    context: AnalysisContext,
}

fn required_field(payload: &Value, name: &str) -> Option<String> {
    payload
        .get(name)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_request(payload: &Value) -> Option<AnalyzeRequest> {
    Some(AnalyzeRequest {
        image_url: required_field(payload, "imageUrl")?,
        context: AnalysisContext {
            industry: required_field(payload, "industry")?,
            platform: required_field(payload, "platform")?,
            target_audience: required_field(payload, "targetAudience")?,
            goal: required_field(payload, "goal")?,
        },
    })
}

pub async fn analyze_ad(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    let mut timer = RequestTimer::start("analyze_ad", method.as_str());

    let response = if method == Method::OPTIONS {
        ANALYZE_CORS.preflight()
    } else if method != Method::POST {
        ANALYZE_CORS.json(
            StatusCode::METHOD_NOT_ALLOWED,
            json!({ "error": "Method not allowed" }),
        )
    } else {
        match run_analysis(&state, &body).await {
            Ok(response) => response,
            Err(err) => {
                match &err {
                    AnalysisError::BodyParse(source) => {
                        warn!("Analyze request body parse failed: {source}")
                    }
                    AnalysisError::ImageFetch(source) => error!("Image fetch failed: {source}"),
                    AnalysisError::Model(source) => error!("Gemini analysis failed: {source:#}"),
                }
                ANALYZE_CORS.json(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "Failed to analyze ad creative",
                        "message": err.to_string(),
                    }),
                )
            }
        }
    };

    timer.complete(response.status().as_u16());
    response
}

async fn run_analysis(state: &AppState, body: &[u8]) -> Result<Response, AnalysisError> {
    let payload: Value = if body.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(body).map_err(AnalysisError::BodyParse)?
    };

    let Some(request) = parse_request(&payload) else {
        return Ok(ANALYZE_CORS.json(
            StatusCode::BAD_REQUEST,
            json!({
                "error": "Missing required fields",
                "required": REQUIRED_FIELDS,
            }),
        ));
    };

    if state.config.gemini_api_key.trim().is_empty() {
        error!("GEMINI_API_KEY not configured");
        return Ok(ANALYZE_CORS.json(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "Gemini API key not configured" }),
        ));
    }

    info!(
        "Analyze request received: platform={} industry={} audience={} goal={}",
        request.context.platform,
        request.context.industry,
        request.context.target_audience,
        request.context.goal
    );

    let image = fetch_image(&request.image_url, &state.config.allowed_image_hosts)
        .await
        .map_err(AnalysisError::ImageFetch)?;
    let inline = InlineImage::from_bytes(&image.bytes, image.mime_type);

    let prompt = build_analysis_prompt(&request.context);
    let analysis = state
        .model
        .analyze_image(&prompt, &inline)
        .await
        .map_err(AnalysisError::Model)?;

    info!("Analysis complete: {} chars", analysis.len());

    Ok(ANALYZE_CORS.json(
        StatusCode::OK,
        json!({
            "success": true,
            "analysis": analysis,
            "context": request.context,
            "analyzedAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }),
    ))
}
