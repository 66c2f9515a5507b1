//! HTTP surface: `GET /api/display`, `POST /api/generate`, `GET /healthz`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::display::{device_profile, DisplayError, DisplayService};
use crate::generator::ContentGenerator;

const NO_CACHE: &str = "no-cache";
const NOT_FOUND_MESSAGE: &str = "No image available";
const GENERATED_MESSAGE: &str = "Image generated successfully";

/// Shared handler state. Cloned per request; the services are shared.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<ContentGenerator>,
    pub display: Arc<DisplayService>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Optional body of `POST /api/generate`.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    pub style: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub message: String,
    pub date: String,
    pub title: String,
    pub year: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/display", get(display))
        .route("/api/generate", post(generate))
        .with_state(state)
}

/// Serve until the listener fails.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("daily-picture listening on http://{addr}");
    }
    axum::serve(listener, router(state)).await
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn display(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let profile = device_profile(&headers);
    let no_cache = [(header::CACHE_CONTROL, NO_CACHE)];

    match state.display.current(&profile).await {
        Ok(payload) => (StatusCode::OK, no_cache, Json(payload)).into_response(),
        Err(DisplayError::NotFound) => (
            StatusCode::NOT_FOUND,
            no_cache,
            Json(ErrorBody {
                error: NOT_FOUND_MESSAGE.to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!(device_id = %profile.device_id, "Display lookup failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                no_cache,
                Json(ErrorBody {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Missing, empty or malformed bodies mean "no style override".
fn parse_generate_request(body: &[u8]) -> GenerateRequest {
    serde_json::from_slice(body).unwrap_or_default()
}

async fn generate(State(state): State<AppState>, body: Bytes) -> Response {
    let request = parse_generate_request(&body);

    match state.generator.generate(request.style.as_deref(), None).await {
        Ok(report) => (
            StatusCode::OK,
            Json(GenerateResponse {
                message: GENERATED_MESSAGE.to_string(),
                date: report.date.format("%Y-%m-%d").to_string(),
                title: report.title,
                year: report.year,
            }),
        )
            .into_response(),
        // The generator has already logged the failure with its stage.
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_tolerates_bad_bodies() {
        assert_eq!(parse_generate_request(b"").style, None);
        assert_eq!(parse_generate_request(b"not json").style, None);
        assert_eq!(parse_generate_request(b"[1, 2]").style, None);
        assert_eq!(parse_generate_request(b"{}").style, None);
        assert_eq!(
            parse_generate_request(br#"{"style":"noir"}"#).style.as_deref(),
            Some("noir")
        );
    }
}
