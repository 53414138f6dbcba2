//! HTTP front end
//!
//! `POST /optimize` takes a multipart upload and answers with the optimized
//! bytes plus an `X-Image-Stats` header. `GET /health` is a liveness probe,
//! and anything else is served from the public directory when one exists.

use crate::config::ServerConfig;
use crate::form::{self, FormError};
use crate::models::OptimizationRequest;
use crate::optimizer::ImageOptimizer;
use crate::stats::ImageStats;
use crate::{Error, Result};
use axum::body::Body;
use axum::extract::State;
use axum::http::header::{HeaderMap, HeaderName, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub const STATS_HEADER: &str = "x-image-stats";

#[derive(Clone)]
pub struct AppState {
    pub optimizer: Arc<dyn ImageOptimizer>,
    pub max_upload_bytes: u64,
}

pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let router = Router::new()
        .route("/optimize", post(optimize))
        .route("/health", get(health))
        .with_state(state);

    let router = if config.public_dir.is_dir() {
        router.fallback_service(ServeDir::new(&config.public_dir))
    } else {
        warn!(
            "Public directory {} not found, static files disabled",
            config.public_dir.display()
        );
        router
    };

    router.layer(TraceLayer::new_for_http())
}

pub async fn serve(config: &ServerConfig, optimizer: Arc<dyn ImageOptimizer>) -> Result<()> {
    let state = AppState {
        optimizer,
        max_upload_bytes: config.max_upload_bytes,
    };
    let app = router(state, config);

    let listener = tokio::net::TcpListener::bind(config.server_address()).await?;
    info!("Image optimizer listening on http://{}", listener.local_addr()?);
    info!("- POST /optimize with multipart/form-data (field 'image')");
    info!("- Max upload size: {} bytes", config.max_upload_bytes);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "message": "Server is running" }))
}

async fn optimize(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> std::result::Result<Response, AppError> {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let boundary = form::parse_boundary(content_type)?;
    let multipart = form::multipart(
        body.into_data_stream(),
        boundary,
        Some(state.max_upload_bytes),
    );
    let form = form::read_form(multipart).await?;

    let image = form
        .image
        .ok_or_else(|| AppError::BadRequest("No image uploaded".to_string()))?;
    if !image.has_accepted_type() {
        return Err(AppError::BadRequest("Unsupported file format".to_string()));
    }

    let request = OptimizationRequest::from_form(image.bytes, &form.params);
    let result = state.optimizer.optimize(request).await?;
    let stats = ImageStats::from_result(&result).to_header_value()?;

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, result.format.content_type().to_string()),
            (HeaderName::from_static(STATS_HEADER), stats),
        ],
        result.output_bytes,
    )
        .into_response())
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    PayloadTooLarge(String),
    OptimizeFailed(String),
    Internal(String),
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(msg) => {
                warn!(error = %msg, "rejected optimization request");
                AppError::BadRequest(msg)
            }
            Error::Codec(msg) => AppError::OptimizeFailed(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<FormError> for AppError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::TooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            FormError::Boundary => AppError::BadRequest(err.to_string()),
            FormError::Body(msg) => {
                warn!(error = %msg, "unreadable request body");
                AppError::BadRequest("Failed to parse form data".to_string())
            }
            FormError::Multipart(e) => {
                warn!(error = %e, "malformed multipart body");
                AppError::BadRequest("Failed to parse form data".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::OptimizeFailed(msg) => {
                error!(error = %msg, "image optimization failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to optimize image".to_string(),
                )
            }
            AppError::Internal(msg) => {
                error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
