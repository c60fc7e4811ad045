//! HTTP surface: `GET /health` and `POST /predict`.

pub mod handlers;

use crate::model::artifact::ModelArtifact;
use crate::utils::error::{ErrorCategory, RiskError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use handlers::{PredictRequest, PredictResponse};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub artifact: Arc<ModelArtifact>,
    pub top_k: usize,
}

impl AppState {
    pub fn new(artifact: ModelArtifact, top_k: usize) -> Self {
        Self {
            artifact: Arc::new(artifact),
            top_k,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/predict", post(handlers::predict))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for RiskError {
    fn into_response(self) -> Response {
        let status = match (&self, self.category()) {
            (RiskError::ValidationError { .. }, _) | (_, ErrorCategory::Configuration) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("❌ Request failed: {}", self);
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
