//! JSON HTTP surface of the sentiment service.
//!
//! Handlers hand the blocking classifier and store calls to `spawn_blocking`
//! and translate [`DomainError`] into `{error, code}` bodies.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{net::TcpListener, task};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn, Level};

use crate::{
    application::{
        AnalyzeReviewRequest, AnalyzeReviewResponse, BatchPredictRequest, BatchPredictResponse,
        HealthStatusResponse, PredictRequest, ReanalysisResponse, ReviewListQuery, ReviewService,
    },
    domain::{DomainError, ReviewRecord, SentimentCounts, SentimentResult},
    settings::ServerSettings,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to determine local address: {source}")]
    LocalAddr {
        #[source]
        source: std::io::Error,
    },
    #[error("invalid CORS origin `{origin}`")]
    CorsOrigin { origin: String },
    #[error("axum server error: {source}")]
    Serve {
        #[source]
        source: std::io::Error,
    },
}

/// Error body shared by every route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn bad_request(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                error: error.into(),
                code: "INVALID_REQUEST".into(),
            },
        }
    }

    fn internal(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorResponse {
                error: error.into(),
                code: "INTERNAL".into(),
            },
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let status = match &err {
            DomainError::Validation(_) => StatusCode::BAD_REQUEST,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Validation messages are user-facing as-is ("No text provided").
        let message = match &err {
            DomainError::Validation(msg) => msg.clone(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            error!(error = %err, "request failed");
        }
        Self {
            status,
            body: ErrorResponse {
                error: message,
                code: err.code().into(),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[derive(Clone)]
struct AppState {
    service: Arc<ReviewService>,
}

/// Routes only, without CORS or tracing layers.
pub fn build_router(service: Arc<ReviewService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/predict_batch", post(predict_batch))
        .route("/api/analyze-review", post(analyze_review))
        .route("/api/reviews", get(list_reviews))
        .route("/api/reviews/stats", get(review_stats))
        .route("/api/reviews/analyze-all", post(analyze_all))
        .with_state(AppState { service })
}

/// Full application router: routes plus CORS and request tracing.
pub fn build_app(
    service: Arc<ReviewService>,
    settings: &ServerSettings,
) -> Result<Router, ServerError> {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Ok(build_router(service)
        .layer(build_cors_layer(&settings.cors_origins)?)
        .layer(trace_layer))
}

fn build_cors_layer(origins: &[String]) -> Result<CorsLayer, ServerError> {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin).map_err(|_| ServerError::CorsOrigin {
                    origin: origin.clone(),
                })
            })
            .collect::<Result<_, _>>()?;
        AllowOrigin::list(values)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Binds the listener and serves until Ctrl+C or SIGTERM.
pub async fn serve(service: Arc<ReviewService>, settings: ServerSettings) -> Result<(), ServerError> {
    let app = build_app(service, &settings)?;

    let address = settings.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| ServerError::LocalAddr { source })?;
    info!(%local_addr, "ulasan listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await
        .map_err(|source| ServerError::Serve { source })?;

    info!("server shutdown complete");
    Ok(())
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to capture Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to capture SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = sigterm => info!("received SIGTERM, shutting down"),
    }
}

async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, DomainError> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(work)
        .await
        .map_err(|err| ApiError::internal(format!("worker task failed: {err}")))?
        .map_err(ApiError::from)
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthStatusResponse>, ApiError> {
    let service = Arc::clone(&state.service);
    blocking(move || service.health()).await.map(Json)
}

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<SentimentResult>, ApiError> {
    let Json(request) = payload?;
    let service = Arc::clone(&state.service);
    blocking(move || service.predict(&request.text)).await.map(Json)
}

async fn predict_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchPredictRequest>, JsonRejection>,
) -> Result<Json<BatchPredictResponse>, ApiError> {
    let Json(request) = payload?;
    let service = Arc::clone(&state.service);
    let results = blocking(move || service.predict_batch(request.reviews)).await?;
    Ok(Json(BatchPredictResponse { results }))
}

async fn analyze_review(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeReviewRequest>, JsonRejection>,
) -> Result<Json<AnalyzeReviewResponse>, ApiError> {
    let Json(request) = payload?;
    let (details, text) = request.into_parts();
    let service = Arc::clone(&state.service);

    let (result, stored) = blocking(move || service.analyze_review(details, &text)).await?;
    Ok(Json(AnalyzeReviewResponse {
        message: "Review analyzed and saved".into(),
        sentiment: result.sentiment,
        confidence: result.confidence,
        data: vec![stored],
    }))
}

async fn list_reviews(
    State(state): State<AppState>,
    query: Result<Query<ReviewListQuery>, QueryRejection>,
) -> Result<Json<Vec<ReviewRecord>>, ApiError> {
    let Query(query) = query?;
    let service = Arc::clone(&state.service);
    blocking(move || service.list_reviews(query.limit)).await.map(Json)
}

async fn review_stats(State(state): State<AppState>) -> Result<Json<SentimentCounts>, ApiError> {
    let service = Arc::clone(&state.service);
    blocking(move || service.stats()).await.map(Json)
}

async fn analyze_all(State(state): State<AppState>) -> Result<Json<ReanalysisResponse>, ApiError> {
    let service = Arc::clone(&state.service);
    let summary = blocking(move || service.reanalyze_unlabeled()).await?;
    Ok(Json(ReanalysisResponse::from(summary)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_bad_request() {
        let err = ApiError::from(DomainError::validation("No text provided"));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            err.body,
            ErrorResponse {
                error: "No text provided".into(),
                code: "VALIDATION_FAILED".into(),
            }
        );
    }

    #[test]
    fn storage_errors_map_to_internal() {
        let err = ApiError::from(DomainError::storage("db down"));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body.code, "STORAGE_FAILED");
    }

    #[test]
    fn cors_accepts_wildcard_and_lists() {
        assert!(build_cors_layer(&[]).is_ok());
        assert!(build_cors_layer(&["*".into()]).is_ok());
        assert!(build_cors_layer(&["http://localhost:3000".into()]).is_ok());
        assert!(matches!(
            build_cors_layer(&["bad\norigin".into()]),
            Err(ServerError::CorsOrigin { .. })
        ));
    }
}
