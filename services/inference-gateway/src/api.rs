//! HTTP surface of the gateway.
//!
//! - `GET /health` liveness check
//! - `GET /models` entries of the model directory
//! - `POST /predict` run the default model on one feature vector
//!
//! Errors leave as `{"detail": "..."}`. Body validation failures are 422, a body that
//! cannot be buffered keeps its own status (413 over the size limit), a missing
//! artifact is 503 and anything that breaks during load or inference is 500.

use axum::{
    async_trait,
    body::Bytes,
    extract::{rejection::{BytesRejection, JsonRejection}, FromRequest, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use crate::dispatch::Dispatcher;
use crate::error::PredictError;

#[derive(Clone)]
pub struct AppState {
    dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self { Self { dispatcher } }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse { pub status: String }

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionRequest { pub features: Vec<f32> }

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictionResponse { pub y: Vec<f32> }

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody { pub detail: String }

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{detail}")]
    Body { status: StatusCode, detail: String },
    #[error("Model not loaded")]
    ModelUnavailable,
    #[error("Internal server error during prediction")]
    Prediction,
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Body { status, .. } => *status,
            ApiError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Prediction | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody { detail: self.to_string() })).into_response()
    }
}

impl From<PredictError> for ApiError {
    fn from(e: PredictError) -> Self {
        match e {
            PredictError::ModelUnavailable { path } => {
                warn!(path=%path.display(), "prediction_rejected_model_unavailable");
                ApiError::ModelUnavailable
            }
            other => {
                error!(error=%other, "prediction_failed");
                ApiError::Prediction
            }
        }
    }
}

/// `Json` extractor that maps schema, syntax and content-type failures to 422.
///
/// A body without a content type is parsed as JSON. Failures to buffer the body keep
/// their own status.
pub struct ValidJson<T>(pub T);

fn invalid_body(detail: String) -> ApiError {
    warn!(%detail, "request_body_invalid");
    ApiError::Validation(detail)
}

fn unbuffered_body(r: BytesRejection) -> ApiError {
    let (status, detail) = (r.status(), r.body_text());
    warn!(%status, %detail, "request_body_unreadable");
    ApiError::Body { status, detail }
}

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !req.headers().contains_key(header::CONTENT_TYPE) {
            let bytes = Bytes::from_request(req, state).await.map_err(unbuffered_body)?;
            return serde_json::from_slice(&bytes)
                .map(Self)
                .map_err(|e| invalid_body(format!("Failed to deserialize the JSON body: {e}")));
        }
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(JsonRejection::BytesRejection(r)) => Err(unbuffered_body(r)),
            Err(rejection) => Err(invalid_body(rejection.body_text())),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/models", get(list_models))
        .route("/predict", post(predict))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> { Json(HealthResponse { status: "ok".into() }) }

async fn list_models(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let registry = state.dispatcher.registry().clone();
    let dir = registry.model_dir().to_path_buf();
    match tokio::task::spawn_blocking(move || registry.list_artifacts()).await {
        Ok(Ok(names)) => Ok(Json(names)),
        Ok(Err(e)) => {
            error!(dir=%dir.display(), error=%e, "model_dir_unreadable");
            Err(ApiError::Internal)
        }
        Err(e) => {
            error!(error=%e, "list_models_task_failed");
            Err(ApiError::Internal)
        }
    }
}

async fn predict(State(state): State<AppState>, ValidJson(req): ValidJson<PredictionRequest>) -> Result<Json<PredictionResponse>, ApiError> {
    let y = state.dispatcher.predict_blocking(req.features).await?;
    Ok(Json(PredictionResponse { y }))
}
