use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::{
    domain::{error::DomainError, services::password_service::PasswordHasher},
    usecase::{
        hash_password_usecase::HashPasswordUsecase,
        verify_password_usecase::VerifyPasswordUsecase,
    },
};

/// Request bodies are tiny, anything bigger is rejected before parsing
pub const MAX_BODY_BYTES: usize = 64 * 1024;

pub const SUCCESS_MESSAGE: &str = "Success";
pub const VALIDATION_MESSAGE: &str = "validation error";
pub const INTERNAL_MESSAGE: &str = "Internal Server Error";

// Request

/// json for hash request
#[derive(Serialize, Deserialize)]
pub struct HashRequest {
    pub password: String,
}

/// json for verify request
#[derive(Serialize, Deserialize)]
pub struct VerifyRequest {
    pub password: String,
    pub hash: String,
}

// Response

/// Uniform envelope for every response, success or failure
#[derive(Debug, Serialize, Deserialize)]
pub struct ResultEnvelope<T> {
    pub data: Option<T>,
    pub message: String,
    pub error: bool,
}

impl<T> ResultEnvelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            message: SUCCESS_MESSAGE.to_string(),
            error: false,
        }
    }

    pub fn failure(message: &str) -> Self {
        Self {
            data: None,
            message: message.to_string(),
            error: true,
        }
    }
}

/// How failures map onto HTTP status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPolicy {
    /// every envelope is sent with 200, clients look at the `error` flag
    Compatible,
    /// 422 for validation, 503 when saturated, 500 otherwise
    Strict,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request body: {0}")]
    Rejection(#[from] JsonRejection),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl ApiError {
    fn is_validation(&self) -> bool {
        match self {
            ApiError::Rejection(_) => true,
            ApiError::Domain(e) => e.is_validation(),
        }
    }

    fn status(&self, policy: StatusPolicy) -> StatusCode {
        match policy {
            StatusPolicy::Compatible => StatusCode::OK,
            StatusPolicy::Strict if self.is_validation() => StatusCode::UNPROCESSABLE_ENTITY,
            StatusPolicy::Strict => match self {
                ApiError::Domain(DomainError::Overloaded) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn into_response_with(self, policy: StatusPolicy) -> Response {
        let message = if self.is_validation() {
            debug!(error = %self, "request failed validation");
            VALIDATION_MESSAGE
        } else {
            // detail stays in the log, the client gets the generic message
            error!(error = %self, "request failed");
            INTERNAL_MESSAGE
        };

        (
            self.status(policy),
            Json(ResultEnvelope::<()>::failure(message)),
        )
            .into_response()
    }
}

fn respond<T: Serialize>(outcome: Result<T, ApiError>, policy: StatusPolicy) -> Response {
    match outcome {
        Ok(data) => (StatusCode::OK, Json(ResultEnvelope::success(data))).into_response(),
        Err(e) => e.into_response_with(policy),
    }
}

/* Router Function and Handler Function */

/// function return Router object serving `/hash` and `/verify`
pub fn create_password_router<P: PasswordHasher + Send + Sync + 'static>(
    hash_service: HashPasswordUsecase<P>,
    verify_service: VerifyPasswordUsecase<P>,
    status_policy: StatusPolicy,
) -> Router {
    let state = AppState {
        hash_service: Arc::new(hash_service),
        verify_service: Arc::new(verify_service),
        status_policy,
    };

    Router::new()
        .route("/hash", post(hash::<P>))
        .route("/verify", post(verify::<P>))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

#[derive(Clone)]
pub struct AppState<P: PasswordHasher> {
    pub hash_service: Arc<HashPasswordUsecase<P>>,
    pub verify_service: Arc<VerifyPasswordUsecase<P>>,
    pub status_policy: StatusPolicy,
}

// handler function

/// handler function for hash
async fn hash<P: PasswordHasher + Send + Sync + 'static>(
    State(state): State<AppState<P>>,
    payload: Result<Json<HashRequest>, JsonRejection>,
) -> Response {
    let outcome = async {
        let Json(payload) = payload?;
        let hashed = state.hash_service.hash(payload.password).await?;
        Ok::<_, ApiError>(hashed.into_string())
    }
    .await;

    respond(outcome, state.status_policy)
}

/// handler function for verify
async fn verify<P: PasswordHasher + Send + Sync + 'static>(
    State(state): State<AppState<P>>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Response {
    let outcome = async {
        let Json(payload) = payload?;
        let matches = state
            .verify_service
            .verify(payload.password, payload.hash)
            .await?;
        Ok::<_, ApiError>(matches)
    }
    .await;

    respond(outcome, state.status_policy)
}
