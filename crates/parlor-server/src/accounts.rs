//! Account endpoints: signup, login and server lookup.
//!
//! All three take url-encoded form posts. Store calls run on the blocking
//! pool since `rusqlite` is synchronous.

use axum::Json;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parlor_core::{Server, User};
use parlor_store::StoreError;
use serde::Deserialize;
use tracing::{info, warn};

use crate::server::AppState;

/// Body returned by a successful signup.
pub const SIGNUP_OK: &str = "Form submitted successfully!";

/// Username and password form.
#[derive(Deserialize)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Plaintext password, hashed before storage.
    pub password: String,
}

/// Server lookup form: credentials plus the server name.
#[derive(Deserialize)]
pub struct ServerForm {
    /// Account name.
    pub username: String,
    /// Plaintext password.
    pub password: String,
    /// Server to find or create.
    pub name: String,
}

/// Errors returned by account handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body could not be parsed.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The store refused the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Anything else; details are logged, not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Store(StoreError::InvalidInput(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Store(StoreError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = if status.is_server_error() {
            warn!(error = %self, "account request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, body).into_response()
    }
}

/// Run a store call on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

/// POST /submit
pub async fn submit(
    State(state): State<AppState>,
    form: Result<Form<Credentials>, FormRejection>,
) -> Result<&'static str, ApiError> {
    let Form(creds) = form?;
    let users = state.users.clone();
    let user = blocking(move || users.signup(&creds.username, &creds.password)).await?;
    info!(user_id = user.id, username = %user.username, "account created");
    Ok(SIGNUP_OK)
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    form: Result<Form<Credentials>, FormRejection>,
) -> Result<Json<User>, ApiError> {
    let Form(creds) = form?;
    let users = state.users.clone();
    let user = blocking(move || users.login(&creds.username, &creds.password)).await?;
    info!(user_id = user.id, "login");
    Ok(Json(user))
}

/// POST /servers
pub async fn servers(
    State(state): State<AppState>,
    form: Result<Form<ServerForm>, FormRejection>,
) -> Result<Json<Server>, ApiError> {
    let Form(form) = form?;
    let users = state.users.clone();
    let servers = state.servers.clone();
    let server = blocking(move || {
        let mut user = users.login(&form.username, &form.password)?;
        servers.find_or_create(&form.name, &mut user)
    })
    .await?;
    Ok(Json(server))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_status() {
        let cases = [
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (
                StoreError::InvalidInput("x".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (StoreError::NotFound("x".into()).into(), StatusCode::NOT_FOUND),
            (StoreError::Conflict("x".into()).into(), StatusCode::CONFLICT),
            (StoreError::InvalidCredentials.into(), StatusCode::UNAUTHORIZED),
            (
                StoreError::Database("x".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err}");
        }
    }

    #[tokio::test]
    async fn server_errors_hide_details() {
        let resp = ApiError::Store(StoreError::Database("disk I/O secret".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"internal server error");
    }

    #[tokio::test]
    async fn blocking_propagates_store_error() {
        let err = blocking(|| Err::<(), _>(StoreError::InvalidCredentials))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
