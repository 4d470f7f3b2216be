use axum::{
    Json,
    body::Body,
    http::StatusCode,
    http::header,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Failures surfaced by the authenticator and authorizer.
///
/// A deny decision is never one of these: authorization returns `Ok(false)`
/// for "no" and reserves errors for "could not decide".
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("incorrect password")]
    InvalidCredentials,
    #[error("missing or malformed authorization header (expected 'Bearer <token>')")]
    MalformedHeader,
    #[error("malformed authorization request: {0}")]
    MalformedRequest(String),
    #[error("canonical resource lookup failed: {0}")]
    UpstreamUnavailable(#[source] FetchError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("internal server error")]
    Internal,
}

/// Resolver-level failures. A missing resource is not an error; the resolver
/// reports it as `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("front door unreachable: {0}")]
    Transport(String),
    #[error("front door request timed out")]
    Timeout,
    #[error("front door returned status {0}")]
    Status(u16),
    #[error("front door returned an invalid payload: {0}")]
    Payload(String),
    #[error("invalid front door url: {0}")]
    InvalidUrl(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials | AuthError::MalformedHeader => StatusCode::UNAUTHORIZED,
            AuthError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            AuthError::Config(_) | AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FetchError> for AuthError {
    fn from(err: FetchError) -> Self {
        AuthError::UpstreamUnavailable(err)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Upstream and internal details stay in the logs, not the response.
        let message = match &self {
            AuthError::UpstreamUnavailable(_) => "canonical resource lookup failed".to_string(),
            AuthError::Config(_) | AuthError::Internal => "unknown error".to_string(),
            other => other.to_string(),
        };
        let body = serde_json::to_vec(&ErrorBody { error: &message })
            .unwrap_or_else(|_| b"{\"error\":\"unknown error\"}".to_vec());
        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap_or_else(|_| {
                let fallback = Json(ErrorBody {
                    error: "unknown error",
                });
                (StatusCode::INTERNAL_SERVER_ERROR, fallback).into_response()
            })
    }
}
