use crate::{
    error::AuthError,
    models::{Operation, ResourceDescriptor},
};
use axum::http::{HeaderMap, Method, Uri, header};
use serde_json::Value;

/// Normalized request handed over by the host for an authorization decision.
///
/// `body` is whatever the client asserted. Read decisions never look at it.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    operation: Operation,
    path: String,
    headers: HeaderMap,
    body: Option<ResourceDescriptor>,
}

impl AuthorizationRequest {
    pub fn new(
        operation: Operation,
        path: impl Into<String>,
        headers: HeaderMap,
        body: Option<ResourceDescriptor>,
    ) -> Result<Self, AuthError> {
        let path = path.into();
        validate_path(&path)?;
        Ok(Self {
            operation,
            path,
            headers,
            body,
        })
    }

    /// Builds a request from the pieces a host router already parsed off the
    /// wire. An empty body is treated as absent.
    pub fn from_http_parts(
        method: &Method,
        uri: &Uri,
        headers: HeaderMap,
        body: &[u8],
    ) -> Result<Self, AuthError> {
        let path = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());
        let body = parse_body(body)?;
        Self::new(Operation::from_method(method), path, headers, body)
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&ResourceDescriptor> {
        self.body.as_ref()
    }

    /// The path used to locate the canonical resource: everything before `?`.
    pub fn resource_path(&self) -> &str {
        strip_query(&self.path)
    }

    pub fn bearer_token(&self) -> Result<&str, AuthError> {
        let raw = self
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthError::MalformedHeader)?
            .to_str()
            .map_err(|_| AuthError::MalformedHeader)?;
        parse_bearer(raw).ok_or(AuthError::MalformedHeader)
    }
}

/// Lenient on purpose: accepts `Bearer ` or `bearer ` and trims surrounding
/// whitespace from the token.
pub fn parse_bearer(value: &str) -> Option<&str> {
    let value = value.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() { None } else { Some(token) }
}

pub fn strip_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(head, _)| head)
}

/// Whether the path (query excluded) has a `.` or `..` segment, plain or
/// percent-encoded. URL parsers also split on `\` and drop tabs and newlines,
/// so the check does too.
pub fn has_dot_segment(path: &str) -> bool {
    strip_query(path).split(['/', '\\']).any(|segment| {
        let cleaned = segment
            .chars()
            .filter(|ch| !matches!(ch, '\t' | '\n' | '\r'))
            .collect::<String>()
            .to_ascii_lowercase()
            .replace("%2e", ".");
        cleaned == "." || cleaned == ".."
    })
}

fn validate_path(path: &str) -> Result<(), AuthError> {
    if path.is_empty() {
        return Err(AuthError::MalformedRequest("path is empty".to_string()));
    }
    if !path.starts_with('/') {
        return Err(AuthError::MalformedRequest(format!(
            "path must start with '/': {path}"
        )));
    }
    if has_dot_segment(path) {
        return Err(AuthError::MalformedRequest(format!(
            "path must not contain '.' or '..' segments: {path}"
        )));
    }
    Ok(())
}

fn parse_body(body: &[u8]) -> Result<Option<ResourceDescriptor>, AuthError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let value = serde_json::from_slice::<Value>(body)
        .map_err(|err| AuthError::MalformedRequest(format!("body is not valid JSON: {err}")))?;
    if !value.is_object() {
        return Err(AuthError::MalformedRequest(
            "body must be a JSON object".to_string(),
        ));
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|err| AuthError::MalformedRequest(format!("invalid package document: {err}")))
}
