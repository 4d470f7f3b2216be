use crate::{
    config::AuthorizerConfig,
    error::{AuthError, FetchError},
    models::ResourceDescriptor,
    request::{has_dot_segment, strip_query},
};
use async_trait::async_trait;
use axum::http::StatusCode;
use reqwest::{Client, Url, redirect::Policy};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tracing::{debug, instrument, warn};

pub const SHARED_FETCH_SECRET_PARAM: &str = "sharedFetchSecret";

/// Looks up the server-of-record description of a package.
///
/// `Ok(None)` means the front door has no such package. Transport and
/// protocol failures are errors so callers can fail closed.
#[async_trait]
pub trait ResourceResolver: Send + Sync {
    async fn load_resource(
        &self,
        path: &str,
        shared_fetch_secret: &str,
    ) -> Result<Option<ResourceDescriptor>, FetchError>;
}

#[async_trait]
impl<T: ResourceResolver + ?Sized> ResourceResolver for Arc<T> {
    async fn load_resource(
        &self,
        path: &str,
        shared_fetch_secret: &str,
    ) -> Result<Option<ResourceDescriptor>, FetchError> {
        (**self).load_resource(path, shared_fetch_secret).await
    }
}

#[derive(Debug, Clone)]
pub struct HttpResourceResolver {
    base_url: String,
    client: Client,
}

impl HttpResourceResolver {
    pub fn new(cfg: &AuthorizerConfig) -> Result<Self, AuthError> {
        let base_url = cfg.front_door_url().map_err(AuthError::Config)?;

        let timeout = Duration::from_millis(cfg.effective_timeout_ms());
        let connect_timeout = timeout.min(Duration::from_secs(3));
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(15))
            .pool_max_idle_per_host(2)
            .tcp_keepalive(Duration::from_secs(30))
            .redirect(Policy::limited(3))
            .build()
            .map_err(|_| AuthError::Internal)?;

        let resolver = Self {
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            client,
        };
        debug!(
            base_url = resolver.base_url,
            timeout_ms = timeout.as_millis() as u64,
            "initialized front door resolver"
        );
        Ok(resolver)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `<front door><path without query>?sharedFetchSecret=<secret>`
    pub fn resource_url(&self, path: &str, shared_fetch_secret: &str) -> Result<Url, FetchError> {
        let path = strip_query(path);
        if has_dot_segment(path) {
            return Err(FetchError::InvalidUrl(format!(
                "path must not contain '.' or '..' segments: {path}"
            )));
        }
        let raw = if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        let mut url = Url::parse(&raw).map_err(|err| FetchError::InvalidUrl(err.to_string()))?;
        url.query_pairs_mut()
            .append_pair(SHARED_FETCH_SECRET_PARAM, shared_fetch_secret);
        Ok(url)
    }
}

#[async_trait]
impl ResourceResolver for HttpResourceResolver {
    #[instrument(skip(self, shared_fetch_secret), fields(path = strip_query(path)))]
    async fn load_resource(
        &self,
        path: &str,
        shared_fetch_secret: &str,
    ) -> Result<Option<ResourceDescriptor>, FetchError> {
        let url = self.resource_url(path, shared_fetch_secret)?;
        debug!("fetching canonical resource from front door");

        let resp = self.client.get(url).send().await.map_err(|err| {
            if err.is_timeout() {
                warn!("front door request timed out");
                FetchError::Timeout
            } else {
                // the url carries the shared secret
                let err = err.without_url();
                warn!(error = %err, "front door request failed");
                FetchError::Transport(err.to_string())
            }
        })?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!("front door has no such resource");
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            warn!(status, "front door returned non-success");
            return Err(FetchError::Status(status));
        }

        let value = resp.json::<Value>().await.map_err(|err| {
            if err.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Payload(err.without_url().to_string())
            }
        })?;
        if !value.is_object() {
            return Err(FetchError::Payload(
                "expected a JSON object package document".to_string(),
            ));
        }
        let descriptor = serde_json::from_value::<ResourceDescriptor>(value)
            .map_err(|err| FetchError::Payload(err.to_string()))?;
        debug!(
            resolved_name = descriptor.name().unwrap_or("<none>"),
            "resolved canonical resource"
        );
        Ok(Some(descriptor))
    }
}
