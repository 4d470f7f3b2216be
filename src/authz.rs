use crate::{
    config::AuthorizerConfig,
    error::AuthError,
    models::Operation,
    request::AuthorizationRequest,
    resolver::{HttpResourceResolver, ResourceResolver},
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Access hook consulted by the host on every package request.
///
/// `Ok(false)` is a deny. An error means no decision could be made and the
/// host must not treat it as an allow.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<bool, AuthError>;
}

/// Decides reads against the front door's copy of the package and publishes
/// against the bearer token plus the asserted package name.
///
/// Publish decisions do not consult the front door. Ownership of the package
/// is never checked on that path, so a real deployment has to add the lookup
/// before relying on it.
#[derive(Debug, Clone)]
pub struct FrontDoorAuthorizer<R = HttpResourceResolver> {
    config: Arc<AuthorizerConfig>,
    resolver: R,
}

impl FrontDoorAuthorizer<HttpResourceResolver> {
    pub fn new(config: AuthorizerConfig) -> Result<Self, AuthError> {
        config.validate().map_err(AuthError::Config)?;
        let resolver = HttpResourceResolver::new(&config)?;
        Ok(Self::with_resolver(config, resolver))
    }
}

impl<R: ResourceResolver> FrontDoorAuthorizer<R> {
    /// The resolver owns the front door address; `config.front_door_host` is
    /// not consulted here.
    pub fn with_resolver(config: AuthorizerConfig, resolver: R) -> Self {
        Self {
            config: Arc::new(config),
            resolver,
        }
    }

    pub fn config(&self) -> &AuthorizerConfig {
        &self.config
    }

    #[instrument(skip(self, request), fields(path = request.resource_path()))]
    pub async fn authorize_publish(&self, request: &AuthorizationRequest) -> Result<bool, AuthError> {
        let token = request.bearer_token().inspect_err(|_| {
            warn!("publish request without a usable bearer token");
        })?;

        let asserted_name = request.body().and_then(|body| body.name());
        let token_ok = token == self.config.valid_token;
        let name_ok = asserted_name == Some(self.config.allowed_package.as_str());
        let allowed = token_ok && name_ok;

        debug!(
            token_ok,
            asserted_name = asserted_name.unwrap_or("<none>"),
            allowed,
            "publish decision"
        );
        Ok(allowed)
    }

    #[instrument(skip(self, request), fields(path = request.resource_path()))]
    pub async fn authorize_read(&self, request: &AuthorizationRequest) -> Result<bool, AuthError> {
        let resolved = self
            .resolver
            .load_resource(request.resource_path(), &self.config.shared_fetch_secret)
            .await
            .inspect_err(|err| {
                warn!(error = %err, "front door lookup failed; no read decision");
            })?;

        let Some(resource) = resolved else {
            debug!(allowed = false, "package unknown to front door");
            return Ok(false);
        };

        let allowed = resource.name() == Some(self.config.allowed_package.as_str());
        debug!(
            resolved_name = resource.name().unwrap_or("<none>"),
            allowed,
            "read decision"
        );
        Ok(allowed)
    }
}

#[async_trait]
impl<R: ResourceResolver> Authorizer for FrontDoorAuthorizer<R> {
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<bool, AuthError> {
        match request.operation() {
            Operation::Publish => self.authorize_publish(request).await,
            Operation::Read => self.authorize_read(request).await,
        }
    }
}
