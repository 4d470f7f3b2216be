use crate::{
    auth::{Authenticator, StaticAuthenticator},
    authz::{Authorizer, FrontDoorAuthorizer},
    config::Config,
    error::AuthError,
    models::{AuthSession, Credentials},
    observability,
    request::AuthorizationRequest,
};
use std::sync::Arc;
use tracing::instrument;

/// Both hooks the host calls on its request path, built from one config.
#[derive(Clone)]
pub struct TrustBoundary {
    authenticator: Arc<dyn Authenticator>,
    authorizer: Arc<dyn Authorizer>,
}

impl TrustBoundary {
    pub fn new(authenticator: Arc<dyn Authenticator>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            authenticator,
            authorizer,
        }
    }

    #[instrument(skip(config), fields(front_door = config.authorizer.front_door_host.as_str()))]
    pub fn from_config(config: &Config) -> Result<Self, AuthError> {
        let authenticator = StaticAuthenticator::new(&config.authenticator)?;
        let authorizer = FrontDoorAuthorizer::new(config.authorizer.clone())?;
        tracing::info!(
            allowed_package = config.authorizer.allowed_package.as_str(),
            "trust boundary ready"
        );
        Ok(Self::new(Arc::new(authenticator), Arc::new(authorizer)))
    }

    /// Loads `REGISTRY_GATE_*` configuration, installs tracing at the
    /// configured level and builds the boundary.
    pub fn from_env() -> Result<Self, AuthError> {
        let config = Config::from_env().map_err(AuthError::Config)?;
        let tracing_settings = observability::init_from_env(&config.log_level);
        tracing::debug!(
            log_filter = tracing_settings.filter,
            log_format = tracing_settings.log_format.as_str(),
            installed = tracing_settings.installed,
            "initialized tracing subscriber"
        );
        Self::from_config(&config)
    }

    pub fn authenticator(&self) -> &Arc<dyn Authenticator> {
        &self.authenticator
    }

    pub fn authorizer(&self) -> &Arc<dyn Authorizer> {
        &self.authorizer
    }

    pub async fn authenticate(&self, credentials: &Credentials) -> Result<AuthSession, AuthError> {
        self.authenticator.authenticate(credentials).await
    }

    pub async fn authorize(&self, request: &AuthorizationRequest) -> Result<bool, AuthError> {
        self.authorizer.authorize(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::TrustBoundary;
    use crate::{config::Config, error::AuthError};

    #[test]
    fn from_config_requires_front_door() {
        let err = TrustBoundary::from_config(&Config::default())
            .err()
            .expect("missing front door");
        assert!(matches!(err, AuthError::Config(_)));
    }

    #[test]
    fn from_config_builds_with_front_door() {
        let mut cfg = Config::default();
        cfg.authorizer.front_door_host = "http://127.0.0.1:1".to_string();
        assert!(TrustBoundary::from_config(&cfg).is_ok());
    }
}
