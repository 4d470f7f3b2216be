use crate::{
    config::AuthenticatorConfig,
    error::AuthError,
    models::{AuthSession, Credentials, Identity},
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

/// Login hook consulted by the host on `npm login`.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthSession, AuthError>;
}

/// Accepts exactly one configured name/password pair and hands back the
/// configured token.
///
/// The returned identity echoes the name and email from the login payload.
/// Nothing here derives identity from a server of record; a hardened
/// deployment should replace this with a real verifier.
#[derive(Clone)]
pub struct StaticAuthenticator {
    name_digest: [u8; 32],
    password_digest: [u8; 32],
    token: String,
}

impl StaticAuthenticator {
    pub fn new(cfg: &AuthenticatorConfig) -> Result<Self, AuthError> {
        cfg.validate().map_err(AuthError::Config)?;
        Ok(Self {
            name_digest: digest(&cfg.username),
            password_digest: digest(&cfg.password),
            token: cfg.token.clone(),
        })
    }

    fn matches(&self, credentials: &Credentials) -> bool {
        // Both sides are always compared.
        let name_ok = digest(&credentials.name) == self.name_digest;
        let password_ok = digest(&credentials.password) == self.password_digest;
        name_ok & password_ok
    }
}

impl std::fmt::Debug for StaticAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticAuthenticator").finish_non_exhaustive()
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    #[instrument(skip(self, credentials), fields(username = credentials.name.as_str()))]
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthSession, AuthError> {
        if !self.matches(credentials) {
            warn!("login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        debug!("login accepted");
        Ok(AuthSession {
            token: self.token.clone(),
            user: Identity {
                email: credentials.email.clone(),
                name: credentials.name.clone(),
            },
        })
    }
}

fn digest(value: &str) -> [u8; 32] {
    let mut out = [0_u8; 32];
    out.copy_from_slice(&Sha256::digest(value.as_bytes()));
    out
}
