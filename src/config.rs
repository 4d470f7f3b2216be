use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use config::{Config as SettingsLoader, Environment};
use reqwest::Url;
use serde::Deserialize;
use std::{
    fmt,
    path::{Path, PathBuf},
};

pub const DEFAULT_USERNAME: &str = "foo";
pub const DEFAULT_PASSWORD: &str = "bar";
pub const DEFAULT_TOKEN: &str = "foo-token";
pub const DEFAULT_ALLOWED_PACKAGE: &str = "@foo/bar";
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 3_000;
pub const MIN_FETCH_TIMEOUT_MS: u64 = 250;

/// The single credential pair the static authenticator accepts, and the token
/// it hands back on success.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatorConfig {
    pub username: String,
    pub password: String,
    pub token: String,
}

impl Default for AuthenticatorConfig {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            token: DEFAULT_TOKEN.to_string(),
        }
    }
}

impl fmt::Debug for AuthenticatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatorConfig")
            .field("username", &self.username)
            .field("password", &"***")
            .field("token", &"***")
            .finish()
    }
}

/// Deployment settings for the authorizer. Fixed once the authorizer is built.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizerConfig {
    pub front_door_host: String,
    pub shared_fetch_secret: String,
    pub valid_token: String,
    pub allowed_package: String,
    pub timeout_ms: u64,
}

impl Default for AuthorizerConfig {
    fn default() -> Self {
        Self {
            front_door_host: String::new(),
            shared_fetch_secret: String::new(),
            valid_token: DEFAULT_TOKEN.to_string(),
            allowed_package: DEFAULT_ALLOWED_PACKAGE.to_string(),
            timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
        }
    }
}

impl fmt::Debug for AuthorizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizerConfig")
            .field("front_door_host", &self.front_door_host)
            .field("shared_fetch_secret", &"***")
            .field("valid_token", &"***")
            .field("allowed_package", &self.allowed_package)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl AuthorizerConfig {
    pub fn front_door_url(&self) -> Result<Url, String> {
        let host = self.front_door_host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err("authorizer.frontDoorHost is required".to_string());
        }
        let url = Url::parse(host).map_err(|err| format!("invalid frontDoorHost '{host}': {err}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!(
                "frontDoorHost must use http or https, got '{}'",
                url.scheme()
            ));
        }
        Ok(url)
    }

    pub fn effective_timeout_ms(&self) -> u64 {
        self.timeout_ms.max(MIN_FETCH_TIMEOUT_MS)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.front_door_url()?;
        if self.valid_token.is_empty() {
            return Err("authorizer.validToken must not be empty".to_string());
        }
        if self.allowed_package.trim().is_empty() {
            return Err("authorizer.allowedPackage must not be empty".to_string());
        }
        Ok(())
    }
}

impl AuthenticatorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err("authenticator.username and authenticator.password are required".to_string());
        }
        if self.token.is_empty() {
            return Err("authenticator.token must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_level: String,
    pub authenticator: AuthenticatorConfig,
    pub authorizer: AuthorizerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            authenticator: AuthenticatorConfig::default(),
            authorizer: AuthorizerConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawEnvConfig {
    config: Option<String>,
    config_base64: Option<String>,
    log_level: Option<String>,
    auth_username: Option<String>,
    auth_password: Option<String>,
    auth_token: Option<String>,
    front_door_host: Option<String>,
    shared_fetch_secret: Option<String>,
    valid_token: Option<String>,
    allowed_package: Option<String>,
    fetch_timeout_ms: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let env_cfg = load_gate_env()?;
        let mut cfg = Self::default();
        cfg.apply_env_config_sources_if_present(&env_cfg)?;
        cfg.apply_env_overrides(&env_cfg);
        Ok(cfg)
    }

    /// An explicit file replaces `REGISTRY_GATE_CONFIG`/`_BASE64`; scalar
    /// `REGISTRY_GATE_*` overrides still apply on top.
    pub fn from_env_with_config_file(config_path: PathBuf) -> Result<Self, String> {
        let env_cfg = load_gate_env()?;
        let mut cfg = Self::from_yaml_file(config_path)?;
        cfg.apply_env_overrides(&env_cfg);
        Ok(cfg)
    }

    pub fn from_yaml_file(path: PathBuf) -> Result<Self, String> {
        let text = std::fs::read_to_string(&path)
            .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
        Self::from_yaml_str(&source_name(&path), &text)
    }

    pub fn from_yaml_str(source: &str, text: &str) -> Result<Self, String> {
        let parsed = serde_yaml::from_str::<YamlConfig>(text)
            .map_err(|err| format!("failed to parse {source}: {err}"))?;
        Ok(Self::from_yaml_config(parsed))
    }

    pub fn validate(&self) -> Result<(), String> {
        self.authenticator.validate()?;
        self.authorizer.validate()
    }

    fn from_yaml_config(parsed: YamlConfig) -> Self {
        let mut cfg = Self::default();
        if let Some(level) = parsed.log.and_then(|log| log.level)
            && !level.trim().is_empty()
        {
            cfg.log_level = level;
        }
        if let Some(auth) = parsed.authenticator {
            if let Some(value) = auth.username {
                cfg.authenticator.username = value;
            }
            if let Some(value) = auth.password {
                cfg.authenticator.password = value;
            }
            if let Some(value) = auth.token {
                cfg.authenticator.token = value;
            }
        }
        if let Some(authz) = parsed.authorizer {
            if let Some(value) = authz.front_door_host {
                cfg.authorizer.front_door_host = normalize_host(&value);
            }
            if let Some(value) = authz.shared_fetch_secret {
                cfg.authorizer.shared_fetch_secret = value;
            }
            if let Some(value) = authz.valid_token {
                cfg.authorizer.valid_token = value;
            }
            if let Some(value) = authz.allowed_package {
                cfg.authorizer.allowed_package = value;
            }
            if let Some(value) = authz.timeout_ms {
                cfg.authorizer.timeout_ms = value;
            }
        }
        cfg
    }

    fn apply_env_config_sources_if_present(
        &mut self,
        env_cfg: &RawEnvConfig,
    ) -> Result<(), String> {
        let config_path = env_cfg
            .config
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let config_b64 = env_cfg
            .config_base64
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());

        match (config_path, config_b64) {
            (Some(_), Some(_)) => Err(
                "REGISTRY_GATE_CONFIG and REGISTRY_GATE_CONFIG_BASE64 are both set; use only one"
                    .to_string(),
            ),
            (Some(path), None) => {
                *self = Self::from_yaml_file(PathBuf::from(path))
                    .map_err(|err| format!("failed to load REGISTRY_GATE_CONFIG={path}: {err}"))?;
                Ok(())
            }
            (None, Some(value)) => {
                let compact = value
                    .chars()
                    .filter(|ch| !ch.is_ascii_whitespace())
                    .collect::<String>();
                let decoded = B64.decode(compact).map_err(|err| {
                    format!("failed to decode REGISTRY_GATE_CONFIG_BASE64: {err}")
                })?;
                let yaml = String::from_utf8(decoded).map_err(|err| {
                    format!(
                        "failed to decode REGISTRY_GATE_CONFIG_BASE64: decoded bytes are not UTF-8 ({err})"
                    )
                })?;
                *self = Self::from_yaml_str("REGISTRY_GATE_CONFIG_BASE64", &yaml)
                    .map_err(|err| format!("failed to load REGISTRY_GATE_CONFIG_BASE64: {err}"))?;
                Ok(())
            }
            (None, None) => Ok(()),
        }
    }

    fn apply_env_overrides(&mut self, env_cfg: &RawEnvConfig) {
        if let Some(value) = env_cfg.log_level.as_deref()
            && !value.trim().is_empty()
        {
            self.log_level = value.to_string();
        }
        if let Some(value) = env_cfg.auth_username.as_deref() {
            self.authenticator.username = value.to_string();
        }
        if let Some(value) = env_cfg.auth_password.as_deref() {
            self.authenticator.password = value.to_string();
        }
        if let Some(value) = env_cfg.auth_token.as_deref() {
            self.authenticator.token = value.to_string();
        }
        if let Some(value) = env_cfg.front_door_host.as_deref() {
            self.authorizer.front_door_host = normalize_host(value);
        }
        if let Some(value) = env_cfg.shared_fetch_secret.as_deref() {
            self.authorizer.shared_fetch_secret = value.to_string();
        }
        if let Some(value) = env_cfg.valid_token.as_deref() {
            self.authorizer.valid_token = value.to_string();
        }
        if let Some(value) = env_cfg.allowed_package.as_deref()
            && !value.trim().is_empty()
        {
            self.authorizer.allowed_package = value.trim().to_string();
        }
        if let Some(parsed) = parse_env_value::<u64>(env_cfg.fetch_timeout_ms.as_deref()) {
            self.authorizer.timeout_ms = parsed;
        }
    }
}

fn load_gate_env() -> Result<RawEnvConfig, String> {
    let settings = SettingsLoader::builder()
        .add_source(Environment::with_prefix("REGISTRY_GATE").try_parsing(false))
        .build()
        .map_err(|err| format!("failed to load REGISTRY_GATE_* environment: {err}"))?;

    Ok(RawEnvConfig {
        config: env_value_for_var(&settings, "REGISTRY_GATE_CONFIG"),
        config_base64: env_value_for_var(&settings, "REGISTRY_GATE_CONFIG_BASE64"),
        log_level: env_value_for_var(&settings, "REGISTRY_GATE_LOG_LEVEL"),
        auth_username: env_value_for_var(&settings, "REGISTRY_GATE_AUTH_USERNAME"),
        auth_password: env_value_for_var(&settings, "REGISTRY_GATE_AUTH_PASSWORD"),
        auth_token: env_value_for_var(&settings, "REGISTRY_GATE_AUTH_TOKEN"),
        front_door_host: env_value_for_var(&settings, "REGISTRY_GATE_FRONT_DOOR_HOST"),
        shared_fetch_secret: env_value_for_var(&settings, "REGISTRY_GATE_SHARED_FETCH_SECRET"),
        valid_token: env_value_for_var(&settings, "REGISTRY_GATE_VALID_TOKEN"),
        allowed_package: env_value_for_var(&settings, "REGISTRY_GATE_ALLOWED_PACKAGE"),
        fetch_timeout_ms: env_value_for_var(&settings, "REGISTRY_GATE_FETCH_TIMEOUT_MS"),
    })
}

fn env_value_for_var(settings: &SettingsLoader, env_var: &str) -> Option<String> {
    let key = env_var
        .strip_prefix("REGISTRY_GATE_")
        .unwrap_or(env_var)
        .to_ascii_lowercase();
    settings
        .get_string(&key)
        .ok()
        .or_else(|| settings.get_string(&key.to_ascii_uppercase()).ok())
}

fn parse_env_value<T>(raw: Option<&str>) -> Option<T>
where
    T: std::str::FromStr,
{
    raw.and_then(|value| value.trim().parse::<T>().ok())
}

fn normalize_host(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}

fn source_name(path: &Path) -> String {
    path.display().to_string()
}

#[derive(Debug, Deserialize)]
struct YamlConfig {
    log: Option<YamlLog>,
    authenticator: Option<YamlAuthenticator>,
    authorizer: Option<YamlAuthorizer>,
}

#[derive(Debug, Deserialize)]
struct YamlLog {
    level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YamlAuthenticator {
    username: Option<String>,
    password: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YamlAuthorizer {
    #[serde(rename = "frontDoorHost", alias = "front_door_host")]
    front_door_host: Option<String>,
    #[serde(rename = "sharedFetchSecret", alias = "shared_fetch_secret")]
    shared_fetch_secret: Option<String>,
    #[serde(rename = "validToken", alias = "valid_token")]
    valid_token: Option<String>,
    #[serde(rename = "allowedPackage", alias = "allowed_package")]
    allowed_package: Option<String>,
    #[serde(rename = "timeoutMs", alias = "timeout_ms")]
    timeout_ms: Option<u64>,
}
