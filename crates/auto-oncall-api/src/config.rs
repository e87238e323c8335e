//! Configuration types for the HTTP service
//!
//! Sources, later ones overriding earlier ones:
//!  1. `/etc/oncall/config.yaml` (optional)
//!  2. An explicit YAML file passed by the operator (required when given)
//!  3. Environment variables prefixed `ONCALL__` with `__` separators,
//!     e.g. `ONCALL__SERVER__PORT=9090` sets `server.port`
//!  4. `GITHUB_WEBHOOK_SECRET`, `OPSGENIE_TOKEN` and `GITHUB_TOKEN` for the
//!     three secrets
//!
//! Every field carries a serde default, so a partial file is valid input;
//! [`ServiceConfig::validate`] decides whether the result can serve traffic.

use crate::errors::ConfigError;
use auto_oncall_core::adapters::github::DEFAULT_GITHUB_API_URL;
use auto_oncall_core::adapters::opsgenie::DEFAULT_OPSGENIE_API_URL;
use auto_oncall_core::gateway::DEFAULT_OWNER_TEAM;
use auto_oncall_core::identity::DEFAULT_AUTOMATION_ACCOUNT;
use auto_oncall_core::policy::{DEFAULT_BRANCH_REF, DEFAULT_TEST_ENVIRONMENT_PREFIX};
use auto_oncall_core::routing::DEFAULT_ROUTING_RULE_TTL;
use auto_oncall_core::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// System-wide configuration file
pub const DEFAULT_CONFIG_FILE: &str = "/etc/oncall/config.yaml";

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "ONCALL";

/// Environment variable holding the webhook secret
pub const WEBHOOK_SECRET_ENV: &str = "GITHUB_WEBHOOK_SECRET";

/// Environment variable holding the OpsGenie API key
pub const OPSGENIE_TOKEN_ENV: &str = "OPSGENIE_TOKEN";

/// Environment variable holding the GitHub token
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Setting that may be given as a comma-separated environment variable
const REPOSITORIES_KEY: &str = "oncall.repositories";

/// Service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Routing policy and identity mapping
    pub oncall: OncallConfig,

    /// Incident-management API
    pub opsgenie: OpsgenieConfig,

    /// Source-control API
    pub github: GitHubConfig,

    /// Inbound webhook settings
    pub webhook: WebhookConfig,

    /// Outbound HTTP client settings
    pub http_client: HttpClientConfig,

    /// Expired routing rule cleanup
    pub janitor: JanitorConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Routing policy and identity mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OncallConfig {
    /// Repositories whose default-branch pushes are routed
    pub repositories: Vec<String>,

    /// GitHub login to on-call user
    pub users: HashMap<String, String>,

    /// Login whose deployments are attributed to the commit author
    pub automation_account: String,

    /// Deployments to environments with this prefix are ignored
    pub test_environment_prefix: String,

    /// Only pushes to this ref are routed
    pub default_branch_ref: String,

    /// Lifetime encoded in routing rule names
    pub routing_rule_ttl_seconds: u64,
}

impl Default for OncallConfig {
    fn default() -> Self {
        Self {
            repositories: Vec::new(),
            users: HashMap::new(),
            automation_account: DEFAULT_AUTOMATION_ACCOUNT.to_string(),
            test_environment_prefix: DEFAULT_TEST_ENVIRONMENT_PREFIX.to_string(),
            default_branch_ref: DEFAULT_BRANCH_REF.to_string(),
            routing_rule_ttl_seconds: DEFAULT_ROUTING_RULE_TTL.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsgenieConfig {
    pub api_url: String,

    /// Team whose routing rules are managed
    pub team_id: String,

    /// Team that owns created escalations
    pub owner_team: String,

    pub token: SecretString,
}

impl Default for OpsgenieConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_OPSGENIE_API_URL.to_string(),
            team_id: String::new(),
            owner_team: DEFAULT_OWNER_TEAM.to_string(),
            token: SecretString::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_url: String,
    pub token: SecretString,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_GITHUB_API_URL.to_string(),
            token: SecretString::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Shared HMAC secret
    pub secret: SecretString,

    /// Webhook endpoint path
    pub path: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: SecretString::default(),
            path: "/webhook".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Per-request timeout for outbound calls
    pub timeout_seconds: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self { timeout_seconds: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JanitorConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: 300,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from the file and environment sources.
    ///
    /// Does not validate; call [`ServiceConfig::validate`] on the result.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE), explicit_path)
    }

    /// Like [`ServiceConfig::load`] with a different system-wide file.
    pub fn load_from(system_path: &Path, explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder().add_source(
            config::File::from(system_path)
                .required(false)
                .format(config::FileFormat::Yaml),
        );

        if let Some(path) = explicit_path {
            builder = builder.add_source(
                config::File::from(path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key(REPOSITORIES_KEY)
                    .try_parsing(true),
            )
            .build()?;

        let mut service_config: Self = settings.try_deserialize()?;
        service_config.apply_secret_overrides(|key| std::env::var(key).ok());
        Ok(service_config)
    }

    /// Replace secrets with non-empty values returned by `lookup`.
    pub fn apply_secret_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(secret) = lookup(WEBHOOK_SECRET_ENV) {
            self.webhook.secret = SecretString::new(secret);
        }
        if let Some(token) = lookup(OPSGENIE_TOKEN_ENV) {
            self.opsgenie.token = SecretString::new(token);
        }
        if let Some(token) = lookup(GITHUB_TOKEN_ENV) {
            self.github.token = SecretString::new(token);
        }
    }

    /// Check that the configuration can serve traffic
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.webhook.secret.is_empty() {
            return Err(ConfigError::Missing {
                key: "webhook.secret".to_string(),
            });
        }
        if self.opsgenie.token.is_empty() {
            return Err(ConfigError::Missing {
                key: "opsgenie.token".to_string(),
            });
        }
        if self.github.token.is_empty() {
            return Err(ConfigError::Missing {
                key: "github.token".to_string(),
            });
        }
        if self.opsgenie.team_id.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "opsgenie.team_id".to_string(),
            });
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must be non-zero".to_string(),
            });
        }
        if self.oncall.routing_rule_ttl_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "oncall.routing_rule_ttl_seconds must be non-zero".to_string(),
            });
        }
        if !self.webhook.path.starts_with('/') {
            return Err(ConfigError::Invalid {
                message: format!("webhook.path '{}' must start with '/'", self.webhook.path),
            });
        }
        if self.http_client.timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "http_client.timeout_seconds must be non-zero".to_string(),
            });
        }
        if self.janitor.enabled && self.janitor.interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "janitor.interval_seconds must be non-zero when the janitor is enabled"
                    .to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
