//! Worker configuration.

use std::path::PathBuf;

use auctioneer_gateway::GatewayConfig;

use crate::error::{WorkerError, WorkerResult};

/// Default location of the rule file.
pub const DEFAULT_RULE_PATH: &str = "rule.json";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, ANSI colored
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// How the worker obtains its API token.
#[derive(Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// Token issued ahead of time
    Token(String),
    /// Authorization code to exchange for a token
    AuthorizationCode {
        client_id: String,
        client_secret: String,
        code: String,
    },
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token(***)"),
            Self::AuthorizationCode { client_id, .. } => f
                .debug_struct("AuthorizationCode")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

/// Worker configuration.
#[derive(Clone)]
pub struct WorkerConfig {
    /// API token
    pub token: Option<String>,
    /// OAuth application id, used with `oauth_code`
    pub oauth_client_id: Option<String>,
    /// OAuth application secret, used with `oauth_code`
    pub oauth_client_secret: Option<String>,
    /// Authorization code to exchange when no token is set
    pub oauth_code: Option<String>,
    /// Rule file (JSON)
    pub rule_path: PathBuf,
    pub log_format: LogFormat,
    pub gateway: GatewayConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            token: None,
            oauth_client_id: None,
            oauth_client_secret: None,
            oauth_code: None,
            rule_path: PathBuf::from(DEFAULT_RULE_PATH),
            log_format: LogFormat::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl std::fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("oauth_client_id", &self.oauth_client_id)
            .field("rule_path", &self.rule_path)
            .field("log_format", &self.log_format)
            .field("gateway", &self.gateway)
            .finish_non_exhaustive()
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            token: non_empty_env("DIRECT_TOKEN"),
            oauth_client_id: non_empty_env("DIRECT_OAUTH_CLIENT_ID"),
            oauth_client_secret: non_empty_env("DIRECT_OAUTH_CLIENT_SECRET"),
            oauth_code: non_empty_env("DIRECT_OAUTH_CODE"),
            rule_path: non_empty_env("AUCTIONEER_RULE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RULE_PATH)),
            log_format: std::env::var("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
            gateway: GatewayConfig::from_env(),
        }
    }

    /// Where the API token comes from. A configured token wins.
    pub fn token_source(&self) -> WorkerResult<TokenSource> {
        if let Some(token) = &self.token {
            return Ok(TokenSource::Token(token.clone()));
        }

        match (&self.oauth_client_id, &self.oauth_client_secret, &self.oauth_code) {
            (Some(client_id), Some(client_secret), Some(code)) => {
                Ok(TokenSource::AuthorizationCode {
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    code: code.clone(),
                })
            }
            _ => Err(WorkerError::config_error(
                "set DIRECT_TOKEN, or DIRECT_OAUTH_CLIENT_ID, DIRECT_OAUTH_CLIENT_SECRET and DIRECT_OAUTH_CODE",
            )),
        }
    }

    pub fn validate(&self) -> WorkerResult<()> {
        self.token_source()?;
        self.gateway.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 6] = [
        "DIRECT_TOKEN",
        "DIRECT_OAUTH_CLIENT_ID",
        "DIRECT_OAUTH_CLIENT_SECRET",
        "DIRECT_OAUTH_CODE",
        "AUCTIONEER_RULE_PATH",
        "LOG_FORMAT",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Text);
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        let config = WorkerConfig::from_env();
        assert_eq!(config.token, None);
        assert_eq!(config.rule_path, PathBuf::from(DEFAULT_RULE_PATH));
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(matches!(config.validate(), Err(WorkerError::ConfigError(_))));
    }

    #[test]
    #[serial]
    fn test_token_wins_over_oauth() {
        clear_env();
        std::env::set_var("DIRECT_TOKEN", "abc");
        std::env::set_var("DIRECT_OAUTH_CLIENT_ID", "id");
        std::env::set_var("LOG_FORMAT", "json");

        let config = WorkerConfig::from_env();
        assert_eq!(config.token_source().unwrap(), TokenSource::Token("abc".to_string()));
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.validate().is_ok());
        assert!(!format!("{:?}", config).contains("abc"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_authorization_code_source() {
        clear_env();
        std::env::set_var("DIRECT_OAUTH_CLIENT_ID", "id");
        std::env::set_var("DIRECT_OAUTH_CLIENT_SECRET", "secret");
        std::env::set_var("DIRECT_OAUTH_CODE", "4821");
        std::env::set_var("AUCTIONEER_RULE_PATH", "/etc/auctioneer/rule.json");

        let config = WorkerConfig::from_env();
        assert!(matches!(
            config.token_source().unwrap(),
            TokenSource::AuthorizationCode { ref code, .. } if code == "4821"
        ));
        assert_eq!(config.rule_path, PathBuf::from("/etc/auctioneer/rule.json"));

        std::env::remove_var("DIRECT_OAUTH_CODE");
        assert!(WorkerConfig::from_env().token_source().is_err());

        clear_env();
    }
}
