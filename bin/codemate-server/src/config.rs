//! Server configuration, loaded from environment variables at startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use codemate_core::model::{HubSource, ModelConfig};
use codemate_core::orchestrator::TurnOptions;
use thiserror::Error;

pub const DEV_JWT_SECRET: &str = "codemate-dev-secret-change-me";

#[derive(Debug, Error)]
#[error("invalid value {value:?} for {key}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Per-minute request budgets per route group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub chat: u32,
    pub history: u32,
    pub save: u32,
    pub suggest: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            chat: 30,
            history: 10,
            save: 20,
            suggest: 10,
        }
    }
}

/// Runtime configuration for codemate-server.
///
/// Every field has a default so the server starts without any environment
/// variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `0.0.0.0:8000`; `PORT` overrides the port).
    pub bind_address: SocketAddr,

    /// sqlx SQLite URL (default: `sqlite://codemate.db`).
    pub database_url: String,

    pub model: ModelConfig,
    pub hub: HubSource,
    /// Fetch missing model artifacts from the hub before loading.
    pub model_download: bool,
    pub turn: TurnOptions,

    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub bcrypt_cost: u32,

    /// Comma-separated allowed origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Mounts `/auth/*` and honours bearer tokens.
    pub enable_auth: bool,
    /// Rejects unauthenticated calls to the user routes.
    pub require_auth: bool,
    pub enable_rate_limit: bool,
    pub rate_limits: RateLimits,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,
    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,
    /// Daily-rolling log file written in addition to stdout.
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8000)),
            database_url: "sqlite://codemate.db".into(),
            model: ModelConfig::default(),
            hub: HubSource::default(),
            model_download: false,
            turn: TurnOptions::default(),
            jwt_secret: DEV_JWT_SECRET.into(),
            token_ttl: Duration::from_secs(30 * 60),
            bcrypt_cost: 12,
            cors_allowed_origins: None,
            enable_auth: true,
            require_auth: false,
            enable_rate_limit: true,
            rate_limits: RateLimits::default(),
            log_level: "info".into(),
            log_json: false,
            log_file: None,
        }
    }
}

impl Config {
    /// Build [`Config`] from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build [`Config`] from an arbitrary key lookup, falling back to defaults
    /// for absent keys. Present but unparsable values are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);
        let mut cfg = Config::default();

        if let Some(bind) = env.parse::<SocketAddr>("CODEMATE_BIND")? {
            cfg.bind_address = bind;
        }
        if let Some(port) = env.parse::<u16>("PORT")? {
            cfg.bind_address.set_port(port);
        }
        if let Some(url) = env.string("CODEMATE_DATABASE_URL") {
            cfg.database_url = url;
        }

        if let Some(path) = env.string("CODEMATE_MODEL_PATH") {
            cfg.model.model_path = PathBuf::from(path);
        }
        cfg.model.tokenizer_path = match env.string("CODEMATE_TOKENIZER_PATH") {
            Some(path) => PathBuf::from(path),
            None => cfg
                .model
                .model_path
                .parent()
                .map(|dir| dir.join("tokenizer.json"))
                .unwrap_or_else(|| PathBuf::from("tokenizer.json")),
        };
        if let Some(repo) = env.string("CODEMATE_MODEL_REPO") {
            cfg.hub.model_repo = repo;
        }
        if let Some(file) = env.string("CODEMATE_MODEL_FILE") {
            cfg.hub.model_file = file;
        }
        if let Some(repo) = env.string("CODEMATE_TOKENIZER_REPO") {
            cfg.hub.tokenizer_repo = repo;
        }
        if let Some(download) = env.flag("CODEMATE_MODEL_DOWNLOAD")? {
            cfg.model_download = download;
        }
        if let Some(top_p) = env.parse::<f64>("CODEMATE_TOP_P")? {
            cfg.model.top_p = top_p;
        }
        if let Some(secs) = env.parse::<u64>("CODEMATE_GENERATION_TIMEOUT_SECS")? {
            cfg.model.timeout = Duration::from_secs(secs);
        }

        if let Some(max_tokens) = env.parse::<usize>("CODEMATE_MAX_TOKENS")? {
            cfg.turn.max_tokens = max_tokens;
        }
        if let Some(temperature) = env.parse::<f64>("CODEMATE_TEMPERATURE")? {
            cfg.turn.temperature = temperature;
        }
        if let Some(turns) = env.parse::<usize>("CODEMATE_HISTORY_TURNS")? {
            cfg.turn.history_turns = turns;
        }

        if let Some(secret) = env.string("CODEMATE_JWT_SECRET") {
            cfg.jwt_secret = secret;
        }
        if let Some(minutes) = env.parse::<u64>("CODEMATE_TOKEN_TTL_MINUTES")? {
            cfg.token_ttl = Duration::from_secs(minutes * 60);
        }
        if let Some(cost) = env.parse::<u32>("CODEMATE_BCRYPT_COST")? {
            if !(4..=31).contains(&cost) {
                return Err(ConfigError {
                    key: "CODEMATE_BCRYPT_COST",
                    value: cost.to_string(),
                    reason: "must be between 4 and 31".into(),
                });
            }
            cfg.bcrypt_cost = cost;
        }
        cfg.cors_allowed_origins = env.string("CODEMATE_CORS_ORIGINS");

        if let Some(enabled) = env.flag("CODEMATE_ENABLE_AUTH")? {
            cfg.enable_auth = enabled;
        }
        if let Some(required) = env.flag("CODEMATE_REQUIRE_AUTH")? {
            cfg.require_auth = required;
        }
        if let Some(enabled) = env.flag("CODEMATE_ENABLE_RATE_LIMIT")? {
            cfg.enable_rate_limit = enabled;
        }
        if let Some(limit) = env.parse::<u32>("CODEMATE_RATE_CHAT")? {
            cfg.rate_limits.chat = limit;
        }
        if let Some(limit) = env.parse::<u32>("CODEMATE_RATE_HISTORY")? {
            cfg.rate_limits.history = limit;
        }
        if let Some(limit) = env.parse::<u32>("CODEMATE_RATE_SAVE")? {
            cfg.rate_limits.save = limit;
        }
        if let Some(limit) = env.parse::<u32>("CODEMATE_RATE_SUGGEST")? {
            cfg.rate_limits.suggest = limit;
        }

        if let Some(level) = env.string("CODEMATE_LOG") {
            cfg.log_level = level;
        }
        if let Some(json) = env.flag("CODEMATE_LOG_JSON")? {
            cfg.log_json = json;
        }
        cfg.log_file = env.string("CODEMATE_LOG_FILE").map(PathBuf::from);

        Ok(cfg)
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

struct Env<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Non-empty, trimmed value of `key`.
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.string(key)
            .map(|value| {
                value.parse().map_err(|e: T::Err| ConfigError {
                    key,
                    reason: e.to_string(),
                    value,
                })
            })
            .transpose()
    }

    fn flag(&self, key: &'static str) -> Result<Option<bool>, ConfigError> {
        self.string(key)
            .map(|value| match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError {
                    key,
                    value,
                    reason: "expected a boolean".into(),
                }),
            })
            .transpose()
    }
}
