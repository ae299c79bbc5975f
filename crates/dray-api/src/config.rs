//! Server configuration.
//!
//! Environment variables are the canonical runtime configuration path;
//! empty or whitespace-only values are treated as unset.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use dray_core::{Error, Result};
use dray_store::IsolationMode;

/// JWT configuration for production authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HS256 secret used to verify bearer tokens.
    ///
    /// In production this should be delivered via secret manager / env var,
    /// not checked into config files.
    #[serde(default)]
    pub hs256_secret: Option<String>,

    /// RS256 public key in PEM format for verifying bearer tokens.
    ///
    /// Prefer `DRAY_JWT_PUBLIC_KEY_PATH` to avoid multiline env vars.
    #[serde(default)]
    pub rs256_public_key_pem: Option<String>,

    /// Optional issuer (`iss`) to enforce.
    #[serde(default)]
    pub issuer: Option<String>,

    /// Optional audience (`aud`) to enforce.
    #[serde(default)]
    pub audience: Option<String>,

    /// Claim name that contains the user identifier.
    #[serde(default = "default_user_claim")]
    pub user_claim: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            hs256_secret: None,
            rs256_public_key_pem: None,
            issuer: None,
            audience: None,
            user_claim: default_user_claim(),
        }
    }
}

fn default_user_claim() -> String {
    "sub".to_string()
}

/// Configuration for the Dray API server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server port.
    pub http_port: u16,

    /// Prometheus exporter port.
    pub metrics_port: u16,

    /// SQLite database path. When unset in debug mode, an in-memory
    /// database is used.
    #[serde(default)]
    pub db_path: Option<String>,

    /// Enable debug mode.
    ///
    /// When enabled:
    /// - the user principal is extracted from the `X-User-Id` header
    /// - logs are pretty-printed instead of JSON
    ///
    /// When disabled, a verified JWT bearer token is required.
    pub debug: bool,

    /// Plan cache TTL in milliseconds.
    #[serde(default = "default_plan_cache_ttl_ms")]
    pub plan_cache_ttl_ms: u64,

    /// Plan cache size cap.
    #[serde(default = "default_plan_cache_max_entries")]
    pub plan_cache_max_entries: usize,

    /// Default per-request planning deadline in milliseconds.
    #[serde(default = "default_request_deadline_ms")]
    pub request_deadline_ms: u64,

    /// Order-history cache TTL in milliseconds.
    #[serde(default = "default_history_cache_ttl_ms")]
    pub history_cache_ttl_ms: u64,

    /// Isolation strategy for planning transactions.
    #[serde(default)]
    pub db_isolation: IsolationMode,

    /// JWT authentication configuration (used when `debug` is false).
    #[serde(default)]
    pub jwt: JwtConfig,
}

const fn default_plan_cache_ttl_ms() -> u64 {
    500
}

const fn default_plan_cache_max_entries() -> usize {
    10_000
}

const fn default_request_deadline_ms() -> u64 {
    5_000
}

const fn default_history_cache_ttl_ms() -> u64 {
    1_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            metrics_port: 9090,
            db_path: None,
            debug: false,
            plan_cache_ttl_ms: default_plan_cache_ttl_ms(),
            plan_cache_max_entries: default_plan_cache_max_entries(),
            request_deadline_ms: default_request_deadline_ms(),
            history_cache_ttl_ms: default_history_cache_ttl_ms(),
            db_isolation: IsolationMode::default(),
            jwt: JwtConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Supported env vars:
    /// - `DRAY_HTTP_PORT`
    /// - `DRAY_METRICS_PORT`
    /// - `DRAY_DB_PATH`
    /// - `DRAY_DEBUG`
    /// - `DRAY_PLAN_CACHE_TTL_MS`
    /// - `DRAY_PLAN_CACHE_MAX_ENTRIES`
    /// - `DRAY_REQUEST_DEADLINE_MS`
    /// - `DRAY_HISTORY_CACHE_TTL_MS`
    /// - `DRAY_DB_ISOLATION` (`serializable` | `conditional_update`)
    /// - `DRAY_JWT_SECRET`
    /// - `DRAY_JWT_PUBLIC_KEY_PEM`
    /// - `DRAY_JWT_PUBLIC_KEY_PATH`
    /// - `DRAY_JWT_ISSUER`
    /// - `DRAY_JWT_AUDIENCE`
    /// - `DRAY_JWT_USER_CLAIM`
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is present but cannot be parsed, or
    /// if no JWT verification key is configured outside debug mode.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(port) = env_u16("DRAY_HTTP_PORT")? {
            config.http_port = port;
        }
        if let Some(port) = env_u16("DRAY_METRICS_PORT")? {
            config.metrics_port = port;
        }
        config.db_path = env_string("DRAY_DB_PATH");
        if let Some(debug) = env_bool("DRAY_DEBUG")? {
            config.debug = debug;
        }
        if let Some(ttl) = env_u64("DRAY_PLAN_CACHE_TTL_MS")? {
            config.plan_cache_ttl_ms = ttl;
        }
        if let Some(max) = env_usize("DRAY_PLAN_CACHE_MAX_ENTRIES")? {
            if max == 0 {
                return Err(Error::invalid_argument(
                    "DRAY_PLAN_CACHE_MAX_ENTRIES must be greater than 0",
                ));
            }
            config.plan_cache_max_entries = max;
        }
        if let Some(deadline) = env_u64("DRAY_REQUEST_DEADLINE_MS")? {
            if deadline == 0 {
                return Err(Error::invalid_argument(
                    "DRAY_REQUEST_DEADLINE_MS must be greater than 0",
                ));
            }
            config.request_deadline_ms = deadline;
        }
        if let Some(ttl) = env_u64("DRAY_HISTORY_CACHE_TTL_MS")? {
            config.history_cache_ttl_ms = ttl;
        }
        if let Some(isolation) = env_string("DRAY_DB_ISOLATION") {
            config.db_isolation = isolation.parse()?;
        }

        if let Some(secret) = env_string("DRAY_JWT_SECRET") {
            config.jwt.hs256_secret = Some(secret);
        }
        if let Some(pem) = env_string("DRAY_JWT_PUBLIC_KEY_PEM") {
            config.jwt.rs256_public_key_pem = Some(normalize_pem(&pem));
        }
        if let Some(path) = env_string("DRAY_JWT_PUBLIC_KEY_PATH") {
            if config.jwt.rs256_public_key_pem.is_some() {
                return Err(Error::invalid_argument(
                    "DRAY_JWT_PUBLIC_KEY_PATH cannot be set with DRAY_JWT_PUBLIC_KEY_PEM",
                ));
            }
            let pem = std::fs::read_to_string(&path).map_err(|e| {
                Error::invalid_argument(format!(
                    "DRAY_JWT_PUBLIC_KEY_PATH failed to read {path}: {e}"
                ))
            })?;
            config.jwt.rs256_public_key_pem = Some(normalize_pem(&pem));
        }
        if let Some(issuer) = env_string("DRAY_JWT_ISSUER") {
            config.jwt.issuer = Some(issuer);
        }
        if let Some(audience) = env_string("DRAY_JWT_AUDIENCE") {
            config.jwt.audience = Some(audience);
        }
        if let Some(claim) = env_string("DRAY_JWT_USER_CLAIM") {
            config.jwt.user_claim = claim;
        }

        if !config.debug
            && config.jwt.hs256_secret.is_none()
            && config.jwt.rs256_public_key_pem.is_none()
        {
            return Err(Error::invalid_argument(
                "DRAY_JWT_SECRET or DRAY_JWT_PUBLIC_KEY_PEM is required when DRAY_DEBUG=false",
            ));
        }

        Ok(config)
    }

    /// Returns the plan cache TTL.
    #[must_use]
    pub const fn plan_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.plan_cache_ttl_ms)
    }

    /// Returns the default planning deadline.
    #[must_use]
    pub const fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }

    /// Returns the order-history cache TTL.
    #[must_use]
    pub const fn history_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.history_cache_ttl_ms)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_u16(name: &str) -> Result<Option<u16>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u16>()
        .map(Some)
        .map_err(|e| Error::invalid_argument(format!("{name} must be a u16: {e}")))
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u64>()
        .map(Some)
        .map_err(|e| Error::invalid_argument(format!("{name} must be a u64: {e}")))
}

fn env_usize(name: &str) -> Result<Option<usize>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<usize>()
        .map(Some)
        .map_err(|e| Error::invalid_argument(format!("{name} must be a usize: {e}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(Error::invalid_argument(format!(
            "{name} must be a boolean (true/false/1/0)"
        ))),
    }
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    parse_bool(name, &v).map(Some)
}

fn normalize_pem(pem: &str) -> String {
    let trimmed = pem.trim();
    if trimmed.contains("\\n") && !trimmed.contains('\n') {
        trimmed.replace("\\n", "\n")
    } else {
        trimmed.to_string()
    }
}
