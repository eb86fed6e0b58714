use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::str::FromStr;

use crate::router::RouteGroup;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:8080";
/// Matches the 100 kB default of the usual JSON / urlencoded body parsers.
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 100 * 1024;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_UPSTREAM_RESPONSE_LIMIT_BYTES: usize = 10 * 1024 * 1024;

const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Single origin allowed by the CORS stage.
    pub frontend_url: String,
    /// Raw `NODE_ENV`; `None` when unset.
    pub environment: Option<String>,
    /// Deployment color echoed by `/health` (blue/green rollouts).
    pub color: String,
    pub version: String,
    pub body_limit_bytes: usize,
    pub upstream_timeout_secs: u64,
    /// Largest upstream response body a proxy group will relay.
    pub upstream_response_limit_bytes: usize,
    /// Upstream base URL per route group; groups without an entry stay unmounted.
    pub upstreams: BTreeMap<RouteGroup, String>,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            environment: None,
            color: UNKNOWN.to_string(),
            version: UNKNOWN.to_string(),
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            upstream_timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
            upstream_response_limit_bytes: DEFAULT_UPSTREAM_RESPONSE_LIMIT_BYTES,
            upstreams: BTreeMap::new(),
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let mut upstreams = BTreeMap::new();
        for group in RouteGroup::ALL {
            if let Some(url) = non_empty_var(group.upstream_env_var()) {
                upstreams.insert(group, url.trim_end_matches('/').to_string());
            }
        }

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", DEFAULT_PORT)?,
            frontend_url: non_empty_var("FRONTEND_URL")
                .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string()),
            environment: non_empty_var("NODE_ENV"),
            color: non_empty_var("COLOR").unwrap_or_else(|| UNKNOWN.to_string()),
            version: non_empty_var("VERSION").unwrap_or_else(|| UNKNOWN.to_string()),
            body_limit_bytes: parse_var("BODY_LIMIT_BYTES", DEFAULT_BODY_LIMIT_BYTES)?,
            upstream_timeout_secs: parse_var(
                "UPSTREAM_TIMEOUT_SECS",
                DEFAULT_UPSTREAM_TIMEOUT_SECS,
            )?,
            upstream_response_limit_bytes: parse_var(
                "UPSTREAM_RESPONSE_LIMIT_BYTES",
                DEFAULT_UPSTREAM_RESPONSE_LIMIT_BYTES,
            )?,
            upstreams,
            log_format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
        })
    }

    /// Error responses carry internal detail only in development.
    pub fn is_development(&self) -> bool {
        self.environment.as_deref() == Some("development")
    }

    /// Environment name for startup logging; an unset `NODE_ENV` reads as development here,
    /// even though `is_development` stays false for it.
    pub fn environment_name(&self) -> &str {
        self.environment.as_deref().unwrap_or("development")
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Empty values count as unset, the same as the `VAR || default` idiom.
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Numeric setting from the environment; a malformed value fails startup.
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    parse_setting(name, non_empty_var(name).as_deref(), default)
}

fn parse_setting<T>(name: &str, raw: Option<&str>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has invalid value {:?}: {}", name, raw, e)),
        None => Ok(default),
    }
}
