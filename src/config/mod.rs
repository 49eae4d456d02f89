//! Runtime configuration.
//!
//! Defaults are overridden by `ASL_*` environment variables, which are in turn
//! overridden by command-line flags.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::protocol::{DEFAULT_HOST, DEFAULT_PORT};

/// Where screenshots land unless told otherwise.
pub const DEFAULT_SCREENSHOT_DIR: &str = "/sdcard/screens";

/// How the assembler treats bit depths other than 16 and 32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepthPolicy {
    /// Unknown depths are read with the 32-bit layout. Permissive, and
    /// surprising when the daemon reports something like 24.
    #[default]
    Lenient,
    /// Unknown depths are rejected.
    Strict,
}

impl std::str::FromStr for DepthPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown depth policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    pub io_timeout_ms: u64,
    pub screenshot_dir: PathBuf,
    pub depth_policy: DepthPolicy,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout_ms: 1000,
            probe_timeout_ms: 10,
            io_timeout_ms: 5000,
            screenshot_dir: PathBuf::from(DEFAULT_SCREENSHOT_DIR),
            depth_policy: DepthPolicy::Lenient,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Defaults overlaid with `ASL_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_env_map(&std::env::vars().collect())
    }

    /// Same as [`Config::from_env`] but reads from the given map.
    pub fn from_env_map(env: &HashMap<String, String>) -> Self {
        let mut config = Self::default();

        if let Some(host) = env.get("ASL_HOST") {
            config.host = host.clone();
        }
        if let Some(port) = parse_var(env, "ASL_PORT") {
            config.port = port;
        }
        if let Some(ms) = parse_var(env, "ASL_CONNECT_TIMEOUT_MS") {
            config.connect_timeout_ms = ms;
        }
        if let Some(ms) = parse_var(env, "ASL_PROBE_TIMEOUT_MS") {
            config.probe_timeout_ms = ms;
        }
        if let Some(ms) = parse_var(env, "ASL_IO_TIMEOUT_MS") {
            config.io_timeout_ms = ms;
        }
        if let Some(dir) = env.get("ASL_SCREENSHOT_DIR") {
            config.screenshot_dir = expand_path(dir);
        }
        if let Some(policy) = parse_var(env, "ASL_DEPTH_POLICY") {
            config.depth_policy = policy;
        }
        if let Some(level) = env.get("ASL_LOG_LEVEL") {
            config.log_level = level.clone();
        }

        config
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

fn parse_var<T: std::str::FromStr>(env: &HashMap<String, String>, key: &str) -> Option<T> {
    let raw = env.get(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = key, value = %raw, "Ignoring unparsable environment variable");
            None
        }
    }
}

/// Expand a leading `~/` against `$HOME`.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut buf = PathBuf::from(home);
            buf.push(stripped);
            return buf;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.addr(), "127.0.0.1:42380");
        assert_eq!(config.connect_timeout(), Duration::from_secs(1));
        assert_eq!(config.probe_timeout(), Duration::from_millis(10));
        assert_eq!(config.screenshot_dir, PathBuf::from("/sdcard/screens"));
        assert_eq!(config.depth_policy, DepthPolicy::Lenient);
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_env_map(&env(&[
            ("ASL_PORT", "5555"),
            ("ASL_SCREENSHOT_DIR", "/tmp/shots"),
            ("ASL_DEPTH_POLICY", "STRICT"),
            ("ASL_PROBE_TIMEOUT_MS", "25"),
        ]));
        assert_eq!(config.port, 5555);
        assert_eq!(config.screenshot_dir, PathBuf::from("/tmp/shots"));
        assert_eq!(config.depth_policy, DepthPolicy::Strict);
        assert_eq!(config.probe_timeout_ms, 25);
    }

    #[test]
    fn test_bad_env_values_ignored() {
        let config = Config::from_env_map(&env(&[
            ("ASL_PORT", "not-a-port"),
            ("ASL_DEPTH_POLICY", "sloppy"),
        ]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.depth_policy, DepthPolicy::Lenient);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["depth_policy"], "lenient");
        assert_eq!(json["port"], 42380);
    }
}
