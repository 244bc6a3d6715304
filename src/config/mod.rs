//! Process configuration, built once in `main` and passed by reference.
//!
//! Layout:
//! - `resolver.rs`: database connection string resolution
//! - `file.rs`: optional JSON configuration file

pub mod file;
pub mod resolver;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

pub use file::FileConfig;
pub use resolver::{Descriptor, DescriptorSource};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CONFIG_FILE: &str = "config/default.json";
pub const DEFAULT_SESSION_SECRET: &str = "key that will sign cookies";
pub const DEFAULT_LOGLEVEL: &str = "info";
/// Applies to both the TCP connect and server selection. No retry follows.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Read access to environment variables.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;

    /// Value with surrounding whitespace removed; empty counts as unset.
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    /// `APP_ENV`, falling back to `NODE_ENV`.
    pub fn from_env(env: &impl EnvSource) -> Self {
        let flag = env.non_empty("APP_ENV").or_else(|| env.non_empty("NODE_ENV"));
        match flag {
            Some(v) if v.eq_ignore_ascii_case("production") => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub descriptor: Option<Descriptor>,
    pub session_secret: String,
    pub port: u16,
    pub environment: Environment,
    pub connect_timeout: Duration,
}

impl AppConfig {
    /// Load the configuration file named by `CONFIG_FILE` (or the default path)
    /// and combine it with the environment.
    pub fn load(env: &impl EnvSource) -> Self {
        let path = env
            .non_empty("CONFIG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let file = FileConfig::load(&path);
        Self::from_sources(env, &file)
    }

    pub fn from_sources(env: &impl EnvSource, file: &FileConfig) -> Self {
        let environment = Environment::from_env(env);
        let descriptor = resolver::resolve(env, file);

        let session_secret = env
            .non_empty("SESSION_SECRET")
            .or_else(|| file.session_secret())
            .unwrap_or_else(|| {
                if environment.is_production() {
                    warn!("SESSION_SECRET not configured; using the built-in development secret");
                }
                DEFAULT_SESSION_SECRET.to_string()
            });

        let port = match env.non_empty("PORT") {
            Some(raw) => raw.parse::<u16>().unwrap_or_else(|e| {
                warn!(value = %raw, error = %e, "invalid PORT, using default {DEFAULT_PORT}");
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        info!(
            environment = ?environment,
            port,
            descriptor_source = ?descriptor.as_ref().map(Descriptor::source),
            "configuration resolved"
        );

        Self {
            descriptor,
            session_secret,
            port,
            environment,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

/// `RUST_LOG` wins over this in `main`.
pub fn loglevel(env: &impl EnvSource) -> String {
    env.non_empty("LOG_LEVEL")
        .unwrap_or_else(|| DEFAULT_LOGLEVEL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&'static str, &'static str)]) -> HashMap<&'static str, &'static str> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn production_flag_is_case_insensitive_and_falls_back_to_node_env() {
        assert_eq!(
            Environment::from_env(&env(&[("APP_ENV", "Production")])),
            Environment::Production
        );
        assert_eq!(
            Environment::from_env(&env(&[("NODE_ENV", "production")])),
            Environment::Production
        );
        assert_eq!(
            Environment::from_env(&env(&[("APP_ENV", ""), ("NODE_ENV", "production")])),
            Environment::Production
        );
        assert_eq!(
            Environment::from_env(&env(&[("APP_ENV", "staging")])),
            Environment::Development
        );
        assert_eq!(Environment::from_env(&env(&[])), Environment::Development);
    }

    #[test]
    fn invalid_port_falls_back_to_default() {
        let cfg = AppConfig::from_sources(&env(&[("PORT", "eighty")]), &FileConfig::default());
        assert_eq!(cfg.port, DEFAULT_PORT);
        let cfg = AppConfig::from_sources(&env(&[("PORT", " 8080 ")]), &FileConfig::default());
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn session_secret_prefers_env_then_file_then_default() {
        let file = FileConfig {
            session_secret: Some("from-file".into()),
            ..FileConfig::default()
        };
        let cfg = AppConfig::from_sources(&env(&[("SESSION_SECRET", "from-env")]), &file);
        assert_eq!(cfg.session_secret, "from-env");
        let cfg = AppConfig::from_sources(&env(&[("SESSION_SECRET", "  ")]), &file);
        assert_eq!(cfg.session_secret, "from-file");
        let cfg = AppConfig::from_sources(&env(&[]), &FileConfig::default());
        assert_eq!(cfg.session_secret, DEFAULT_SESSION_SECRET);
    }
}
