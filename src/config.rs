//! Application configuration.
//!
//! Passed to [`App::new`](crate::App::new) once at startup; nothing in ply
//! reads the process environment while serving.

use serde::Deserialize;

/// Runtime mode. Decides how much of a failure the client gets to see.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Env {
    /// Error responses carry the full diagnostic text.
    #[serde(alias = "dev")]
    Development,
    /// Error responses carry only the status reason phrase.
    #[default]
    #[serde(other)]
    Production,
}

impl Env {
    /// `development` / `dev` (any case) select development mode; anything
    /// else is production.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Self::Development,
            _ => Self::Production,
        }
    }

    pub fn is_development(self) -> bool {
        self == Self::Development
    }
}

/// Application configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Runtime mode, default production.
    #[serde(default)]
    pub env: Env,
    /// Address used by [`App::listen`](crate::App::listen) callers that have
    /// no address of their own, default `127.0.0.1:8080`.
    #[serde(default = "default_addr")]
    pub addr: String,
}

fn default_addr() -> String {
    "127.0.0.1:8080".to_owned()
}

impl Default for Config {
    fn default() -> Self {
        Self { env: Env::default(), addr: default_addr() }
    }
}

impl Config {
    /// Variable selecting the runtime mode.
    pub const ENV_VAR: &'static str = "PLY_ENV";
    /// Variable overriding the listen address.
    pub const ADDR_VAR: &'static str = "PLY_ADDR";

    /// Reads `PLY_ENV` and `PLY_ADDR`, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(env) = lookup(Self::ENV_VAR) {
            config.env = Env::parse(&env);
        }
        if let Some(addr) = lookup(Self::ADDR_VAR).filter(|a| !a.trim().is_empty()) {
            config.addr = addr;
        }
        config
    }

    /// Shorthand for a development-mode configuration.
    pub fn development() -> Self {
        Self { env: Env::Development, ..Self::default() }
    }
}
