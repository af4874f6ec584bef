//! Configuration system
//!
//! Hierarchical configuration loading, layered the same way as the original
//! `config.toml` + environment-variable scheme this crate is descended
//! from: a `config.toml` default, overridden by `SPA_`-prefixed environment
//! variables.
//!
//! ```toml
//! # config.toml
//! [tokenizer]
//! allow_leading_zeroes = false
//! consume_whitespace = true
//!
//! [logging]
//! level = "info"
//! ```
//!
//! ```bash
//! SPA_TOKENIZER__ALLOW_LEADING_ZEROES=true
//! ```

use crate::token::TokenizerOptions;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Top-level configuration for the `spa` driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Mirrors [`TokenizerOptions`] directly — the two knobs named in the
/// external tokenizer interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizerConfig {
    #[serde(default)]
    pub allow_leading_zeroes: bool,
    #[serde(default = "default_true")]
    pub consume_whitespace: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        TokenizerConfig {
            allow_leading_zeroes: false,
            consume_whitespace: true,
        }
    }
}

impl From<TokenizerConfig> for TokenizerOptions {
    fn from(cfg: TokenizerConfig) -> Self {
        TokenizerOptions {
            allow_leading_zeroes: cfg.allow_leading_zeroes,
            consume_whitespace: cfg.consume_whitespace,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// A `tracing_subscriber::EnvFilter`-compatible directive, e.g. "info"
    /// or "simple_spa=debug".
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tokenizer: TokenizerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `config.toml` (if present) then apply
    /// `SPA_*` environment overrides, falling back to defaults for any
    /// field neither source sets.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("SPA_").split("__"))
            .join(figment::providers::Serialized::defaults(Config::default()))
            .extract()
    }
}
