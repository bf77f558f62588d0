//! 🔧 App Configuration: the sacred env-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." (every developer at 3am) 🦆
//!
//! 🏗️ Powered by Figment. Layers, lowest priority first:
//! 1. The plain env vars a Lambda-style deployment already sets: `LOG_GROUP_NAME`,
//!    `LOG_STREAM_NAME`, `FIELDS`, `REGION`.
//! 2. `LOGSHIP_*` env vars, nested keys split on `__` (`LOGSHIP_RUNTIME__CONCURRENCY=4`).
//! 3. An optional TOML file. TOML wins on conflicts.

use std::path::Path;

use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::common::LogDestination;

/// 🧵 Default number of objects in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 10;

const RAW_ENV_KEYS: [&str; 4] = ["LOG_GROUP_NAME", "LOG_STREAM_NAME", "FIELDS", "REGION"];

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// 📡 Destination log group. Required, and blank counts as missing.
    #[serde(default)]
    pub log_group_name: String,
    /// 📡 Destination log stream inside the group. Same rules.
    #[serde(default)]
    pub log_stream_name: String,
    /// 🎯 Comma-separated column names to keep. Empty keeps all 30.
    #[serde(default)]
    pub fields: String,
    /// 🌍 AWS region override. Otherwise the usual AWS config chain decides.
    #[serde(default)]
    pub region: Option<String>,
    /// 🧪 Count instead of ship. No log group gets created, nothing gets sent.
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// 🏃 Knobs for how hard we push.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// 🧵 Max objects processed concurrently. At least 1.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl AppConfig {
    pub fn destination(&self) -> LogDestination {
        LogDestination {
            log_group_name: self.log_group_name.clone(),
            log_stream_name: self.log_stream_name.clone(),
        }
    }

    /// ✅ The checks serde can't do for us.
    pub fn validate(&self) -> Result<()> {
        if self.log_group_name.trim().is_empty() {
            bail!("LOG_GROUP_NAME is required: set it in the environment or as log_group_name in the config file");
        }
        if self.log_stream_name.trim().is_empty() {
            bail!("LOG_STREAM_NAME is required: set it in the environment or as log_stream_name in the config file");
        }
        if self.runtime.concurrency == 0 {
            bail!("runtime.concurrency must be at least 1, got 0");
        }
        Ok(())
    }
}

/// 🚀 Load the config from the environment, plus a TOML file if one was named.
///
/// 📐 DESIGN NOTE (no cap, this is tribal knowledge):
///   - `config_file_name` None → env vars only. No file. No assumptions.
///   - `config_file_name` Some → env vars + TOML file, merged. TOML wins on conflicts.
///     A named file that doesn't exist is an error; figment alone would shrug and skip it.
pub fn load_config(config_file_name: Option<&Path>) -> Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new()
        .merge(Env::raw().only(&RAW_ENV_KEYS))
        .merge(Env::prefixed("LOGSHIP_").split("__"));

    let config = match config_file_name {
        Some(file_name) => {
            if !file_name.is_file() {
                bail!(
                    "💀 config file '{}' does not exist. It exists in our hearts, but not on disk.",
                    file_name.display()
                );
            }
            config.merge(Toml::file(file_name))
        }
        None => config,
    };

    // 💬 a context message that actually TELLS you where we looked
    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables \
             (LOG_GROUP_NAME, LOG_STREAM_NAME, FIELDS, REGION, LOGSHIP_*).",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables \
                 (LOG_GROUP_NAME, LOG_STREAM_NAME, FIELDS, REGION, LOGSHIP_*). \
                 No file was provided, this one's all on the environment."
            .to_string(),
    };

    let app_config: AppConfig = config.extract().context(context_msg)?;
    app_config.validate().context("💀 configuration is invalid")?;
    Ok(app_config)
}
