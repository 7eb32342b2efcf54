//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." (every developer at 3am) 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.

use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::BulkConfig;
use crate::writer::WriterConfig;

/// 📦 Everything the app needs to know about itself.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 🪣 Batch size and inactivity timeout. Defaults to 1000 records / 1000ms.
    #[serde(default)]
    pub writer: WriterConfig,
    /// 📡 Where the batches go.
    pub bulk_config: BulkConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// 🧵 Knobs for the plumbing around the writer.
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// 📬 Chunks allowed to wait in the channel before the reader has to wait too.
    #[serde(default = "default_queue_capacity", alias = "channel_size")]
    pub queue_capacity: usize,
    /// 📜 NDJSON file to read records from. `None` means stdin.
    #[serde(default)]
    pub input_file: Option<PathBuf>,
}

fn default_queue_capacity() -> usize {
    10
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            input_file: None,
        }
    }
}

/// 🚀 Load the config from env vars (`BULKSTREAM_*`) and an optional TOML file.
///
/// 📐 DESIGN NOTE:
///   - `None` → env vars only.
///   - `Some(path)` → env vars + TOML file, merged. TOML wins on conflicts.
///   - Nested keys in env vars use `__`: `BULKSTREAM_WRITER__BATCH_SIZE=500`.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("BULKSTREAM_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (BULKSTREAM_*). \
             The file exists in our hearts, but apparently not in a shape serde likes.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (BULKSTREAM_*). \
                 No file was provided, this one's all on the environment. Classic."
            .to_string(),
    };

    config.extract().context(context_msg)
}
