use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::convert::ConvertOptions;
use crate::history;
use crate::models::Lang;

pub const DEFAULT_CONFIG_FILE: &str = ".bac-results.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub convert: ConvertConfig,
}

/// Locations of the published artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Results file path or http(s) URL.
    #[serde(default = "default_results")]
    pub results: String,

    /// Statistics file path or http(s) URL.
    #[serde(default = "default_stats")]
    pub stats: String,

    #[serde(default = "history::default_history_path")]
    pub history: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            results: default_results(),
            stats: default_stats(),
            history: history::default_history_path(),
        }
    }
}

fn default_results() -> String {
    "public/results.json".to_string()
}

fn default_stats() -> String {
    "public/stats.json".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub lang: Lang,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Single-byte field separator for delimited input.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Source column name to published key.
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            rename: BTreeMap::new(),
        }
    }
}

fn default_delimiter() -> String {
    ",".to_string()
}

impl ConvertConfig {
    pub fn options(&self) -> Result<ConvertOptions> {
        let delimiter = match self.delimiter.as_bytes() {
            [byte] => *byte,
            _ => bail!(
                "convert.delimiter must be a single ASCII character, got {:?}",
                self.delimiter
            ),
        };

        Ok(ConvertOptions {
            delimiter,
            rename: self.rename.clone(),
        })
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// `Ok(None)` when the default file does not exist.
    pub fn load_default() -> Result<Option<Self>> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Ok(Some(Self::load(path)?))
        } else {
            Ok(None)
        }
    }

    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}
