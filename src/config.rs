use crate::charset::{self, Charset};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Application configuration: named charset presets plus the default choice.
///
/// Loaded from a JSON file when `--config` is given, otherwise built from
/// the built-in presets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub presets: HashMap<String, String>,
    #[serde(default = "default_preset_name")]
    pub default_preset: String,
}

fn default_preset_name() -> String {
    "default".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut presets = HashMap::new();
        presets.insert("default".to_string(), charset::DEFAULT_CHARSET.to_string());
        presets.insert("dense".to_string(), charset::DENSE_CHARSET.to_string());
        presets.insert("simple".to_string(), charset::SIMPLE_CHARSET.to_string());
        presets.insert("reverse".to_string(), charset::REVERSE_CHARSET.to_string());
        Self {
            presets,
            default_preset: default_preset_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&text).context("parsing config json")?;
        if config.presets.is_empty() {
            return Err(anyhow!(
                "Config file {} defines no charset presets",
                path.display()
            ));
        }
        Ok(config)
    }

    /// Charset for a named preset.
    pub fn preset(&self, name: &str) -> Result<Charset> {
        let glyphs = self
            .presets
            .get(name)
            .ok_or_else(|| anyhow!("Preset '{}' not found", name))?;
        Charset::new(glyphs).with_context(|| format!("preset '{}'", name))
    }

    /// Charset for the configured default preset.
    pub fn default_charset(&self) -> Result<Charset> {
        self.preset(&self.default_preset)
    }
}
