use anyhow::{Context, Result};
use fer_model::EmotionTable;
use log::debug;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| {
    if let Some(p) = option_env!("FER_CONFIG_PATH") {
        return PathBuf::from(p);
    }
    directories::ProjectDirs::from("", "", "fer")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("fer.toml"))
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Checkpoint used when a command is given none.
    pub checkpoint: PathBuf,
    /// Class labels in classifier output order.
    pub emotions: EmotionTable,
}

impl Config {
    pub fn num_classes(&self) -> usize {
        self.emotions.len()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            checkpoint: PathBuf::from("checkpoints/best_model.fckpt"),
            emotions: EmotionTable::fer2013(),
        }
    }
}

/// Read the config at `path` (or [`CONFIG_PATH`]). A missing file means defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("reading config at {}", path.display()));
        }
    };
    let cfg: Config =
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    debug!(
        "config {}: checkpoint {}, {} classes",
        path.display(),
        cfg.checkpoint.display(),
        cfg.num_classes()
    );
    Ok(cfg)
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg).context("serializing config")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }
    std::fs::write(path, data).with_context(|| format!("writing config {}", path.display()))?;
    debug!("saved config to {}", path.display());
    Ok(())
}

/// Write the default config to `path` unless a file is already there.
///
/// Returns whether a file was written.
pub fn ensure_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    save_config(&Config::default(), Some(path))?;
    Ok(true)
}
