use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CapdexConfig {
    pub log: LogConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub images_dir: String,
    pub exports_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
    /// Name of the image input of the ONNX graph.
    pub input_name: String,
    pub dimensions: usize,
    /// Shortest-edge resize before cropping.
    pub resize: u32,
    /// Side of the square center crop fed to the network.
    pub crop: u32,
    pub batch_size: usize,
    pub intra_threads: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub default_top_k: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let dir = default_capdex_dir();
        Self {
            db_path: dir.join("capcollection.db").to_string_lossy().into_owned(),
            images_dir: dir.join("images").to_string_lossy().into_owned(),
            exports_dir: dir.join("exports").to_string_lossy().into_owned(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_capdex_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "mobilenet_v3_small".into(),
            cache_dir,
            input_name: "input".into(),
            dimensions: 576,
            resize: 256,
            crop: 224,
            batch_size: 16,
            intra_threads: 4,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { default_top_k: 8 }
    }
}

/// Returns `~/.capdex/`, falling back to `./.capdex` when no home directory is known.
pub fn default_capdex_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".capdex")
}

/// Returns the default config file path: `~/.capdex/config.toml`
pub fn default_config_path() -> PathBuf {
    default_capdex_dir().join("config.toml")
}

impl CapdexConfig {
    /// Load config from the default TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            CapdexConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (CAPDEX_DB, CAPDEX_IMAGES, CAPDEX_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CAPDEX_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("CAPDEX_IMAGES") {
            self.storage.images_dir = val;
        }
        if let Ok(val) = std::env::var("CAPDEX_LOG_LEVEL") {
            self.log.level = val;
        }
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn resolved_images_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.images_dir)
    }

    pub fn resolved_exports_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.exports_dir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CapdexConfig::default();
        assert_eq!(config.log.level, "info");
        assert_eq!(config.embedding.dimensions, 576);
        assert_eq!(config.embedding.crop, 224);
        assert_eq!(config.embedding.resize, 256);
        assert_eq!(config.search.default_top_k, 8);
        assert!(config.storage.db_path.ends_with("capcollection.db"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[log]
level = "debug"

[storage]
db_path = "/tmp/caps.db"

[embedding]
batch_size = 4
"#;
        let config: CapdexConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/caps.db");
        assert_eq!(config.embedding.batch_size, 4);
        // defaults still apply for unset fields
        assert_eq!(config.embedding.dimensions, 576);
        assert!(config.storage.images_dir.ends_with("images"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = CapdexConfig::default();
        std::env::set_var("CAPDEX_DB", "/tmp/override.db");
        std::env::set_var("CAPDEX_IMAGES", "/tmp/caps");
        std::env::set_var("CAPDEX_LOG_LEVEL", "trace");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.storage.images_dir, "/tmp/caps");
        assert_eq!(config.log.level, "trace");

        std::env::remove_var("CAPDEX_DB");
        std::env::remove_var("CAPDEX_IMAGES");
        std::env::remove_var("CAPDEX_LOG_LEVEL");
    }

    #[test]
    fn expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/var/caps.db"), PathBuf::from("/var/caps.db"));
    }
}
