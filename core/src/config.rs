//! Configuration
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults
//! 2. `annex.toml` in the working directory, or the file named by
//!    `.config_path(..)` / `ANNEX_CONFIG_PATH`
//! 3. `ANNEX_*` environment variables (a `.env` file is loaded first)
//! 4. Values set on the builder

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};


/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "ANNEX_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File extension of extension files, without the dot
    pub extension_suffix: String,
    /// Directory under `<class name>/` holding extension files
    pub extensions_dir: String,
    /// Base directory for classes with no known defining file
    pub root_dir: Option<PathBuf>,
    /// Nested frames allowed before `SystemStackError` is raised
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extension_suffix: "ext".to_string(),
            extensions_dir: "extensions".to_string(),
            root_dir: None,
            max_call_depth: 64,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load from the default sources
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Config = toml::from_str(source).context("Failed to parse annex config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.extension_suffix.is_empty(), "extension_suffix must not be empty");
        ensure!(
            !self.extension_suffix.contains(['.', '/', '\\']),
            "extension_suffix must be a bare extension like \"ext\", got {:?}",
            self.extension_suffix
        );
        ensure!(!self.extensions_dir.is_empty(), "extensions_dir must not be empty");
        ensure!(self.max_call_depth > 0, "max_call_depth must be at least 1");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    extension_suffix: Option<String>,
    extensions_dir: Option<String>,
    root_dir: Option<PathBuf>,
    max_call_depth: Option<usize>,
}

impl ConfigBuilder {
    /// Explicit config file; it must exist
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn extension_suffix(mut self, suffix: Option<String>) -> Self {
        self.extension_suffix = suffix;
        self
    }

    pub fn extensions_dir(mut self, dir: Option<String>) -> Self {
        self.extensions_dir = dir;
        self
    }

    pub fn root_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.root_dir = dir;
        self
    }

    pub fn max_call_depth(mut self, depth: Option<usize>) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn build(self) -> Result<Config> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();
        let mut builder = config::Config::builder()
            .set_default("extension_suffix", defaults.extension_suffix)?
            .set_default("extensions_dir", defaults.extensions_dir)?
            .set_default("max_call_depth", defaults.max_call_depth as i64)?;

        let config_path = self
            .config_path
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));
        builder = match config_path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name("annex").required(false)),
        };

        builder = builder.add_source(config::Environment::with_prefix("ANNEX").try_parsing(true));

        if let Some(suffix) = self.extension_suffix {
            builder = builder.set_override("extension_suffix", suffix)?;
        }
        if let Some(dir) = self.extensions_dir {
            builder = builder.set_override("extensions_dir", dir)?;
        }
        if let Some(dir) = self.root_dir {
            builder = builder.set_override("root_dir", dir.to_string_lossy().to_string())?;
        }
        if let Some(depth) = self.max_call_depth {
            builder = builder.set_override("max_call_depth", depth as i64)?;
        }

        let config: Config = builder
            .build()
            .context("Failed to load annex configuration")?
            .try_deserialize()
            .context("Invalid annex configuration")?;
        config.validate()?;
        Ok(config)
    }
}
