use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::paths;
use crate::planner::DEFAULT_MIN_PROMPT_LENGTH;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    pub path: Option<String>,
    pub lock: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannerConfig {
    pub min_prompt_length: Option<usize>,
    pub preserve_existing: Option<bool>,
}

impl Config {
    /// Load config from `TASKTRAIL_CONFIG` or `./tasktrail.toml`.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(&paths::config_path()))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config: Config = match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
        };
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.store.path.as_deref() == Some("") {
            bail!("failed to parse {}: store.path must not be empty", path.display());
        }
        if self.planner.min_prompt_length == Some(0) {
            bail!(
                "failed to parse {}: planner.min_prompt_length must be at least 1",
                path.display()
            );
        }
        Ok(())
    }

    /// Progress file path: an explicit path (flag or env var) wins over the
    /// config file, which wins over the built-in default.
    pub fn progress_path(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_string)
            .or_else(|| self.store.path.clone())
            .unwrap_or_else(paths::progress_path)
    }

    pub fn lock_enabled(&self) -> bool {
        self.store.lock.unwrap_or(true)
    }

    pub fn min_prompt_length(&self) -> usize {
        self.planner
            .min_prompt_length
            .unwrap_or(DEFAULT_MIN_PROMPT_LENGTH)
    }

    pub fn preserve_existing(&self) -> bool {
        self.planner.preserve_existing.unwrap_or(true)
    }
}
