use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::constants::{config as names, groups::DEFAULT_WILDCARD};
use crate::error::{ModelError, ModelResult};

/// Settings for a [`crate::DataModel`]
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// Group-key component that matches any value in wildcard lookups
    #[serde(default = "default_wildcard")]
    pub wildcard: String,
    /// Ask the data source to validate its tables before populating
    #[serde(default)]
    pub check_tables: bool,
    /// Seed for the model's random generator; OS entropy when absent
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { wildcard: default_wildcard(), check_tables: false, rng_seed: None }
    }
}

fn default_wildcard() -> String {
    DEFAULT_WILDCARD.to_string()
}

impl ModelConfig {
    /// Load from the file named by `CELLCOUNT_CONFIG_PATH` (default
    /// `cellcount.toml`). A missing file falls back to defaults.
    pub fn load() -> ModelResult<Self> {
        let config_path = std::env::var(names::CONFIG_PATH_ENV)
            .unwrap_or_else(|_| names::DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(config_path)
    }

    /// Load from a specific file, falling back to defaults when it does not exist
    pub fn load_from(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Configuration file '{}' not found. Using default configuration.",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(err) => Err(ModelError::configuration(
                "path",
                format!("cannot read '{}': {err}", path.display()),
            )),
        }
    }

    pub fn from_toml_str(contents: &str) -> ModelResult<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|err| ModelError::configuration("toml", err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CELLCOUNT_WILDCARD` and `CELLCOUNT_RNG_SEED` overrides
    pub fn apply_env_overrides(mut self) -> ModelResult<Self> {
        if let Ok(wildcard) = std::env::var(names::WILDCARD_ENV) {
            self.wildcard = wildcard;
        }
        if let Ok(seed) = std::env::var(names::RNG_SEED_ENV) {
            let seed = seed.parse::<u64>().map_err(|err| {
                ModelError::configuration("rng_seed", format!("invalid seed '{seed}': {err}"))
            })?;
            self.rng_seed = Some(seed);
        }
        self.validate()?;
        info!(wildcard = %self.wildcard, seeded = self.rng_seed.is_some(), "Applied environment overrides");
        Ok(self)
    }

    fn validate(&self) -> ModelResult<()> {
        if self.wildcard.is_empty() {
            return Err(ModelError::configuration("wildcard", "wildcard sentinel must not be empty"));
        }
        Ok(())
    }
}
