use std::path::{Path, PathBuf};
use ::config::{Config, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::types::{Error, Result};
use super::schema::SelfValidating;

/// Default prefix for environment overrides (`PHONEKIT_AUDIO__VOLUME_MAX=50`)
pub const DEFAULT_ENV_PREFIX: &str = "PHONEKIT";

/// Layered configuration loader
///
/// Sources are applied in order: defaults of the target type, TOML files or
/// strings in the order they were added, then environment variables.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    files: Vec<PathBuf>,
    inline: Vec<String>,
    env_prefix: Option<String>,
    required: bool,
}

impl ConfigLoader {
    /// Loader with no sources; `load` yields the type's defaults
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            inline: Vec::new(),
            env_prefix: None,
            required: true,
        }
    }

    /// Add a TOML file
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.files.push(path.as_ref().to_path_buf());
        self
    }

    /// Add an inline TOML document
    pub fn with_toml(mut self, document: impl Into<String>) -> Self {
        self.inline.push(document.into());
        self
    }

    /// Enable environment overrides under `prefix`, nested keys separated by `__`
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Missing files are skipped instead of failing the load
    pub fn optional_files(mut self) -> Self {
        self.required = false;
        self
    }

    /// Build and deserialize the configuration
    pub fn load<T>(&self) -> Result<T>
    where
        T: DeserializeOwned + SelfValidating,
    {
        let mut builder = Config::builder();

        for path in &self.files {
            debug!("Loading configuration file {}", path.display());
            builder = builder.add_source(
                File::from(path.as_path())
                    .format(FileFormat::Toml)
                    .required(self.required),
            );
        }

        for document in &self.inline {
            builder = builder.add_source(File::from_str(document, FileFormat::Toml));
        }

        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let loaded: T = builder.build()?.try_deserialize()?;
        loaded.validate_after_load()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a single TOML document without layering or environment overrides
pub fn from_toml_str<T>(document: &str) -> Result<T>
where
    T: DeserializeOwned + SelfValidating,
{
    let parsed: T = toml::from_str(document)?;
    parsed.validate_after_load()
}

/// Read and parse a TOML file
pub fn from_toml_file<T>(path: impl AsRef<Path>) -> Result<T>
where
    T: DeserializeOwned + SelfValidating,
{
    let contents = std::fs::read_to_string(path.as_ref())?;
    from_toml_str(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(default)]
    struct Sample {
        name: String,
        limit: u32,
    }

    impl Default for Sample {
        fn default() -> Self {
            Self { name: "default".to_string(), limit: 10 }
        }
    }

    impl SelfValidating for Sample {
        fn validate(&self) -> Result<()> {
            if self.limit == 0 {
                return Err(Error::Validation("limit must be positive".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_defaults_when_no_sources() {
        let loaded: Sample = ConfigLoader::new().load().unwrap();
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn test_inline_layers_override_in_order() {
        let loaded: Sample = ConfigLoader::new()
            .with_toml("name = \"first\"\nlimit = 3")
            .with_toml("limit = 5")
            .load()
            .unwrap();
        assert_eq!(loaded.name, "first");
        assert_eq!(loaded.limit, 5);
    }

    #[test]
    fn test_validation_runs_after_load() {
        let result: Result<Sample> = from_toml_str("limit = 0");
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_missing_required_file_fails() {
        let result: Result<Sample> = ConfigLoader::new()
            .with_file("/definitely/not/here.toml")
            .load();
        assert!(matches!(result, Err(Error::Config(_))));

        let optional: Sample = ConfigLoader::new()
            .with_file("/definitely/not/here.toml")
            .optional_files()
            .load()
            .unwrap();
        assert_eq!(optional, Sample::default());
    }
}
