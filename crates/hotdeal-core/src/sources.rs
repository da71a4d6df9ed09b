use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One RSS source the collector reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Stable identifier, used as the deal id prefix (`ppomppu`).
    pub name: String,
    /// Human-readable mall name shown on deals (`뽐뿌`).
    pub display_name: String,
    pub url: String,
    /// Glyph shown next to the mall name.
    #[serde(default)]
    pub logo: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl SourceConfig {
    /// The `source` field stamped on every deal from this feed.
    #[must_use]
    pub fn source_label(&self) -> String {
        format!("RSS-{}", self.display_name)
    }
}

#[derive(Debug, Deserialize)]
pub struct SourcesFile {
    pub sources: Vec<SourceConfig>,
}

impl SourcesFile {
    /// Enabled sources, optionally narrowed to a single name.
    #[must_use]
    pub fn enabled(&self, only: Option<&str>) -> Vec<SourceConfig> {
        self.sources
            .iter()
            .filter(|s| s.enabled)
            .filter(|s| only.is_none_or(|name| s.name == name))
            .cloned()
            .collect()
    }
}

/// Load and validate the sources configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_sources(path: &Path) -> Result<SourcesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SourcesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let sources_file: SourcesFile = serde_yaml::from_str(&content)?;
    validate_sources(&sources_file)?;

    Ok(sources_file)
}

fn validate_sources(sources_file: &SourcesFile) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for source in &sources_file.sources {
        let name = source.name.trim();
        if name.is_empty() {
            return Err(ConfigError::Validation(
                "source name must be non-empty".to_string(),
            ));
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::Validation(format!(
                "source name '{name}' must be ascii alphanumeric, '-' or '_'"
            )));
        }

        if source.display_name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{name}' has an empty display_name"
            )));
        }

        if !(source.url.starts_with("http://") || source.url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "source '{name}' has a non-http url: {}",
                source.url
            )));
        }

        if !seen.insert(name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name: '{name}'"
            )));
        }
    }

    Ok(())
}
