// harvest-core/src/domain/project/configuration.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::governance::configuration::SafetySettings;

/// `harvest.yaml`: where a project keeps its rules, documents and store.
#[derive(Debug, Deserialize, Serialize, Validate, Clone, PartialEq)]
pub struct ProjectConfig {
    #[validate(length(min = 1))]
    #[serde(default = "default_name")]
    pub name: String,

    /// Rule document, relative to the project directory.
    #[validate(length(min = 1))]
    #[serde(default = "default_rules")]
    pub rules: String,

    /// Directory scanned for HTML documents.
    #[validate(length(min = 1))]
    #[serde(default = "default_documents")]
    pub documents: String,

    /// DuckDB file, or `:memory:`.
    #[validate(length(min = 1))]
    #[serde(default = "default_database")]
    pub database: String,

    #[validate(length(min = 1))]
    #[serde(default = "default_drafts")]
    pub drafts: String,

    #[validate(nested)]
    #[serde(default)]
    pub safety: SafetySettings,

    #[validate(nested)]
    #[serde(default)]
    pub preview: PreviewConfig,
}

#[derive(Debug, Deserialize, Serialize, Validate, Clone, PartialEq)]
pub struct PreviewConfig {
    /// Rows per resource fed to the coercion and constraint previews.
    #[validate(range(min = 1, max = 10000))]
    #[serde(default = "default_sample_limit")]
    pub sample_limit: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            sample_limit: default_sample_limit(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            rules: default_rules(),
            documents: default_documents(),
            database: default_database(),
            drafts: default_drafts(),
            safety: SafetySettings::default(),
            preview: PreviewConfig::default(),
        }
    }
}

fn default_name() -> String {
    "harvest".to_string()
}
fn default_rules() -> String {
    "rules.json".to_string()
}
fn default_documents() -> String {
    "documents".to_string()
}
fn default_database() -> String {
    "harvest.duckdb".to_string()
}
fn default_drafts() -> String {
    ".harvest/drafts".to_string()
}
fn default_sample_limit() -> usize {
    200
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_partial_yaml_falls_back_to_defaults() -> Result<()> {
        let config: ProjectConfig = serde_yaml::from_str("name: league\npreview:\n  sample_limit: 50\n")?;
        assert_eq!(config.name, "league");
        assert_eq!(config.rules, "rules.json");
        assert_eq!(config.preview.sample_limit, 50);
        assert!(config.safety.reject_dynamic_code);
        assert!(config.validate().is_ok());
        Ok(())
    }

    #[test]
    fn test_sample_limit_is_bounded() -> Result<()> {
        let config: ProjectConfig = serde_yaml::from_str("preview:\n  sample_limit: 0\n")?;
        assert!(config.validate().is_err());

        let config: ProjectConfig =
            serde_yaml::from_str("safety:\n  forbidden_patterns: ['eval(', '']\n")?;
        assert!(config.validate().is_err());
        Ok(())
    }
}
