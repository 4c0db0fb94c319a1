// harvest-core/src/infrastructure/config/project.rs

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::project::configuration::ProjectConfig;
use crate::infrastructure::error::InfrastructureError;

pub const CONFIG_FILES: [&str; 2] = ["harvest.yaml", "harvest.yml"];

/// Loads `harvest.yaml` from `project_dir`, applies environment overrides,
/// then validates. A project without a config file runs on defaults.
#[instrument(skip(project_dir))]
pub fn load_project_config(project_dir: &Path) -> Result<ProjectConfig, InfrastructureError> {
    let mut config = match find_main_config(project_dir) {
        Some(path) => {
            info!(path = ?path, "Loading project config");
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                ProjectConfig::default()
            } else {
                serde_yaml::from_str(&content)?
            }
        }
        None => {
            info!(dir = ?project_dir, "No harvest.yaml found, using defaults");
            ProjectConfig::default()
        }
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

fn find_main_config(root: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|name| root.join(name))
        .find(|p| p.exists())
}

fn apply_env_overrides(config: &mut ProjectConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("HARVEST_DATABASE") {
        info!(old = ?config.database, new = ?val, "Overriding database via ENV");
        config.database = val;
    }
    if let Some(val) = lookup("HARVEST_STRICT_SAFETY") {
        match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => config.safety.reject_dynamic_code = true,
            "0" | "false" | "no" | "off" => config.safety.reject_dynamic_code = false,
            other => warn!(value = other, "Ignoring unrecognised HARVEST_STRICT_SAFETY"),
        }
    }
}
