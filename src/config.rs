//! Task configuration: the mapping supplied by the task-queue framework,
//! plus the declared schema its UI renders.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("task config is missing the required `regex` option")]
    MissingRegex,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid yaml config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid json config: {0}")]
    Json(#[from] serde_json::Error),
}

/// User-supplied configuration for one task invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Regular expression to search for (extended syntax, matched
    /// case-insensitively by the search tool).
    #[serde(default)]
    pub regex: String,
    /// Mount disk-image inputs and search their partition trees instead of
    /// the raw image bytes.
    #[serde(default)]
    pub mount_disk_images: bool,
}

impl TaskConfig {
    pub fn new(regex: impl Into<String>) -> Self {
        Self {
            regex: regex.into(),
            mount_disk_images: false,
        }
    }

    /// Fail fast on configuration errors before any input file is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.regex.trim().is_empty() {
            return Err(ConfigError::MissingRegex);
        }
        Ok(())
    }

    /// Hash of the canonical JSON form, recorded in result metadata so a
    /// result can be tied back to the exact configuration that produced it.
    pub fn config_hash(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }
}

/// Load a task config from a YAML file (CLI mode).
pub fn load_config(path: &Path) -> Result<TaskConfig, ConfigError> {
    let bytes = std::fs::read(path)?;
    Ok(serde_yaml::from_slice(&bytes)?)
}

/// Decode a task config from the framework's JSON mapping.
pub fn config_from_json(value: &serde_json::Value) -> Result<TaskConfig, ConfigError> {
    Ok(serde_json::from_value(value.clone())?)
}

/// One field of the declared task-configuration schema.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigField {
    pub name: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    #[serde(rename = "type")]
    pub field_type: &'static str,
    pub required: bool,
}

/// Task metadata consumed by the framework UI.
#[derive(Debug, Clone, Serialize)]
pub struct TaskMetadata {
    pub display_name: &'static str,
    pub description: &'static str,
    pub task_config: Vec<ConfigField>,
}

pub fn task_metadata() -> TaskMetadata {
    TaskMetadata {
        display_name: "Grep",
        description: "Search for a regular expression in a file (case insensitive).",
        task_config: vec![
            ConfigField {
                name: "regex",
                label: "[a-f][0-9]+",
                description: "Regular expression to grep for",
                field_type: "text",
                required: true,
            },
            ConfigField {
                name: "mount_disk_images",
                label: "Mount disk images",
                description: "Mount disk-image inputs and search the mounted partitions",
                field_type: "checkbox",
                required: false,
            },
        ],
    }
}
