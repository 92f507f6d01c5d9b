use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use serde::Deserialize;

use crate::engine::types::WorkflowExport;

pub const DEFAULT_CONFIG_FILE: &str = "taskflow.yaml";

/// Configuration loaded from `taskflow.yaml`.
/// All fields are optional; missing fields fall back to CLI/env/defaults.
#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct TaskflowConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_body: Option<usize>,
    pub cache_ttl_seconds: Option<u64>,
    /// Directory of exported workflow files imported on `serve` startup.
    pub workflows_dir: Option<PathBuf>,
}

impl TaskflowConfig {
    /// Load configuration from a YAML file.
    ///
    /// - If `path` is `Some`, load that specific file (error if missing).
    /// - If `path` is `None`, auto-detect `taskflow.yaml` in cwd; return defaults if absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file_path = match path {
            Some(p) => {
                if !p.exists() {
                    anyhow::bail!("Config file not found: {}", p.display());
                }
                p.to_path_buf()
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if !default_path.exists() {
                    return Ok(Self::default());
                }
                default_path.to_path_buf()
            }
        };

        let contents = std::fs::read_to_string(&file_path)
            .with_context(|| format!("Failed to read config file: {}", file_path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", file_path.display()))
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(contents)?)
    }
}

/// Read an exported workflow document. `.yaml`/`.yml` files are parsed as
/// YAML, everything else as JSON.
pub fn load_export(path: &Path) -> Result<WorkflowExport> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read workflow file: {}", path.display()))?;

    let export = if is_yaml(path) {
        serde_yml::from_str(&contents).map_err(anyhow::Error::from)
    } else {
        serde_json::from_str(&contents).map_err(anyhow::Error::from)
    };
    export.with_context(|| format!("Failed to parse workflow file: {}", path.display()))
}

/// Workflow files (`*.json`, `*.yaml`, `*.yml`) directly inside `dir`, sorted by path.
pub fn workflow_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read workflows dir: {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_workflow = path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e, "json" | "yaml" | "yml"));
        if is_workflow {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e, "yaml" | "yml"))
}
