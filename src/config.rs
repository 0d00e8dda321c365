//! Mapping configuration supplied by the caller.
//!
//! The pipeline never mutates a `MappingConfig`; the CLI loads one from a
//! YAML file (all fields optional, missing fields take defaults) and the
//! library accepts it by value.
//!
//! ```yaml
//! context_tags:
//!   Errands: shopping
//! skip_projects: ["Template project"]
//! skip_contexts: ["Waiting"]
//! duplicates: skip
//! import_completed: true
//! preserve_hierarchy: true
//! ```

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Policy for a target-side name collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateStrategy {
    /// Leave the existing record alone and skip the incoming one.
    #[default]
    Skip,
    /// Import the incoming record under a suffixed name ("name (2)").
    CreateNew,
    /// Overwrite the existing record's fields in place.
    Replace,
}

impl DuplicateStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateStrategy::Skip => "skip",
            DuplicateStrategy::CreateNew => "create-new",
            DuplicateStrategy::Replace => "replace",
        }
    }
}

/// Caller-supplied knobs for one import run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct MappingConfig {
    /// Explicit context-name → tag-name mappings. Contexts without an entry
    /// fall back to a slugified version of their raw name.
    pub context_tags: HashMap<String, String>,

    /// Project names to leave out of the import entirely.
    pub skip_projects: Vec<String>,

    /// Context names that should not become tags.
    pub skip_contexts: Vec<String>,

    /// What to do when a project/task with the same name already exists.
    pub duplicates: DuplicateStrategy,

    /// Import tasks that are already completed (default: true).
    pub import_completed: bool,

    /// Keep nested subtasks nested. When false, every task in a project's
    /// tree is imported directly under the project (default: true).
    pub preserve_hierarchy: bool,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            context_tags: HashMap::new(),
            skip_projects: Vec::new(),
            skip_contexts: Vec::new(),
            duplicates: DuplicateStrategy::Skip,
            import_completed: true,
            preserve_hierarchy: true,
        }
    }
}

impl MappingConfig {
    /// Load a config from a YAML file. Missing fields take their defaults,
    /// so a partial file (or an empty mapping `{}`) is valid.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read mapping config {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("parse mapping config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_import_everything() {
        let config = MappingConfig::default();
        assert!(config.context_tags.is_empty());
        assert_eq!(config.duplicates, DuplicateStrategy::Skip);
        assert!(config.import_completed);
        assert!(config.preserve_hierarchy);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: MappingConfig = serde_yaml::from_str(
            "context_tags:\n  Errands: shopping\nduplicates: create-new\n",
        )
        .unwrap();

        assert_eq!(config.context_tags.get("Errands").unwrap(), "shopping");
        assert_eq!(config.duplicates, DuplicateStrategy::CreateNew);
        assert!(config.import_completed);
        assert!(config.skip_projects.is_empty());
    }

    #[test]
    fn empty_mapping_is_valid() {
        let config: MappingConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.duplicates, DuplicateStrategy::Skip);
    }
}
