//! CLI command definitions.
//!
//! Two subcommands: `validate` parses an archive and prints the pre-flight
//! report without touching the store; `import` runs the full pipeline.

use crate::config::{DuplicateStrategy, MappingConfig};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Import OmniFocus archive exports into a local task store.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a mapping configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the task store database (defaults to the platform data dir)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Principal the import runs as
    #[arg(short, long, global = true, default_value = "local")]
    pub owner: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse an archive and report mapping problems without writing anything
    Validate(ValidateArgs),
    /// Import an archive into the task store
    Import(ImportArgs),
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the archive export file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Path to the archive export file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// How to handle records whose name already exists in the store
    #[arg(long, value_enum)]
    pub duplicates: Option<DuplicateStrategy>,

    /// Leave out tasks that are already completed
    #[arg(long)]
    pub skip_completed: bool,

    /// Import nested subtasks directly under their project instead of
    /// preserving the tree
    #[arg(long)]
    pub flatten: bool,

    /// Parse and validate, then report what would be imported without
    /// writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Suppress per-item progress lines
    #[arg(long)]
    pub quiet: bool,
}

impl ImportArgs {
    /// Overlay command-line flags onto a loaded config.
    pub fn apply(&self, mut config: MappingConfig) -> MappingConfig {
        if let Some(duplicates) = self.duplicates {
            config.duplicates = duplicates;
        }
        if self.skip_completed {
            config.import_completed = false;
        }
        if self.flatten {
            config.preserve_hierarchy = false;
        }
        config
    }

    /// Describe the run mode for logging.
    pub fn mode(&self) -> &'static str {
        if self.dry_run { "dry-run" } else { "import" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ImportArgs {
        ImportArgs {
            file: PathBuf::from("export.xml"),
            duplicates: None,
            skip_completed: false,
            flatten: false,
            dry_run: false,
            quiet: false,
        }
    }

    #[test]
    fn apply_keeps_config_when_no_flags() {
        let config = args().apply(MappingConfig::default());
        assert_eq!(config.duplicates, DuplicateStrategy::Skip);
        assert!(config.import_completed);
        assert!(config.preserve_hierarchy);
    }

    #[test]
    fn apply_overlays_flags() {
        let mut a = args();
        a.duplicates = Some(DuplicateStrategy::Replace);
        a.skip_completed = true;
        a.flatten = true;

        let config = a.apply(MappingConfig::default());
        assert_eq!(config.duplicates, DuplicateStrategy::Replace);
        assert!(!config.import_completed);
        assert!(!config.preserve_hierarchy);
    }

    #[test]
    fn mode_describes_dry_run() {
        let mut a = args();
        assert_eq!(a.mode(), "import");
        a.dry_run = true;
        assert_eq!(a.mode(), "dry-run");
    }
}
