//! focusport CLI
//!
//! Drives the import pipeline against the SQLite store: parse, pre-flight
//! validation, then the phased write run with live progress on stderr and a
//! JSON summary on stdout.

use anyhow::{Context, Result};
use clap::Parser;
use focusport::cli::{Cli, Command, ImportArgs, ValidateArgs};
use focusport::config::MappingConfig;
use focusport::executor::ImportExecutor;
use focusport::mapper::validate_mapping;
use focusport::parser::parse;
use focusport::paths::{default_database_path, ensure_parent_dir};
use focusport::store::SqliteStore;
use focusport::types::Archive;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => MappingConfig::from_yaml_file(path)?,
        None => MappingConfig::default(),
    };

    match &cli.command {
        Command::Validate(args) => run_validate(args, &config),
        Command::Import(args) => run_import(&cli, args, config),
    }
}

fn load_archive(file: &Path) -> Result<Archive> {
    let bytes =
        std::fs::read(file).with_context(|| format!("read archive {}", file.display()))?;
    let archive = parse(&bytes)?;
    info!(
        projects = archive.projects.len(),
        tasks = archive.task_count(),
        contexts = archive.contexts.len(),
        "archive parsed"
    );
    Ok(archive)
}

fn run_validate(args: &ValidateArgs, config: &MappingConfig) -> Result<()> {
    let archive = load_archive(&args.file)?;
    let report = validate_mapping(&archive, config);

    let summary = json!({
        "projects": archive.projects.len(),
        "tasks": archive.task_count(),
        "contexts": archive.contexts.len(),
        "report": report,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_import(cli: &Cli, args: &ImportArgs, config: MappingConfig) -> Result<()> {
    let config = args.apply(config);
    let archive = load_archive(&args.file)?;
    info!(mode = args.mode(), owner = %cli.owner, "starting");

    if args.dry_run {
        let report = validate_mapping(&archive, &config);
        let summary = json!({
            "would_import_projects": archive.projects.len(),
            "would_import_tasks": archive.task_count(),
            "report": report,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let db_path: PathBuf = cli
        .database
        .clone()
        .unwrap_or_else(default_database_path);
    ensure_parent_dir(&db_path)
        .with_context(|| format!("create data directory for {}", db_path.display()))?;
    let store = SqliteStore::open(&db_path, &cli.owner)?;

    let mut executor = ImportExecutor::new(store, config);
    if !args.quiet {
        executor = executor.with_progress(|p| {
            info!(
                target: "focusport::progress",
                "[{}/{}] {}: {}",
                p.current, p.total, p.phase, p.message
            );
        });
    }

    let result = executor.execute(&archive)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
