//! Modelvault - model artifact versioning
//!
//! Usage:
//!   modelvault create fraud_detection          # Snapshot the active artifact
//!   modelvault list fraud_detection            # Newest first
//!   modelvault rollback fraud_detection <id>   # Restore a snapshot as active
//!   modelvault models                          # Every versioned model

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use serde_json::{Map, Value, json};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modelvault_core::config::{ConfigStore, StoreConfig};
use modelvault_core::types::{ModelSummary, VerifyReport, VersionComparison, VersionRecord};
use modelvault_core::version::VersionStore;

#[derive(Parser)]
#[command(name = "modelvault")]
#[command(about = "Versioned snapshots of trained model artifacts", long_about = None)]
struct Cli {
    /// Path to modelvault.toml (default: ./modelvault.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Snapshot a model artifact as a new version
    Create {
        /// Model name
        model: String,
        /// Artifact to snapshot (default: the model's active artifact)
        path: Option<PathBuf>,
        /// Metadata entry; VALUE is parsed as JSON when possible
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
        /// Author recorded on the version (default: from config)
        #[arg(long)]
        created_by: Option<String>,
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List versions of a model, newest first
    #[command(alias = "ls")]
    List {
        model: String,
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show the newest version of a model
    Latest {
        model: String,
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show one version's metadata
    Show {
        model: String,
        version: String,
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Restore a version as the model's active artifact
    Rollback {
        model: String,
        version: String,
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Permanently delete a version
    #[command(alias = "rm")]
    Delete {
        model: String,
        version: String,
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Compare two versions of a model
    Compare {
        model: String,
        version_a: String,
        version_b: String,
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Re-hash a stored artifact and check it against its metadata
    Verify {
        model: String,
        version: String,
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List all versioned models
    Models {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show the resolved configuration
    Config {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn main() -> Result<()> {
    // Logs go to stderr so JSON on stdout stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modelvault=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_store = ConfigStore::discover(cli.config)?;
    let config = config_store.load()?;
    debug!(
        config_file = ?config_store.config_path(),
        versions_root = %config.versions_root.display(),
        active_dir = %config.active_dir.display(),
        "Resolved configuration"
    );

    let store = VersionStore::from_config(&config);

    run_cli(&store, &config_store, &config, cli.command)
}

fn run_cli(
    store: &VersionStore,
    config_store: &ConfigStore,
    config: &StoreConfig,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Create {
            model,
            path,
            meta,
            created_by,
            format,
        } => run_create(store, &model, path, &meta, created_by, format),
        Commands::List { model, format } => {
            let versions = store.list_versions(&model)?;
            match format {
                OutputFormat::Table => print_versions_table(&model, &versions),
                OutputFormat::Json => print_json(&json!({
                    "model_name": model,
                    "total_versions": versions.len(),
                    "versions": versions,
                }))?,
            }
            Ok(())
        }
        Commands::Latest { model, format } => {
            let latest = store
                .get_latest_version(&model)?
                .ok_or_else(|| anyhow::anyhow!("Model '{}' has no versions", model))?;
            print_record(&latest, format)
        }
        Commands::Show {
            model,
            version,
            format,
        } => {
            let record = store
                .get_version(&model, &version)?
                .ok_or_else(|| {
                    anyhow::anyhow!("Version {} of model '{}' not found", version, model)
                })?;
            print_record(&record, format)
        }
        Commands::Rollback {
            model,
            version,
            format,
        } => {
            if !store.rollback_to_version(&model, &version)? {
                anyhow::bail!(
                    "Version {} of model '{}' has no .{} artifact to restore",
                    version,
                    model,
                    store.active().extension()
                );
            }
            let active = store.active().path_for(&model)?;
            match format {
                OutputFormat::Table => println!(
                    "{} Rolled back '{}' to {}\n  Active: {}",
                    style("✓").green(),
                    model,
                    style(&version).cyan(),
                    active.display()
                ),
                OutputFormat::Json => print_json(&json!({
                    "status": "success",
                    "model_name": model,
                    "rolled_back_to": version,
                    "active_path": active,
                }))?,
            }
            Ok(())
        }
        Commands::Delete {
            model,
            version,
            format,
        } => {
            if !store.delete_version(&model, &version)? {
                anyhow::bail!("Version {} of model '{}' not found", version, model);
            }
            match format {
                OutputFormat::Table => println!(
                    "{} Deleted {} of '{}'",
                    style("✓").green(),
                    style(&version).cyan(),
                    model
                ),
                OutputFormat::Json => print_json(&json!({
                    "status": "success",
                    "model_name": model,
                    "deleted_version": version,
                }))?,
            }
            Ok(())
        }
        Commands::Compare {
            model,
            version_a,
            version_b,
            format,
        } => {
            let comparison = store.compare_versions(&model, &version_a, &version_b)?;
            match format {
                OutputFormat::Table => print_comparison(&comparison),
                OutputFormat::Json => print_json(&comparison)?,
            }
            Ok(())
        }
        Commands::Verify {
            model,
            version,
            format,
        } => {
            let report = store.verify_version(&model, &version)?;
            match format {
                OutputFormat::Table => print_verify(&report),
                OutputFormat::Json => print_json(&report)?,
            }
            if !report.is_intact() {
                anyhow::bail!("Version {} of model '{}' is corrupt", version, model);
            }
            Ok(())
        }
        Commands::Models { format } => {
            let summaries = store.model_summaries()?;
            match format {
                OutputFormat::Table => print_models_table(&summaries),
                OutputFormat::Json => print_json(&json!({
                    "total_models": summaries.len(),
                    "versioned_models": summaries,
                }))?,
            }
            Ok(())
        }
        Commands::Config { format } => print_config(config_store, config, format),
    }
}

fn run_create(
    store: &VersionStore,
    model: &str,
    path: Option<PathBuf>,
    meta: &[String],
    created_by: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let source = match path {
        Some(path) => path,
        None => store.active().resolve_source(model)?.ok_or_else(|| {
            anyhow::anyhow!(
                "No artifact found for '{}' in {}",
                model,
                store.active().dir().display()
            )
        })?,
    };

    let mut metadata = Map::new();
    for pair in meta {
        let (key, value) = parse_meta_pair(pair)?;
        metadata.insert(key, value);
    }

    debug!(model, source = %source.display(), entries = metadata.len(), "Creating version");
    let id = match &created_by {
        Some(author) => store.create_version_by(model, &source, metadata, author),
        None => store.create_version(model, &source, metadata),
    }
    .with_context(|| format!("Failed to version {}", source.display()))?;

    match format {
        OutputFormat::Table => println!(
            "{} Created {} of '{}' from {}",
            style("✓").green(),
            style(&id).cyan(),
            model,
            source.display()
        ),
        OutputFormat::Json => print_json(&json!({
            "status": "success",
            "model_name": model,
            "version_id": id.as_str(),
            "source": source,
        }))?,
    }
    Ok(())
}

/// Split `KEY=VALUE`; VALUE becomes JSON when it parses, a string otherwise.
fn parse_meta_pair(pair: &str) -> Result<(String, Value)> {
    let (key, raw) = pair
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Invalid metadata '{}': expected KEY=VALUE", pair))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Invalid metadata '{}': empty key", pair);
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_record(record: &VersionRecord, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(record)?,
        OutputFormat::Table => {
            println!("{}", style(&record.version).bold());
            println!("  Model:      {}", record.model_name);
            println!("  Created:    {}", record.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("  Created by: {}", record.created_by);
            println!("  Hash:       {}", record.file_hash);
            println!("  Size:       {} bytes", record.file_size_bytes);
            if !record.metadata.is_empty() {
                println!("  Metadata:");
                for (key, value) in &record.metadata {
                    println!("    {}: {}", key, value);
                }
            }
        }
    }
    Ok(())
}

fn print_versions_table(model: &str, versions: &[VersionRecord]) {
    if versions.is_empty() {
        println!("No versions of '{}'.", model);
        println!("Create one with: modelvault create {}", model);
        return;
    }

    println!("{:<28} {:<22} {:<12} {:>12}", "Version", "Created (UTC)", "By", "Size");
    println!("{}", "-".repeat(77));
    for (i, record) in versions.iter().enumerate() {
        let marker = if i == 0 { "*" } else { " " };
        println!(
            "{}{:<27} {:<22} {:<12} {:>12}",
            marker,
            record.version,
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.created_by,
            record.file_size_bytes
        );
    }
}

fn print_models_table(summaries: &[ModelSummary]) {
    if summaries.is_empty() {
        println!("No versioned models.");
        return;
    }

    println!("{:<30} {:>8}  Latest", "Model", "Versions");
    println!("{}", "-".repeat(70));
    for summary in summaries {
        let latest = summary
            .latest_version
            .as_ref()
            .map(|r| r.version.as_str())
            .unwrap_or("-");
        println!(
            "{:<30} {:>8}  {}",
            summary.model_name, summary.total_versions, latest
        );
    }
}

fn print_comparison(cmp: &VersionComparison) {
    println!("Model: {}", cmp.model_name);
    for (label, record) in [("A", &cmp.version_a), ("B", &cmp.version_b)] {
        println!("  {}: {}", label, style(&record.version).bold());
        println!("     Created:    {}", record.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("     Created by: {}", record.created_by);
        println!("     Hash:       {}", record.file_hash);
        println!("     Size:       {} bytes", record.file_size_bytes);
        for (key, value) in &record.metadata {
            println!("     {}: {}", key, value);
        }
    }
    let same = if cmp.same_hash {
        style("identical").green()
    } else {
        style("different").yellow()
    };
    println!("  Content:   {}", same);
    println!("  Size diff: {:+} bytes (B - A)", cmp.size_difference);
    println!("  B newer:   {}", cmp.b_is_newer);
}

fn print_verify(report: &VerifyReport) {
    if report.is_intact() {
        println!(
            "{} {} of '{}' matches its metadata",
            style("✓").green(),
            report.version,
            report.model_name
        );
        return;
    }
    println!(
        "{} {} of '{}' does not match its metadata",
        style("✗").red(),
        report.version,
        report.model_name
    );
    println!("  Expected: {} ({} bytes)", report.expected_hash, report.expected_size);
    println!("  Actual:   {} ({} bytes)", report.actual_hash, report.actual_size);
}

fn print_config(store: &ConfigStore, config: &StoreConfig, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "config_file": store.config_path(),
            "settings": config,
        })),
        OutputFormat::Table => {
            match store.config_path() {
                Some(path) => println!("Config file:        {}", path.display()),
                None => println!("Config file:        (none, using defaults)"),
            }
            println!("Versions root:      {}", config.versions_root.display());
            println!("Active dir:         {}", config.active_dir.display());
            println!("Artifact extension: {}", config.artifact_extension);
            println!("Created by:         {}", config.created_by);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MISSING: &str = "v20000101_000000_00000000";

    fn temp_store(tmp: &TempDir) -> (VersionStore, ConfigStore, StoreConfig) {
        let config = StoreConfig::with_base(tmp.path());
        let config_store = ConfigStore::from_paths(None, tmp.path().to_path_buf(), None).unwrap();
        let store = VersionStore::from_config(&config);
        (store, config_store, config)
    }

    fn run(tmp: &TempDir, command: Commands) -> Result<()> {
        let (store, config_store, config) = temp_store(tmp);
        run_cli(&store, &config_store, &config, command)
    }

    #[test]
    fn test_parse_meta_pair_json_value() {
        let (key, value) = parse_meta_pair("accuracy=0.93").unwrap();
        assert_eq!(key, "accuracy");
        assert_eq!(value, json!(0.93));
    }

    #[test]
    fn test_parse_meta_pair_plain_string() {
        let (key, value) = parse_meta_pair("platform=Enhanced MLOps v3.0").unwrap();
        assert_eq!(key, "platform");
        assert_eq!(value, json!("Enhanced MLOps v3.0"));
    }

    #[test]
    fn test_parse_meta_pair_keeps_equals_in_value() {
        let (_, value) = parse_meta_pair("query=a=b").unwrap();
        assert_eq!(value, json!("a=b"));
    }

    #[test]
    fn test_parse_meta_pair_rejects_missing_separator() {
        assert!(parse_meta_pair("accuracy").is_err());
        assert!(parse_meta_pair("=1").is_err());
    }

    #[test]
    fn test_cli_parses_create() {
        let cli = Cli::try_parse_from([
            "modelvault",
            "create",
            "fraud_detection",
            "models/fraud.pkl",
            "--meta",
            "auc=0.9",
            "-f",
            "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Create { model, path, meta, .. } => {
                assert_eq!(model, "fraud_detection");
                assert_eq!(path, Some(PathBuf::from("models/fraud.pkl")));
                assert_eq!(meta, vec!["auc=0.9".to_string()]);
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn test_show_missing_version_fails() {
        let tmp = TempDir::new().unwrap();
        let result = run(
            &tmp,
            Commands::Show {
                model: "demo".into(),
                version: MISSING.into(),
                format: OutputFormat::Table,
            },
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains(MISSING), "unexpected error: {err}");
    }

    #[test]
    fn test_rollback_missing_version_fails() {
        let tmp = TempDir::new().unwrap();
        let result = run(
            &tmp,
            Commands::Rollback {
                model: "demo".into(),
                version: MISSING.into(),
                format: OutputFormat::Json,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_delete_missing_version_fails() {
        let tmp = TempDir::new().unwrap();
        let result = run(
            &tmp,
            Commands::Delete {
                model: "demo".into(),
                version: MISSING.into(),
                format: OutputFormat::Table,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_compare_with_missing_side_fails() {
        let tmp = TempDir::new().unwrap();
        let (store, config_store, config) = temp_store(&tmp);
        let source = tmp.path().join("demo.pkl");
        fs::write(&source, b"weights").unwrap();
        let existing = store.create_version("demo", &source, Map::new()).unwrap();

        let result = run_cli(
            &store,
            &config_store,
            &config,
            Commands::Compare {
                model: "demo".into(),
                version_a: existing.to_string(),
                version_b: MISSING.into(),
                format: OutputFormat::Json,
            },
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains(MISSING), "unexpected error: {err}");
    }

    #[test]
    fn test_compare_existing_versions_succeeds() {
        let tmp = TempDir::new().unwrap();
        let (store, config_store, config) = temp_store(&tmp);
        let source = tmp.path().join("demo.pkl");
        fs::write(&source, b"weights").unwrap();
        let id = store.create_version("demo", &source, Map::new()).unwrap();

        let result = run_cli(
            &store,
            &config_store,
            &config,
            Commands::Compare {
                model: "demo".into(),
                version_a: id.to_string(),
                version_b: id.to_string(),
                format: OutputFormat::Table,
            },
        );
        assert!(result.is_ok());
    }
}
