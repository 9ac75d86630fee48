//! # MOBEX CLI (`mobex`)
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mobex case create <name>` | Register a case |
//! | `mobex case list` | List cases |
//! | `mobex ingest <case-id> <file>` | Hash, extract and record an artifact |
//! | `mobex evidence <case-id>` | Evidence summaries for a case |
//! | `mobex export <case-id> --types messages,contacts --format csv` | Write a digested export |
//! | `mobex exports <case-id>` | Export history |
//! | `mobex extract <path>` | Dry-run extraction, nothing recorded |
//! | `mobex verify <file> <sha256>` | Re-hash a delivered export |
//!
//! Results are printed as JSON on stdout; logs go to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use mobex_lib::common::audit;
use mobex_lib::common::hash::{compare_hashes, hash_file, is_valid_hash, HashAlgorithm};
use mobex_lib::{EngineConfig, EvidenceEngine, Extractor, SqliteLedger};

/// Mobile evidence extraction and forensic export
#[derive(Parser)]
#[command(name = "mobex", version, about)]
struct Cli {
    /// Ledger database (defaults to the per-user data directory)
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,

    /// Engine configuration file (TOML); built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging with file:line and thread ids
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage cases
    Case {
        #[command(subcommand)]
        action: CaseAction,
    },

    /// Ingest an artifact (.db, .sqlite, .zip, .plist, ...) into a case
    Ingest {
        case_id: String,
        file: PathBuf,
    },

    /// List evidence of a case (counts only, no records)
    Evidence { case_id: String },

    /// Export aggregated records of a case
    Export {
        case_id: String,

        /// Record classes: messages, contacts, call_logs
        #[arg(long, value_delimiter = ',', default_value = "messages,contacts,call_logs")]
        types: Vec<String>,

        /// Output format: json or csv
        #[arg(long, default_value = "json")]
        format: String,

        /// Directory the export file is written to
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Show the export history of a case
    Exports { case_id: String },

    /// Extract a file or unpacked backup directory without recording it
    Extract { path: PathBuf },

    /// Verify a file against an expected SHA-256
    Verify { file: PathBuf, sha256: String },
}

#[derive(Subcommand)]
enum CaseAction {
    Create {
        name: String,
        #[arg(long, default_value = "")]
        investigator: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    List,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn open_engine(cli: &Cli, config: EngineConfig) -> anyhow::Result<EvidenceEngine> {
    let path = cli.ledger.clone().unwrap_or_else(SqliteLedger::default_path);
    let ledger = SqliteLedger::open(&path).with_context(|| format!("opening ledger {}", path.display()))?;
    Ok(EvidenceEngine::new(config, Arc::new(ledger))?)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        mobex_lib::logging::init_verbose();
    } else {
        mobex_lib::logging::init();
    }

    let config = load_config(cli.config.as_deref())?;

    // Commands that don't touch the ledger
    match &cli.command {
        Commands::Extract { path } => {
            let extractor = Extractor::new(config)?;
            let outcome = extractor.extract_path(path);
            return print_json(&json!({
                "summary": outcome.records.summary(),
                "diagnostics": outcome.diagnostics,
            }));
        }
        Commands::Verify { file, sha256 } => {
            if !is_valid_hash(sha256, HashAlgorithm::Sha256) {
                bail!("expected digest is not a SHA-256 hex string: {sha256}");
            }
            let computed = hash_file(file, HashAlgorithm::Sha256)
                .with_context(|| format!("hashing {}", file.display()))?;
            let result = compare_hashes(&computed, sha256);
            let identifier = file.display().to_string();
            audit::log_hash_verification(&identifier, HashAlgorithm::Sha256.name(), &computed, sha256, result.is_match());
            print_json(&json!({
                "file": identifier,
                "computed": computed,
                "expected": sha256,
                "verified": result.is_match(),
            }))?;
            if !result.is_match() {
                bail!("digest mismatch for {}", file.display());
            }
            return Ok(());
        }
        _ => {}
    }

    let engine = open_engine(&cli, config)?;

    match &cli.command {
        Commands::Case { action } => match action {
            CaseAction::Create { name, investigator, description } => {
                print_json(&engine.create_case(name, investigator, description)?)?;
            }
            CaseAction::List => print_json(&engine.list_cases()?)?,
        },
        Commands::Ingest { case_id, file } => {
            let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            print_json(&engine.ingest(case_id, &bytes, &filename)?)?;
        }
        Commands::Evidence { case_id } => print_json(&engine.evidence_summaries(case_id)?)?,
        Commands::Export { case_id, types, format, out } => {
            let artifact = engine.export(case_id, types.as_slice(), format)?;
            std::fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
            let target = out.join(&artifact.filename);
            std::fs::write(&target, artifact.bytes()).with_context(|| format!("writing {}", target.display()))?;
            print_json(&json!({
                "export": artifact.record,
                "path": target.display().to_string(),
                "content_type": artifact.content_type,
                "bytes": artifact.len(),
            }))?;
        }
        Commands::Exports { case_id } => print_json(&engine.export_history(case_id)?)?,
        Commands::Extract { .. } | Commands::Verify { .. } => {}
    }

    Ok(())
}
