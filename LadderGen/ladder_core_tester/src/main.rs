use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use ladder_core::adapters::csv_export::ExportError;
use ladder_core::adapters::load_snapshot;
use ladder_core::application::conformance::check_offsets;
use ladder_core::{GenerationOutput, GenerationSettings, LadderService};
use log::warn;

#[derive(Parser)]
#[command(name = "ladder_core_tester")]
#[command(about = "Generate ladder instruction lists from project snapshots")]
struct Args {
    /// Snapshot JSON file, or a directory of them
    path: PathBuf,

    /// Generation settings JSON (defaults are used when the file is missing)
    #[arg(short = 's', long, default_value = "ladder_settings.json")]
    settings: PathBuf,

    /// Export directory; one sub directory per snapshot
    #[arg(short = 'o', long)]
    out: Option<PathBuf>,

    /// Print diagnostics as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Debug logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let settings = GenerationSettings::load_from_file(&args.settings)?;
    let entries = snapshot_files(&args.path)?;
    if entries.is_empty() {
        println!("No .json snapshots found in {}", args.path.display());
        return Ok(());
    }

    for path in entries {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let snapshot = match load_snapshot(&path) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                println!("[fail] {}: {}", stem, err);
                continue;
            }
        };

        let service = LadderService::from_snapshot(&snapshot, settings.clone())?;
        let output = service.generate(&snapshot);
        print_summary(&stem, &output, args.json)?;

        for violation in check_offsets(&snapshot, &output.program) {
            warn!(
                "row {} uses {} (offset {} of {} {}) outside its role set",
                violation.row_id,
                violation.device,
                violation.offset,
                violation.mnemonic_type.name(),
                violation.record_id
            );
        }

        if let Some(out) = &args.out {
            let dir = out.join(&stem);
            match service.export(&output, &dir) {
                Ok(outcome) => println!(
                    "  exported {} files -> {} ({})",
                    outcome.files.len(),
                    dir.display(),
                    outcome.summary.stream_digest
                ),
                Err(ExportError::Blocked { critical }) => {
                    println!("  export blocked: {} critical diagnostic(s)", critical)
                }
                Err(err) => {
                    return Err(err).with_context(|| format!("failed to export {}", stem));
                }
            }
        }
    }

    Ok(())
}

fn snapshot_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.exists() {
        anyhow::bail!("snapshot path not found: {}", path.display());
    }
    let mut entries: Vec<PathBuf> = fs::read_dir(path)
        .with_context(|| format!("failed to list {}", path.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("json"))
                    .unwrap_or(false)
        })
        .collect();
    entries.sort();
    Ok(entries)
}

fn print_summary(stem: &str, output: &GenerationOutput, json: bool) -> Result<()> {
    let status = if output.has_critical() { "blocked" } else { "ok" };
    println!(
        "[{}] {} rows={} diagnostics={} critical={}",
        status,
        stem,
        output.program.row_count(),
        output.diagnostics.len(),
        output.critical_count()
    );
    for section in &output.program.sections {
        println!("  - {} rows={}", section.kind.file_stem(), section.rows.len());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&output.diagnostics)?);
        return Ok(());
    }
    for d in &output.diagnostics {
        println!(
            "  {} {} {} '{}': {}",
            if d.is_critical { "CRITICAL" } else { "warning " },
            d.mnemonic_type.name(),
            d.record_id,
            d.record_name,
            d.message
        );
    }
    Ok(())
}
