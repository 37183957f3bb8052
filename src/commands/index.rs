//! Index command handler.

use glimpse::config::GlimpseConfig;
use glimpse::services::{IngestOptions, IngestOutcome, ServiceContainer};

/// Index command.
///
/// Extracts descriptors for active items that have an image but no current
/// descriptor. Per-item failures are listed; they do not fail the command.
pub fn cmd_index(
    config: &GlimpseConfig,
    force: bool,
    dry_run: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let services = ServiceContainer::open(config)?;
    let options = IngestOptions::new().with_force(force).with_dry_run(dry_run);
    let report = services.ingestion().run(options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Indexing catalog at {}", config.db_path().display());
    println!("Dry run: {dry_run}");
    println!("Force re-extract: {force}");
    println!();

    for entry in &report.entries {
        if let IngestOutcome::Failed(reason) = &entry.outcome {
            println!("  {}: {reason}", entry.id);
        }
    }
    if report.failed > 0 {
        println!();
    }

    let verb = if dry_run { "Would process" } else { "Processed" };
    println!(
        "{verb} {} products, {} errors",
        report.processed, report.failed
    );
    println!("  No image: {}", report.skipped_no_image);
    println!("  Already extracted: {}", report.already_indexed);
    Ok(())
}
