//! Extract command handler.

use std::path::Path;

use clap::ValueEnum;
use glimpse::config::GlimpseConfig;
use glimpse::services::ServiceContainer;

/// Output format for a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DescriptorFormat {
    /// Length, version, digest, value range, and the leading values.
    Summary,
    /// JSON array of values.
    Json,
    /// Hex of the stored little-endian byte layout.
    Hex,
}

/// Number of leading values shown in the summary.
const PREVIEW_LEN: usize = 8;

/// Extract command.
pub fn cmd_extract(
    config: &GlimpseConfig,
    image: &Path,
    format: DescriptorFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let services = ServiceContainer::in_memory(config)?;
    let record = services.ingestion().extract_file(image)?;
    let values = record.descriptor.as_slice();

    match format {
        DescriptorFormat::Json => {
            println!("{}", serde_json::to_string(&record.descriptor)?);
        },
        DescriptorFormat::Hex => {
            println!("{}", hex::encode(record.descriptor.to_bytes()));
        },
        DescriptorFormat::Summary => {
            let (min, max) = values
                .iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                });
            let nonzero = values.iter().filter(|v| **v != 0.0).count();

            println!("Image: {}", image.display());
            println!("Descriptor: {record}");
            println!(
                "Source SHA-256: {}",
                record.source_digest.as_deref().unwrap_or("(unknown)")
            );
            println!("Range: [{min:.6}, {max:.6}]");
            println!("Non-zero values: {nonzero}/{}", values.len());
            let preview: Vec<String> = values
                .iter()
                .take(PREVIEW_LEN)
                .map(|v| format!("{v:.4}"))
                .collect();
            println!("First values: [{}]", preview.join(", "));
        },
    }
    Ok(())
}
