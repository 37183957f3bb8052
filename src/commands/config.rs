//! Config command handler.

use glimpse::config::GlimpseConfig;

/// Config command.
pub fn cmd_config(config: &GlimpseConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !show {
        println!("Use --show to display the effective configuration.");
        return Ok(());
    }

    println!("Current Configuration");
    println!("=====================");
    println!();
    println!("Data Directory: {}", config.data_dir.display());
    println!("Catalog Database: {}", config.db_path().display());
    println!();

    println!("Search:");
    println!("  Feature Size: {}", config.search.feature_size);
    println!("  Grid Size: {0}x{0}", config.search.grid_size);
    println!("  Histogram Bins: {}", config.search.histogram_bins);
    println!("  Threshold: {}", config.search.threshold);
    println!("  Max Results: {}", config.search.max_results);
    println!();

    println!("Logging:");
    println!(
        "  Format: {}",
        config.logging.format.as_deref().unwrap_or("pretty")
    );
    println!(
        "  Level: {}",
        config.logging.level.as_deref().unwrap_or("(default)")
    );
    println!(
        "  File: {}",
        config
            .logging
            .file
            .as_ref()
            .map_or_else(|| "(stderr)".to_string(), |p| p.display().to_string())
    );
    println!();

    println!("Metrics:");
    println!("  Enabled: {}", config.metrics.enabled);
    if let Some(port) = config.metrics.port {
        println!("  Port: {port}");
    }
    Ok(())
}
