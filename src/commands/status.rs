//! Status command handler.

use glimpse::config::GlimpseConfig;
use glimpse::services::ServiceContainer;

/// Status command.
pub fn cmd_status(config: &GlimpseConfig, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let services = ServiceContainer::open(config)?;
    let status = services.catalog().status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Glimpse Status");
    println!("==============");
    println!("Catalog: {}", config.db_path().display());
    println!("Feature space: {}", services.extractor().feature_space());
    println!();
    println!("Items: {}", status.total);
    println!("Active: {}", status.active);
    println!("Indexed: {}", status.indexed);
    println!("Not yet searchable: {}", status.not_searchable);
    println!("  Stale descriptors: {}", status.stale);
    println!("  Without image: {}", status.without_image);
    if status.not_searchable > status.without_image {
        println!();
        println!("Run `glimpse index` to extract missing descriptors.");
    }
    Ok(())
}
