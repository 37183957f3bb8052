//! Search command handler.

use std::io::Read;
use std::path::{Path, PathBuf};

use glimpse::config::GlimpseConfig;
use glimpse::models::ImageUpload;
use glimpse::services::ServiceContainer;

/// Search command.
///
/// Prints the JSON response. Client and server errors are printed too, then
/// reported as a command failure.
pub fn cmd_search(
    config: &GlimpseConfig,
    image: Option<PathBuf>,
    base64: Option<String>,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let upload = build_upload(image.as_deref(), base64.as_deref())?;
    let services = ServiceContainer::open(config)?;
    let search = services.search();
    let limit = limit.unwrap_or_else(|| search.matcher().max_results());

    let response = search.search_with_limit(&upload, limit);
    println!("{}", serde_json::to_string_pretty(&response)?);

    if response.success {
        Ok(())
    } else {
        Err(format!(
            "search failed with status {}",
            response.status.http_code()
        )
        .into())
    }
}

/// Builds the upload from the CLI arguments.
///
/// `--base64 @FILE` reads the payload from a file, `--base64 @-` from stdin.
fn build_upload(
    image: Option<&Path>,
    base64: Option<&str>,
) -> Result<ImageUpload, Box<dyn std::error::Error>> {
    if let Some(path) = image {
        return Ok(ImageUpload::Raw(std::fs::read(path)?));
    }
    let Some(payload) = base64 else {
        return Ok(ImageUpload::Missing);
    };
    let payload = match payload.strip_prefix('@') {
        Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        },
        Some(file) => std::fs::read_to_string(file)?,
        None => payload.to_string(),
    };
    Ok(ImageUpload::Base64(payload))
}
