//! Ingestion service.
//!
//! Extracts and stores descriptors for active catalog items that have an
//! image but no current descriptor. Extraction runs in parallel; writes are
//! applied one item at a time in catalog order.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::descriptor::Extractor;
use crate::models::{CatalogItem, DescriptorRecord, IndexedItem, ItemId, PixelBuffer};
use crate::storage::CatalogBackend;
use crate::{Error, Result};

/// What happened to one catalog item during an ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// A descriptor was extracted and stored (or would be, in a dry run).
    Processed,
    /// The item has no image to extract from.
    SkippedNoImage,
    /// The item already has a descriptor in the current feature space.
    AlreadyIndexed,
    /// Reading, decoding, extraction, or storage failed.
    Failed(String),
}

impl fmt::Display for IngestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processed => write!(f, "processed"),
            Self::SkippedNoImage => write!(f, "no image"),
            Self::AlreadyIndexed => write!(f, "already extracted"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Outcome for a single item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestEntry {
    /// The item.
    pub id: ItemId,
    /// What happened to it.
    #[serde(flatten)]
    pub outcome: IngestOutcome,
}

/// Summary of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Items that were (or would be) indexed.
    pub processed: usize,
    /// Items without an image.
    pub skipped_no_image: usize,
    /// Items already carrying a current descriptor.
    pub already_indexed: usize,
    /// Items that failed.
    pub failed: usize,
    /// Whether nothing was written.
    pub dry_run: bool,
    /// Per-item outcomes in catalog order.
    pub entries: Vec<IngestEntry>,
}

impl IngestReport {
    fn push(&mut self, id: ItemId, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Processed => self.processed += 1,
            IngestOutcome::SkippedNoImage => self.skipped_no_image += 1,
            IngestOutcome::AlreadyIndexed => self.already_indexed += 1,
            IngestOutcome::Failed(_) => self.failed += 1,
        }
        self.entries.push(IngestEntry { id, outcome });
    }

    /// Total number of items examined.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.processed + self.skipped_no_image + self.already_indexed + self.failed
    }
}

/// Options for an ingestion run.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    /// If true, report what would be processed without writing.
    pub dry_run: bool,
    /// If true, re-extract items that already have a current descriptor.
    pub force: bool,
}

impl IngestOptions {
    /// Creates default options.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dry_run: false,
            force: false,
        }
    }

    /// Sets the `dry_run` option.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the force option.
    #[must_use]
    pub const fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Service that fills in missing descriptors.
#[derive(Clone)]
pub struct IngestionService {
    catalog: Arc<dyn CatalogBackend>,
    extractor: Arc<dyn Extractor>,
}

impl IngestionService {
    /// Creates a new ingestion service.
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogBackend>, extractor: Arc<dyn Extractor>) -> Self {
        Self { catalog, extractor }
    }

    /// Indexes every active item that needs a descriptor.
    ///
    /// Items whose stored descriptor comes from another feature space
    /// (extractor version, grid size or bin count) are re-extracted. A failing item is recorded and the run continues.
    ///
    /// # Errors
    ///
    /// Returns an error only if the catalog cannot be read.
    pub fn run(&self, options: IngestOptions) -> Result<IngestReport> {
        let start = Instant::now();
        let items = self.catalog.indexed_items(true)?;
        let space = self.extractor.feature_space();

        let mut report = IngestReport {
            dry_run: options.dry_run,
            ..IngestReport::default()
        };

        // Decide per item first so the report keeps catalog order.
        let plan: Vec<(IndexedItem, Option<IngestOutcome>)> = items
            .into_iter()
            .map(|indexed| {
                let decided = if indexed.item.image_path.is_none() {
                    Some(IngestOutcome::SkippedNoImage)
                } else if !options.force
                    && indexed.record.as_ref().is_some_and(|r| r.is_in(&space))
                {
                    Some(IngestOutcome::AlreadyIndexed)
                } else {
                    None
                };
                (indexed, decided)
            })
            .collect();

        let extracted: Vec<Option<Result<DescriptorRecord>>> = if options.dry_run {
            plan.iter().map(|_| None).collect()
        } else {
            plan.par_iter()
                .map(|(indexed, decided)| {
                    decided.is_none().then(|| self.extract_item(&indexed.item))
                })
                .collect()
        };

        for ((indexed, decided), extracted) in plan.into_iter().zip(extracted) {
            let id = indexed.item.id;
            let outcome = match (decided, extracted) {
                (Some(outcome), _) => outcome,
                // Dry run: nothing was extracted.
                (None, None) => IngestOutcome::Processed,
                (None, Some(Ok(record))) => match self.catalog.store_descriptor(&id, &record) {
                    Ok(()) => IngestOutcome::Processed,
                    Err(e) => IngestOutcome::Failed(e.to_string()),
                },
                (None, Some(Err(e))) => IngestOutcome::Failed(e.to_string()),
            };
            log_outcome(&id, &outcome);
            report.push(id, outcome);
        }

        metrics::counter!("ingest_items_processed_total").increment(report.processed as u64);
        metrics::counter!("ingest_items_failed_total").increment(report.failed as u64);
        tracing::info!(
            processed = report.processed,
            skipped_no_image = report.skipped_no_image,
            already_indexed = report.already_indexed,
            failed = report.failed,
            dry_run = report.dry_run,
            duration_ms = start.elapsed().as_millis(),
            "Ingestion finished"
        );
        Ok(report)
    }

    /// Extracts a descriptor record for one item from its image file.
    ///
    /// # Errors
    ///
    /// Returns an error if the item has no image, or the image cannot be
    /// read, decoded, or processed.
    pub fn extract_item(&self, item: &CatalogItem) -> Result<DescriptorRecord> {
        let path = item
            .image_path
            .as_deref()
            .ok_or_else(|| Error::InvalidInput(format!("item '{}' has no image", item.id)))?;
        self.extract_file(path)
    }

    /// Extracts a descriptor record from an image file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, decoded, or processed.
    pub fn extract_file(&self, path: &Path) -> Result<DescriptorRecord> {
        let bytes = std::fs::read(path)
            .map_err(|e| Error::operation("read_image", format!("{}: {e}", path.display())))?;
        let digest = hex::encode(Sha256::digest(&bytes));
        let pixels = PixelBuffer::decode(&bytes)?;
        let descriptor = self.extractor.extract(Some(&pixels))?;
        Ok(DescriptorRecord::new(descriptor, self.extractor.feature_space()).with_source_digest(digest))
    }
}

fn log_outcome(id: &ItemId, outcome: &IngestOutcome) {
    match outcome {
        IngestOutcome::Failed(reason) => {
            tracing::warn!(item.id = %id, reason = %reason, "Failed to index item");
        },
        other => tracing::debug!(item.id = %id, outcome = %other, "Ingestion outcome"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DescriptorExtractor, ExtractorConfig};
    use crate::models::{Descriptor, FeatureSpace};
    use crate::storage::SqliteCatalogBackend;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::path::PathBuf;

    fn write_png(dir: &Path, name: &str, color: [u8; 3]) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(16, 16, Rgb(color))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path
    }

    fn service() -> (IngestionService, Arc<SqliteCatalogBackend>) {
        let config = ExtractorConfig::default();
        let catalog = Arc::new(SqliteCatalogBackend::in_memory(config.feature_size).unwrap());
        let extractor = Arc::new(DescriptorExtractor::new(config));
        (IngestionService::new(catalog.clone(), extractor), catalog)
    }

    #[test]
    fn test_run_reports_each_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let (service, catalog) = service();

        let red = write_png(dir.path(), "red.png", [200, 10, 10]);
        std::fs::write(dir.path().join("junk.png"), b"not an image").unwrap();

        catalog
            .upsert_item(&CatalogItem::new("red", "Red").with_image_path(&red))
            .unwrap();
        catalog.upsert_item(&CatalogItem::new("bare", "Bare")).unwrap();
        catalog
            .upsert_item(&CatalogItem::new("junk", "Junk").with_image_path(dir.path().join("junk.png")))
            .unwrap();
        catalog
            .upsert_item(
                &CatalogItem::new("gone", "Gone").with_image_path(dir.path().join("missing.png")),
            )
            .unwrap();
        catalog
            .upsert_item(&CatalogItem::new("hidden", "Hidden").with_image_path(&red).inactive())
            .unwrap();

        let report = service.run(IngestOptions::new()).unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.skipped_no_image, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.already_indexed, 0);
        assert_eq!(report.total(), 4);

        let ids: Vec<&str> = report.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["red", "bare", "junk", "gone"]);

        let record = catalog.get_descriptor(&ItemId::new("red")).unwrap().unwrap();
        assert_eq!(record.descriptor.len(), 512);
        assert_eq!(record.source_digest.as_ref().map(String::len), Some(64));
        assert!(catalog.get_descriptor(&ItemId::new("hidden")).unwrap().is_none());
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (service, catalog) = service();
        let path = write_png(dir.path(), "gray.png", [90, 90, 90]);
        catalog
            .upsert_item(&CatalogItem::new("gray", "Gray").with_image_path(&path))
            .unwrap();

        assert_eq!(service.run(IngestOptions::new()).unwrap().processed, 1);

        let second = service.run(IngestOptions::new()).unwrap();
        assert_eq!(second.processed, 0);
        assert_eq!(second.already_indexed, 1);
        assert_eq!(second.entries[0].outcome, IngestOutcome::AlreadyIndexed);

        let forced = service.run(IngestOptions::new().with_force(true)).unwrap();
        assert_eq!(forced.processed, 1);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (service, catalog) = service();
        let path = write_png(dir.path(), "blue.png", [0, 0, 220]);
        catalog
            .upsert_item(&CatalogItem::new("blue", "Blue").with_image_path(&path))
            .unwrap();

        let report = service.run(IngestOptions::new().with_dry_run(true)).unwrap();
        assert!(report.dry_run);
        assert_eq!(report.processed, 1);
        assert!(catalog.get_descriptor(&ItemId::new("blue")).unwrap().is_none());
    }

    #[test]
    fn test_stale_descriptor_is_reextracted() {
        let dir = tempfile::tempdir().unwrap();
        let (service, catalog) = service();
        let path = write_png(dir.path(), "green.png", [0, 180, 0]);
        let id = ItemId::new("green");
        catalog
            .upsert_item(&CatalogItem::new("green", "Green").with_image_path(&path))
            .unwrap();
        let old = FeatureSpace::new(0, 64, 32);
        catalog
            .store_descriptor(&id, &DescriptorRecord::new(Descriptor::new(vec![0.0; 512]), old))
            .unwrap();

        let report = service.run(IngestOptions::new()).unwrap();
        assert_eq!(report.processed, 1);
        let record = catalog.get_descriptor(&id).unwrap().unwrap();
        assert!(record.is_in(&ExtractorConfig::default().feature_space()));
    }

    #[test]
    fn test_grid_change_reextracts_same_length_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "teal.png", [0, 128, 128]);
        let id = ItemId::new("teal");

        let (reference, catalog) = service();
        catalog
            .upsert_item(&CatalogItem::new("teal", "Teal").with_image_path(&path))
            .unwrap();
        assert_eq!(reference.run(IngestOptions::new()).unwrap().processed, 1);

        // Same feature size, different grid: the old descriptor must not
        // count as already indexed.
        let coarse = ExtractorConfig::default().with_grid_size(32);
        let rerun = IngestionService::new(
            catalog.clone(),
            Arc::new(DescriptorExtractor::new(coarse)),
        )
        .run(IngestOptions::new())
        .unwrap();
        assert_eq!(rerun.processed, 1);
        assert_eq!(rerun.already_indexed, 0);

        let record = catalog.get_descriptor(&id).unwrap().unwrap();
        assert_eq!(record.space, coarse.feature_space());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(IngestOutcome::SkippedNoImage.to_string(), "no image");
        assert_eq!(IngestOutcome::AlreadyIndexed.to_string(), "already extracted");
        assert_eq!(
            IngestOutcome::Failed("boom".to_string()).to_string(),
            "failed: boom"
        );
    }
}
