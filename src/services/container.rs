//! Service container.
//!
//! Builds one catalog backend and one extractor from configuration and hands
//! out services that share them.

use std::path::Path;
use std::sync::Arc;

use crate::config::GlimpseConfig;
use crate::descriptor::{DescriptorExtractor, Extractor, SimilarityMatcher};
use crate::storage::{CatalogBackend, SqliteCatalogBackend};
use crate::Result;

use super::{CatalogService, IngestionService, VisualSearchService};

/// Shared backends and the services built on them.
#[derive(Clone)]
pub struct ServiceContainer {
    catalog: Arc<dyn CatalogBackend>,
    extractor: Arc<dyn Extractor>,
    matcher: SimilarityMatcher,
}

impl ServiceContainer {
    /// Opens the catalog database named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the database
    /// cannot be opened.
    pub fn open(config: &GlimpseConfig) -> Result<Self> {
        Self::open_at(config, &config.db_path())
    }

    /// Opens a catalog database at an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the database
    /// cannot be opened.
    pub fn open_at(config: &GlimpseConfig, db_path: &Path) -> Result<Self> {
        config.validate()?;
        let catalog = SqliteCatalogBackend::new(db_path, config.search.feature_size)?;
        tracing::debug!(db_path = %db_path.display(), "Opened catalog");
        Self::with_backend(config, Arc::new(catalog))
    }

    /// Creates a container over an in-memory catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn in_memory(config: &GlimpseConfig) -> Result<Self> {
        config.validate()?;
        let catalog = SqliteCatalogBackend::in_memory(config.search.feature_size)?;
        Self::with_backend(config, Arc::new(catalog))
    }

    /// Creates a container over an existing backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the extractor settings are invalid.
    pub fn with_backend(config: &GlimpseConfig, catalog: Arc<dyn CatalogBackend>) -> Result<Self> {
        let extractor = DescriptorExtractor::try_new(config.extractor_config())?;
        Ok(Self {
            catalog,
            extractor: Arc::new(extractor),
            matcher: SimilarityMatcher::from(&config.search),
        })
    }

    /// Returns the catalog backend.
    #[must_use]
    pub fn catalog_backend(&self) -> Arc<dyn CatalogBackend> {
        Arc::clone(&self.catalog)
    }

    /// Returns the descriptor extractor.
    #[must_use]
    pub fn extractor(&self) -> Arc<dyn Extractor> {
        Arc::clone(&self.extractor)
    }

    /// Returns a catalog service.
    #[must_use]
    pub fn catalog(&self) -> CatalogService {
        CatalogService::new(self.catalog_backend(), self.extractor.feature_space())
    }

    /// Returns an ingestion service.
    #[must_use]
    pub fn ingestion(&self) -> IngestionService {
        IngestionService::new(self.catalog_backend(), self.extractor())
    }

    /// Returns a visual search service.
    #[must_use]
    pub fn search(&self) -> VisualSearchService {
        VisualSearchService::new(self.catalog_backend(), self.extractor(), self.matcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CatalogItem;

    #[test]
    fn test_open_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = GlimpseConfig::default().with_data_dir(dir.path().join("data"));

        let services = ServiceContainer::open(&config).unwrap();
        services
            .catalog()
            .add_item(&CatalogItem::new("sku-1", "Mug"))
            .unwrap();
        assert!(config.db_path().exists());

        let reopened = ServiceContainer::open(&config).unwrap();
        assert_eq!(reopened.catalog().status().unwrap().total, 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = GlimpseConfig::default();
        config.search.feature_size = 0;
        assert!(ServiceContainer::in_memory(&config).is_err());
    }

    #[test]
    fn test_services_share_settings() {
        let mut config = GlimpseConfig::default();
        config.search.threshold = 0.5;
        config.search.max_results = 3;
        let services = ServiceContainer::in_memory(&config).unwrap();

        let search = services.search();
        let matcher = search.matcher();
        assert!((matcher.threshold() - 0.5).abs() < f32::EPSILON);
        assert_eq!(matcher.max_results(), 3);
        assert_eq!(services.extractor().feature_size(), 512);
    }
}
