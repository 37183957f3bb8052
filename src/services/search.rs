//! Visual search service.
//!
//! Turns an uploaded image into a descriptor and ranks the active, indexed
//! catalog against it. Every failure is mapped into a
//! [`VisualSearchResponse`] instead of an error so callers can forward it
//! as-is.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::descriptor::{Extractor, SimilarityMatcher};
use crate::models::{
    Candidate, CatalogItem, Descriptor, ImageUpload, ItemId, PixelBuffer, ProductView,
    SearchMatch, VisualSearchResponse, round_score,
};
use crate::storage::CatalogBackend;
use crate::{Error, Result};

/// Client error for a request without an image.
pub const NO_IMAGE_PROVIDED: &str = "No image provided";

/// Client error for bytes that are not a decodable image.
pub const INVALID_IMAGE_FORMAT: &str = "Invalid image format";

/// Server error when the query image cannot be turned into a descriptor.
pub const COULD_NOT_PROCESS_IMAGE: &str = "Could not process image";

/// Marker separating a data-URL prefix from the base64 payload.
const BASE64_MARKER: &str = "base64,";

/// Ranked matches for one query descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedMatches {
    /// Number of candidates above the threshold, before truncation.
    pub matches_found: usize,
    /// Top matches, best first.
    pub results: Vec<SearchMatch>,
    /// Descriptors skipped because they come from another feature space.
    pub stale: usize,
}

/// Service answering visual queries.
#[derive(Clone)]
pub struct VisualSearchService {
    catalog: Arc<dyn CatalogBackend>,
    extractor: Arc<dyn Extractor>,
    matcher: SimilarityMatcher,
}

impl VisualSearchService {
    /// Creates a new search service.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogBackend>,
        extractor: Arc<dyn Extractor>,
        matcher: SimilarityMatcher,
    ) -> Self {
        Self {
            catalog,
            extractor,
            matcher,
        }
    }

    /// Returns the matcher used for ranking.
    #[must_use]
    pub const fn matcher(&self) -> &SimilarityMatcher {
        &self.matcher
    }

    /// Runs a query with the configured result limit.
    pub fn search(&self, upload: &ImageUpload) -> VisualSearchResponse {
        self.search_with_limit(upload, self.matcher.max_results())
    }

    /// Runs a query returning at most `limit` results.
    ///
    /// - missing upload: client error "No image provided"
    /// - bad base64 or undecodable bytes: client error "Invalid image format"
    /// - extraction failure: server error "Could not process image"
    /// - catalog read failure: server error with the cause
    #[tracing::instrument(skip(self, upload), fields(operation = "visual_search"))]
    pub fn search_with_limit(&self, upload: &ImageUpload, limit: usize) -> VisualSearchResponse {
        let start = Instant::now();
        let response = self.respond(upload, limit);

        let status = if response.success { "success" } else { "error" };
        metrics::counter!("visual_search_requests_total", "status" => status).increment(1);
        metrics::histogram!("visual_search_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        response
    }

    fn respond(&self, upload: &ImageUpload, limit: usize) -> VisualSearchResponse {
        if matches!(upload, ImageUpload::Missing) {
            tracing::debug!("Rejected query without image");
            return VisualSearchResponse::client_error(NO_IMAGE_PROVIDED);
        }
        let pixels = match decode_upload(upload) {
            Ok(pixels) => pixels,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected undecodable query image");
                return VisualSearchResponse::client_error(INVALID_IMAGE_FORMAT);
            },
        };

        let query = match self.extractor.extract(Some(&pixels)) {
            Ok(query) => query,
            Err(e) => {
                tracing::error!(error = %e, "Query descriptor extraction failed");
                return VisualSearchResponse::server_error(COULD_NOT_PROCESS_IMAGE);
            },
        };

        match self.rank_descriptor(&query, limit) {
            Ok(ranked) => VisualSearchResponse::ok(ranked.matches_found, ranked.results),
            Err(e) => {
                tracing::error!(error = %e, "Catalog read failed during query");
                VisualSearchResponse::server_error(e.to_string())
            },
        }
    }

    /// Ranks the active, indexed catalog against a query descriptor.
    ///
    /// Descriptors from another feature space are skipped and counted.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    pub fn rank_descriptor(&self, query: &Descriptor, limit: usize) -> Result<RankedMatches> {
        let space = self.extractor.feature_space();
        let indexed = self.catalog.indexed_items(true)?;

        let mut stale = 0;
        let mut items: HashMap<ItemId, CatalogItem> = HashMap::with_capacity(indexed.len());
        let mut candidates = Vec::with_capacity(indexed.len());
        for entry in indexed {
            let candidate = match entry.record {
                Some(record) if record.is_in(&space) => {
                    Candidate::new(entry.item.id.clone(), record.descriptor)
                },
                Some(_) => {
                    stale += 1;
                    Candidate::unindexed(entry.item.id.clone())
                },
                None => Candidate::unindexed(entry.item.id.clone()),
            };
            candidates.push(candidate);
            items.insert(entry.item.id.clone(), entry.item);
        }
        if stale > 0 {
            tracing::warn!(stale, %space, "Skipped descriptors from another feature space");
        }

        let mut matches = self.matcher.score_all(query, &candidates);
        let matches_found = matches.len();
        matches.truncate(limit);

        let results = matches
            .into_iter()
            .filter_map(|m| {
                items.get(&m.id).map(|item| SearchMatch {
                    product: ProductView::from(item),
                    similarity_score: round_score(m.score),
                })
            })
            .collect();

        tracing::debug!(
            candidates = candidates.len(),
            matches_found,
            stale,
            "Ranked catalog"
        );
        Ok(RankedMatches {
            matches_found,
            results,
            stale,
        })
    }
}

/// Decodes an upload into pixels.
///
/// Base64 payloads may carry a data-URL prefix; everything up to and
/// including the first `base64,` is dropped.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for a missing upload or bad base64, and
/// [`Error::ImageDecode`] for bytes that are not an image.
pub fn decode_upload(upload: &ImageUpload) -> Result<PixelBuffer> {
    match upload {
        ImageUpload::Missing => Err(Error::InvalidInput(NO_IMAGE_PROVIDED.to_string())),
        ImageUpload::Raw(bytes) => PixelBuffer::decode(bytes),
        ImageUpload::Base64(payload) => PixelBuffer::decode(&decode_base64(payload)?),
    }
}

/// Decodes a base64 payload, stripping any data-URL prefix.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the payload is not valid base64.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let data = payload
        .split_once(BASE64_MARKER)
        .map_or(payload, |(_, data)| data);
    STANDARD
        .decode(data.trim())
        .map_err(|e| Error::InvalidInput(format!("invalid base64 payload: {e}")))
}
