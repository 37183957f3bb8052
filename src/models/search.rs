//! Query payloads and responses.

use serde::{Serialize, Serializer};

use super::{CatalogItem, ItemId};

/// An image supplied by a client for a visual query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageUpload {
    /// Encoded image file bytes (multipart upload).
    Raw(Vec<u8>),
    /// Base64 payload, optionally prefixed with a data URL such as
    /// `data:image/png;base64,`.
    Base64(String),
    /// No image was attached to the request.
    Missing,
}

/// Outcome class of a query response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// The query ran; results may be empty.
    Ok,
    /// The request was unusable (missing or undecodable image).
    ClientError,
    /// An internal fault prevented the query from running.
    ServerError,
}

impl ResponseStatus {
    /// Equivalent HTTP status code.
    #[must_use]
    pub const fn http_code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::ClientError => 400,
            Self::ServerError => 500,
        }
    }
}

/// Catalog fields echoed for each match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductView {
    /// Item identifier.
    pub id: ItemId,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Price as a decimal string.
    pub price: String,
    /// Category name.
    pub category: String,
    /// Brand name.
    pub brand: String,
    /// Public image URL.
    pub image_url: Option<String>,
    /// Units in stock.
    pub stock: u32,
}

impl From<&CatalogItem> for ProductView {
    fn from(item: &CatalogItem) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            description: item.description.clone(),
            price: item.price.clone(),
            category: item.category.clone(),
            brand: item.brand.clone(),
            image_url: item.image_url.clone(),
            stock: item.stock,
        }
    }
}

/// One ranked match in a query response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchMatch {
    /// The matching product.
    pub product: ProductView,
    /// Similarity rounded to 4 decimal places.
    pub similarity_score: f64,
}

/// Structured response for a visual query.
///
/// Serializes as `{success, matches_found, results}` when the query ran,
/// with `results` present even when empty, and as `{success, error}`
/// otherwise. `status` is not serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualSearchResponse {
    /// Outcome class; use [`ResponseStatus::http_code`].
    pub status: ResponseStatus,
    /// Whether the query ran.
    pub success: bool,
    /// Number of items above the threshold, before truncation.
    pub matches_found: Option<usize>,
    /// Top matches, best first.
    pub results: Vec<SearchMatch>,
    /// Error message for failed queries.
    pub error: Option<String>,
}

/// Wire shape of [`VisualSearchResponse`].
#[derive(Serialize)]
struct ResponseBody<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    matches_found: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<&'a [SearchMatch]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl Serialize for VisualSearchResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ResponseBody {
            success: self.success,
            matches_found: self.matches_found,
            results: self.success.then_some(self.results.as_slice()),
            error: self.error.as_deref(),
        }
        .serialize(serializer)
    }
}

impl VisualSearchResponse {
    /// Builds a successful response.
    #[must_use]
    pub const fn ok(matches_found: usize, results: Vec<SearchMatch>) -> Self {
        Self {
            status: ResponseStatus::Ok,
            success: true,
            matches_found: Some(matches_found),
            results,
            error: None,
        }
    }

    /// Builds a client-error response.
    #[must_use]
    pub fn client_error(message: impl Into<String>) -> Self {
        Self::failure(ResponseStatus::ClientError, message)
    }

    /// Builds a server-error response.
    #[must_use]
    pub fn server_error(message: impl Into<String>) -> Self {
        Self::failure(ResponseStatus::ServerError, message)
    }

    fn failure(status: ResponseStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            success: false,
            matches_found: None,
            results: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Rounds a similarity score to 4 decimal places for presentation.
#[must_use]
pub fn round_score(score: f32) -> f64 {
    (f64::from(score) * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_score() {
        assert!((round_score(0.123_456) - 0.1235).abs() < 1e-12);
        assert!((round_score(1.0) - 1.0).abs() < 1e-12);
        assert!((round_score(-0.999_99) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_http_codes() {
        assert_eq!(ResponseStatus::Ok.http_code(), 200);
        assert_eq!(ResponseStatus::ClientError.http_code(), 400);
        assert_eq!(ResponseStatus::ServerError.http_code(), 500);
    }

    #[test]
    fn test_error_response_serialization() {
        let response = VisualSearchResponse::client_error("No image provided");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "No image provided");
        assert!(json.get("results").is_none());
        assert!(json.get("status").is_none());
    }

    #[test]
    fn test_ok_response_serialization() {
        let item = CatalogItem::new("sku-7", "Mug").with_price("8.00");
        let response = VisualSearchResponse::ok(
            3,
            vec![SearchMatch {
                product: ProductView::from(&item),
                similarity_score: 0.9876,
            }],
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["matches_found"], 3);
        assert_eq!(json["results"][0]["product"]["id"], "sku-7");
        assert_eq!(json["results"][0]["product"]["price"], "8.00");
        assert_eq!(json["results"][0]["similarity_score"], 0.9876);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_empty_ok_response_keeps_results() {
        let json = serde_json::to_value(VisualSearchResponse::ok(0, Vec::new())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": true, "matches_found": 0, "results": []})
        );
    }
}
