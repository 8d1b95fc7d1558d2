//! Content extraction
//!
//! The coordinator never looks at markup itself. Everything site-specific
//! goes through an `Extractor`:
//! - Collection links on listing pages
//! - Item links on collection pages
//! - Record fields on item pages

mod html;

pub use crate::storage::Fields;
pub use html::SelectorExtractor;

/// Site-specific knowledge, kept out of the crawl loop
///
/// All methods are synchronous; parsed documents never live across an
/// await point.
pub trait Extractor: Send + Sync {
    /// Absolute addresses of the collections enumerated on a listing page
    fn extract_collection_links(&self, body: &str, page_url: &str) -> Vec<String>;

    /// Absolute, fragment-free addresses of the items on a collection page
    fn extract_item_links(&self, body: &str, page_url: &str) -> Vec<String>;

    /// Record fields of an item page, or `None` when the page is not an item
    fn extract_record(&self, body: &str) -> Option<Fields>;
}
