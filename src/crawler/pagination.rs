//! Page planning for paginated collections
//!
//! The planner reads the "last page" link from an already fetched first page
//! and synthesizes every page address from the site's numbering convention.
//! It never performs I/O.

use crate::config::{PageNumbering, PaginationConfig, DEFAULT_MAX_PAGES};
use crate::ConfigError;
use scraper::{Html, Selector};
use url::Url;

/// One page of a collection scheduled for fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTask {
    pub collection_id: String,
    pub page_url: String,
    /// 1-based; page 1 is the collection entry page
    pub page_index: u32,
}

/// Turns a first page into the ordered list of page addresses
#[derive(Debug, Clone)]
pub struct PaginationPlanner {
    last_page: Selector,
    numbering: PageNumbering,
    max_pages: u32,
}

impl PaginationPlanner {
    pub fn new(last_page_selector: &str, numbering: PageNumbering) -> Result<Self, ConfigError> {
        let last_page =
            Selector::parse(last_page_selector).map_err(|e| ConfigError::InvalidSelector {
                selector: last_page_selector.to_string(),
                message: format!("{:?}", e),
            })?;

        Ok(Self {
            last_page,
            numbering,
            max_pages: DEFAULT_MAX_PAGES,
        })
    }

    /// Planner for listing pages as configured
    pub fn for_listings(config: &PaginationConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(&config.last_page_selector, config.listing_numbering.clone())?
            .with_max_pages(config.max_pages))
    }

    /// Planner for collection pages as configured
    pub fn for_collections(config: &PaginationConfig) -> Result<Self, ConfigError> {
        Ok(
            Self::new(&config.last_page_selector, config.collection_numbering.clone())?
                .with_max_pages(config.max_pages),
        )
    }

    /// Caps the planned page count; zero is treated as one
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Returns every page address of the collection, `base_url` first
    ///
    /// A missing, unparsable or `<= 1` last-page indicator yields `[base_url]`.
    pub fn plan(&self, first_page_body: &str, base_url: &str) -> Vec<String> {
        let Ok(base) = Url::parse(base_url) else {
            tracing::warn!(url = base_url, "Unparsable collection URL, treating as single page");
            return vec![base_url.to_string()];
        };

        let last_page = match self.last_page_index(first_page_body, &base) {
            Some(n) if n > 1 => n,
            _ => return vec![base_url.to_string()],
        };

        // The pager is remote input; never size anything from it directly
        let last_page = if last_page > self.max_pages {
            tracing::warn!(
                url = base_url,
                last_page,
                max_pages = self.max_pages,
                "Page count exceeds max-pages, truncating"
            );
            self.max_pages
        } else {
            last_page
        };

        let mut pages = vec![base_url.to_string()];
        pages.extend((2..=last_page).map(|page| self.page_url(&base, page)));
        pages
    }

    /// Same as `plan`, with each address wrapped in a `PageTask`
    pub fn tasks(&self, collection_id: &str, first_page_body: &str, base_url: &str) -> Vec<PageTask> {
        self.plan(first_page_body, base_url)
            .into_iter()
            .zip(1u32..)
            .map(|(page_url, page_index)| PageTask {
                collection_id: collection_id.to_string(),
                page_url,
                page_index,
            })
            .collect()
    }

    /// Reads the last page number from the pager, if any
    fn last_page_index(&self, body: &str, base: &Url) -> Option<u32> {
        let document = Html::parse_document(body);

        let href = document
            .select(&self.last_page)
            .filter_map(|element| element.value().attr("href"))
            .last()?;

        let link = base.join(href.trim()).ok()?;

        match &self.numbering {
            PageNumbering::PathSuffix => link
                .path_segments()?
                .filter(|segment| !segment.is_empty())
                .last()?
                .parse()
                .ok(),
            PageNumbering::QueryParam { name } => link
                .query_pairs()
                .find(|(key, _)| key == name)
                .and_then(|(_, value)| value.parse().ok()),
        }
    }

    /// Synthesizes the address of page `page` from the numbering template
    fn page_url(&self, base: &Url, page: u32) -> String {
        let mut url = base.clone();

        match &self.numbering {
            PageNumbering::PathSuffix => {
                let mut path = url.path().to_string();
                if !path.ends_with('/') {
                    path.push('/');
                }
                path.push_str(&format!("{}/", page));
                url.set_path(&path);
            }
            PageNumbering::QueryParam { name } => {
                let kept: Vec<(String, String)> = base
                    .query_pairs()
                    .filter(|(key, _)| key != name)
                    .map(|(key, value)| (key.into_owned(), value.into_owned()))
                    .collect();
                url.query_pairs_mut()
                    .clear()
                    .extend_pairs(kept)
                    .append_pair(name, &page.to_string());
            }
        }

        url.to_string()
    }
}
