//! Shared fixtures: an in-memory site and coordinator builders

use async_trait::async_trait;
use ripple_harvest::config::{ExtractConfig, FieldSelector, LinkSelector, PageNumbering};
use ripple_harvest::crawler::{
    Coordinator, FailureReason, FetchRequest, FetchSettings, Fetcher, HarvestOptions,
    IdentityPool, PaginationPlanner, ProxyEndpoint, ProxyPool, RawResponse, Scheduler, Transport,
};
use ripple_harvest::extract::SelectorExtractor;
use ripple_harvest::storage::DedupStore;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SITE: &str = "https://site.test";

/// Serves canned responses by URL and counts requests; unknown URLs are 404
#[derive(Default)]
pub struct FixtureSite {
    pages: Mutex<HashMap<String, (u16, String)>>,
    hits: Mutex<HashMap<String, usize>>,
}

impl FixtureSite {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn page(&self, url: &str, body: String) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), (200, body));
    }

    pub fn status(&self, url: &str, status: u16) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, String::new()));
    }

    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Transport for FixtureSite {
    async fn send(
        &self,
        request: &FetchRequest,
        _proxy: &ProxyEndpoint,
    ) -> Result<RawResponse, FailureReason> {
        *self
            .hits
            .lock()
            .unwrap()
            .entry(request.url.clone())
            .or_insert(0) += 1;

        let page = self.pages.lock().unwrap().get(&request.url).cloned();
        Ok(match page {
            Some((status_code, body)) => RawResponse { status_code, body },
            None => RawResponse {
                status_code: 404,
                body: String::new(),
            },
        })
    }
}

pub fn url(path: &str) -> String {
    format!("{}{}", SITE, path)
}

/// Collection page listing `items`, with a pager pointing at `last_page`
pub fn collection_page(items: &[&str], last_page: Option<&str>) -> String {
    let reviews: String = items
        .iter()
        .map(|item| {
            format!(
                r#"<div itemprop="review"><meta itemprop="url" content="{}"></div>"#,
                url(item)
            )
        })
        .collect();
    let pager = last_page
        .map(|href| format!(r#"<div class="pager"><a href="{}">last</a></div>"#, href))
        .unwrap_or_default();
    format!("<html><body>{}{}</body></html>", reviews, pager)
}

/// Listing page enumerating `collections`, with a pager pointing at `last_page`
pub fn listing_page(collections: &[&str], last_page: Option<&str>) -> String {
    let links: String = collections
        .iter()
        .map(|path| format!(r#"<a class="product-name" href="{}">x</a>"#, path))
        .collect();
    let pager = last_page
        .map(|href| format!(r#"<div class="pager"><a href="{}">last</a></div>"#, href))
        .unwrap_or_default();
    format!("<html><body>{}{}</body></html>", links, pager)
}

pub fn item_page(author: &str, rating: u8) -> String {
    format!(
        r#"<html><body><div class="review-body">
            <span class="author">{}</span>
            <meta itemprop="ratingValue" content="{}">
        </div></body></html>"#,
        author, rating
    )
}

pub fn extract_config() -> ExtractConfig {
    ExtractConfig {
        collection_links: LinkSelector {
            selector: "a.product-name".to_string(),
            attr: "href".to_string(),
        },
        item_links: LinkSelector {
            selector: "div[itemprop=review] meta[itemprop=url]".to_string(),
            attr: "content".to_string(),
        },
        required: Some("div.review-body".to_string()),
        fields: vec![
            FieldSelector {
                name: "author".to_string(),
                selector: "span.author".to_string(),
                attr: None,
                integer: false,
                strip_prefix: None,
            },
            FieldSelector {
                name: "rating".to_string(),
                selector: "meta[itemprop=ratingValue]".to_string(),
                attr: Some("content".to_string()),
                integer: true,
                strip_prefix: None,
            },
        ],
    }
}

pub fn coordinator(site: Arc<FixtureSite>, store_path: &Path, item_concurrency: usize) -> Coordinator {
    let pool = ProxyPool::from_lines("10.0.0.1:8080\n10.0.0.2:8080\n", "fixture").unwrap();
    let fetcher = Fetcher::new(
        Arc::new(pool),
        site,
        IdentityPool::default(),
        FetchSettings {
            max_retries: 2,
            timeout: Duration::from_secs(1),
            max_concurrent_requests: 4,
        },
    );

    let options = HarvestOptions {
        listing_planner: PaginationPlanner::new(
            "div.pager a[href]",
            PageNumbering::QueryParam {
                name: "page".to_string(),
            },
        )
        .unwrap(),
        collection_planner: PaginationPlanner::new("div.pager a[href]", PageNumbering::PathSuffix)
            .unwrap(),
        page_scheduler: Scheduler::concurrent(2),
        item_scheduler: Scheduler::concurrent(item_concurrency),
    };

    Coordinator::new(
        fetcher,
        Arc::new(SelectorExtractor::from_config(&extract_config()).unwrap()),
        DedupStore::load(store_path).into_shared(),
        options,
    )
}
