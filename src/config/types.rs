use serde::Deserialize;

/// Main configuration structure for Ripple-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    pub proxies: ProxyConfig,
    pub output: OutputConfig,
    pub pagination: PaginationConfig,
    pub seeds: SeedConfig,
    pub extract: ExtractConfig,
}

/// Fetch and scheduling behavior
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Attempts per logical fetch, each through a different proxy
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Timeout applied to every single attempt (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Upper bound on simultaneously outstanding requests for the whole run
    #[serde(rename = "max-concurrent-requests")]
    pub max_concurrent_requests: u32,

    /// Pages of one collection fetched concurrently
    #[serde(rename = "page-concurrency", default = "default_concurrency")]
    pub page_concurrency: u32,

    /// Items of one collection processed concurrently (1 = sequential)
    #[serde(rename = "item-concurrency", default = "default_concurrency")]
    pub item_concurrency: u32,
}

fn default_concurrency() -> u32 {
    1
}

/// User agent rotation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityConfig {
    /// Replaces the built-in browser user agents when non-empty
    #[serde(rename = "user-agents", default)]
    pub user_agents: Vec<String>,
}

/// Proxy list location
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Path to a file with one `host:port` or `host:port:user:password` per line
    pub path: String,

    /// Address requested through every proxy by `--check-proxies`
    #[serde(rename = "check-url", default = "default_check_url")]
    pub check_url: String,

    /// Timeout of a single proxy check (seconds)
    #[serde(rename = "check-timeout-secs", default = "default_check_timeout")]
    pub check_timeout_secs: u64,
}

fn default_check_url() -> String {
    "https://httpbin.org/ip".to_string()
}

fn default_check_timeout() -> u64 {
    10
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the JSON record store
    #[serde(rename = "store-path")]
    pub store_path: String,
}

/// How page addresses are discovered and synthesized
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    /// Selector whose last match is the "last page" link
    #[serde(rename = "last-page-selector")]
    pub last_page_selector: String,

    /// Hard cap on the number of pages planned for one collection
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Numbering used by listing pages
    #[serde(rename = "listing-numbering")]
    pub listing_numbering: PageNumbering,

    /// Numbering used by collection pages
    #[serde(rename = "collection-numbering")]
    pub collection_numbering: PageNumbering,
}

fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

/// Page cap applied when `max-pages` is not configured
pub const DEFAULT_MAX_PAGES: u32 = 1000;

/// Page-numbering URL convention of a site section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "style", rename_all = "kebab-case")]
pub enum PageNumbering {
    /// `https://site/reviews/item/` -> `https://site/reviews/item/2/`
    PathSuffix,

    /// `https://site/?q=x` -> `https://site/?q=x&page=2`
    QueryParam { name: String },
}

/// Crawl entry points
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedConfig {
    /// Paginated listing pages that enumerate collections
    #[serde(default)]
    pub listings: Vec<String>,

    /// Collection entry pages appended verbatim, without discovery
    #[serde(default)]
    pub collections: Vec<String>,
}

/// Selector-driven extraction
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractConfig {
    /// Links to collections on listing pages
    #[serde(rename = "collection-links")]
    pub collection_links: LinkSelector,

    /// Links to items on collection pages
    #[serde(rename = "item-links")]
    pub item_links: LinkSelector,

    /// Element that must exist on an item page for it to be recorded
    #[serde(default)]
    pub required: Option<String>,

    /// Named fields copied into each record
    #[serde(default)]
    pub fields: Vec<FieldSelector>,
}

/// A selector plus the attribute holding the link
#[derive(Debug, Clone, Deserialize)]
pub struct LinkSelector {
    pub selector: String,

    #[serde(default = "default_link_attr")]
    pub attr: String,
}

fn default_link_attr() -> String {
    "href".to_string()
}

/// One named record field
#[derive(Debug, Clone, Deserialize)]
pub struct FieldSelector {
    pub name: String,

    pub selector: String,

    /// Read this attribute instead of the element text
    #[serde(default)]
    pub attr: Option<String>,

    /// Parse the value as an integer, falling back to 0
    #[serde(default)]
    pub integer: bool,

    /// Remove this prefix from the text before trimming
    #[serde(rename = "strip-prefix", default)]
    pub strip_prefix: Option<String>,
}
