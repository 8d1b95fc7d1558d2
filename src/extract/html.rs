//! CSS selector driven extractor
//!
//! Link rules:
//! - The configured attribute is read from every matching element
//! - `javascript:`, `mailto:`, `tel:` and `data:` values are skipped
//! - Fragment-only values are skipped
//! - Values are resolved against the page address and lose their fragment
//! - Only HTTP(S) results are kept

use super::{Extractor, Fields};
use crate::config::{ExtractConfig, FieldSelector, LinkSelector};
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use url::Url;

#[derive(Debug, Clone)]
struct CompiledLink {
    selector: Selector,
    attr: String,
}

#[derive(Debug, Clone)]
struct CompiledField {
    name: String,
    selector: Selector,
    attr: Option<String>,
    integer: bool,
    strip_prefix: Option<String>,
}

/// Extractor built from the `[extract]` configuration section
#[derive(Debug, Clone)]
pub struct SelectorExtractor {
    collection_links: CompiledLink,
    item_links: CompiledLink,
    required: Option<Selector>,
    fields: Vec<CompiledField>,
}

impl SelectorExtractor {
    /// Compiles every selector of the configuration
    ///
    /// # Returns
    ///
    /// * `Ok(SelectorExtractor)` - All selectors compiled
    /// * `Err(ConfigError::InvalidSelector)` - The first selector that did not
    pub fn from_config(config: &ExtractConfig) -> Result<Self, ConfigError> {
        let required = config.required.as_deref().map(compile).transpose()?;

        let fields = config
            .fields
            .iter()
            .map(compile_field)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            collection_links: compile_link(&config.collection_links)?,
            item_links: compile_link(&config.item_links)?,
            required,
            fields,
        })
    }

    fn links(&self, link: &CompiledLink, body: &str, page_url: &str) -> Vec<String> {
        let Ok(base) = Url::parse(page_url) else {
            tracing::warn!(url = page_url, "Unparsable page URL, no links extracted");
            return Vec::new();
        };

        let document = Html::parse_document(body);

        document
            .select(&link.selector)
            .filter_map(|element| element.value().attr(&link.attr))
            .filter_map(|value| resolve_link(value, &base))
            .collect()
    }
}

impl Extractor for SelectorExtractor {
    fn extract_collection_links(&self, body: &str, page_url: &str) -> Vec<String> {
        self.links(&self.collection_links, body, page_url)
    }

    fn extract_item_links(&self, body: &str, page_url: &str) -> Vec<String> {
        self.links(&self.item_links, body, page_url)
    }

    fn extract_record(&self, body: &str) -> Option<Fields> {
        let document = Html::parse_document(body);

        if let Some(required) = &self.required {
            document.select(required).next()?;
        }

        let fields = self
            .fields
            .iter()
            .map(|field| {
                let raw = document.select(&field.selector).next().and_then(|element| {
                    read_value(element, field.attr.as_deref(), field.strip_prefix.as_deref())
                });
                (field.name.clone(), to_value(raw, field.integer))
            })
            .collect();

        Some(fields)
    }
}

fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

fn compile_link(link: &LinkSelector) -> Result<CompiledLink, ConfigError> {
    Ok(CompiledLink {
        selector: compile(&link.selector)?,
        attr: link.attr.clone(),
    })
}

fn compile_field(field: &FieldSelector) -> Result<CompiledField, ConfigError> {
    Ok(CompiledField {
        name: field.name.clone(),
        selector: compile(&field.selector)?,
        attr: field.attr.clone(),
        integer: field.integer,
        strip_prefix: field.strip_prefix.clone(),
    })
}

/// Text or attribute value of an element, prefix removed and trimmed
fn read_value(element: ElementRef<'_>, attr: Option<&str>, strip_prefix: Option<&str>) -> Option<String> {
    let raw = match attr {
        Some(attr) => element.value().attr(attr)?.to_string(),
        None => element.text().collect::<String>(),
    };

    let trimmed = raw.trim();
    let value = strip_prefix
        .and_then(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed);

    Some(value.trim().to_string())
}

fn to_value(raw: Option<String>, integer: bool) -> Value {
    match (raw, integer) {
        (Some(text), true) => Value::from(text.parse::<i64>().unwrap_or(0)),
        (None, true) => Value::from(0),
        (Some(text), false) => Value::String(text),
        (None, false) => Value::Null,
    }
}

/// Resolves a link value to an absolute, fragment-free HTTP(S) address
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }

    absolute_url.set_fragment(None);
    Some(absolute_url.to_string())
}
