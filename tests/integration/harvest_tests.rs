//! End-to-end harvest runs against an in-memory site

use crate::support::{collection_page, coordinator, item_page, listing_page, url, FixtureSite};
use ripple_harvest::config::SeedConfig;
use ripple_harvest::state::CollectionState;
use ripple_harvest::storage::{DedupStore, Fields};
use serde_json::json;
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

fn collections(seeds: &[String]) -> SeedConfig {
    SeedConfig {
        listings: vec![],
        collections: seeds.to_vec(),
    }
}

/// Collection `/reviews/bank/` with pages `[a, b]` and `[b, c]`
fn bank_site() -> Arc<FixtureSite> {
    let site = FixtureSite::new();
    site.page(
        &url("/reviews/bank/"),
        collection_page(&["/review/a", "/review/b"], Some("/reviews/bank/2/")),
    );
    site.page(
        &url("/reviews/bank/2/"),
        collection_page(&["/review/b", "/review/c"], Some("/reviews/bank/2/")),
    );
    site.page(&url("/review/a"), item_page("alice", 5));
    site.page(&url("/review/b"), item_page("bob", 3));
    site.page(&url("/review/c"), item_page("carol", 1));
    site
}

fn identifiers(store: &DedupStore) -> Vec<String> {
    store
        .records()
        .iter()
        .map(|record| record.identifier.clone())
        .collect()
}

#[tokio::test]
async fn test_only_missing_items_are_fetched() {
    let dir = tempdir().unwrap();
    let store_path = dir.path().join("records.json");

    {
        let mut store = DedupStore::load(&store_path);
        store
            .append(&url("/reviews/bank/"), &url("/review/b"), Fields::new())
            .unwrap();
    }

    let site = bank_site();
    let coordinator = coordinator(site.clone(), &store_path, 1);

    let summary = coordinator
        .run(&collections(&[url("/reviews/bank/")]))
        .await;

    assert_eq!(site.hits(&url("/review/a")), 1);
    assert_eq!(site.hits(&url("/review/b")), 0);
    assert_eq!(site.hits(&url("/review/c")), 1);
    assert_eq!(site.hits(&url("/reviews/bank/")), 1);
    assert_eq!(site.hits(&url("/reviews/bank/2/")), 1);

    assert_eq!(summary.collections_done, 1);
    assert_eq!(summary.items_saved, 2);
    assert_eq!(summary.items_already_present, 1);
    assert_eq!(summary.store_stats.as_ref().unwrap().total_records, 3);

    let store = DedupStore::load(&store_path);
    assert_eq!(
        identifiers(&store),
        vec![url("/review/b"), url("/review/a"), url("/review/c")]
    );

    let a = &store.records()[1];
    assert_eq!(a.source_collection, url("/reviews/bank/"));
    assert_eq!(a.fields["author"], json!("alice"));
    assert_eq!(a.fields["rating"], json!(5));
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let dir = tempdir().unwrap();
    let store_path = dir.path().join("records.json");
    let seeds = collections(&[url("/reviews/bank/")]);

    let first = coordinator(bank_site(), &store_path, 2).run(&seeds).await;
    assert_eq!(first.items_saved, 3);
    let records_after_first = DedupStore::load(&store_path).records().to_vec();

    let site = bank_site();
    let second = coordinator(site.clone(), &store_path, 2).run(&seeds).await;

    assert_eq!(second.items_saved, 0);
    assert_eq!(second.items_already_present, 3);
    assert_eq!(site.hits(&url("/review/a")), 0);

    let store = DedupStore::load(&store_path);
    assert_eq!(store.stats().total_records, 3);
    assert_eq!(store.records(), records_after_first.as_slice());
}

#[tokio::test]
async fn test_concurrent_items_are_each_stored_once() {
    let dir = tempdir().unwrap();
    let store_path = dir.path().join("records.json");

    let site = FixtureSite::new();
    let items: Vec<String> = (0..12).map(|n| format!("/review/{}", n)).collect();
    let item_refs: Vec<&str> = items.iter().map(String::as_str).collect();
    site.page(&url("/reviews/telecom/"), collection_page(&item_refs, None));
    for item in &items {
        site.page(&url(item), item_page(item, 4));
    }

    let summary = coordinator(site.clone(), &store_path, 4)
        .run(&collections(&[url("/reviews/telecom/")]))
        .await;

    assert_eq!(summary.items_saved, 12);

    let store = DedupStore::load(&store_path);
    let stored: HashSet<String> = identifiers(&store).into_iter().collect();
    let expected: HashSet<String> = items.iter().map(|item| url(item)).collect();
    assert_eq!(stored, expected);
    assert_eq!(store.stats().total_records, 12);
}

#[tokio::test]
async fn test_unreachable_collection_is_skipped_and_run_continues() {
    let dir = tempdir().unwrap();
    let store_path = dir.path().join("records.json");

    let site = bank_site();
    site.status(&url("/reviews/broken/"), 503);

    let summary = coordinator(site.clone(), &store_path, 1)
        .run(&collections(&[url("/reviews/broken/"), url("/reviews/bank/")]))
        .await;

    assert_eq!(site.hits(&url("/reviews/broken/")), 2);
    assert_eq!(summary.collections_skipped, 1);
    assert_eq!(summary.collections_done, 1);
    assert_eq!(summary.collections[0].state, CollectionState::Skipped);
    assert_eq!(summary.collections[1].state, CollectionState::Done);
    assert_eq!(summary.items_saved, 3);
}

#[tokio::test]
async fn test_failed_page_is_skipped() {
    let dir = tempdir().unwrap();
    let store_path = dir.path().join("records.json");

    let site = bank_site();
    site.status(&url("/reviews/bank/2/"), 500);

    let summary = coordinator(site, &store_path, 1)
        .run(&collections(&[url("/reviews/bank/")]))
        .await;

    assert_eq!(summary.pages_failed, 1);
    assert_eq!(summary.collections_done, 1);
    assert_eq!(
        identifiers(&DedupStore::load(&store_path)),
        vec![url("/review/a"), url("/review/b")]
    );
}

#[tokio::test]
async fn test_failed_item_is_retried_next_run() {
    let dir = tempdir().unwrap();
    let store_path = dir.path().join("records.json");
    let seeds = collections(&[url("/reviews/bank/")]);

    let site = bank_site();
    site.status(&url("/review/c"), 502);

    let first = coordinator(site.clone(), &store_path, 1).run(&seeds).await;
    assert_eq!(first.items_saved, 2);
    assert_eq!(first.items_failed, 1);
    assert_eq!(site.hits(&url("/review/c")), 2);
    assert!(!DedupStore::load(&store_path).contains(&url("/review/c")));

    site.page(&url("/review/c"), item_page("carol", 1));
    let second = coordinator(site.clone(), &store_path, 1).run(&seeds).await;

    assert_eq!(second.items_saved, 1);
    assert_eq!(second.items_already_present, 2);
    assert!(DedupStore::load(&store_path).contains(&url("/review/c")));
}

#[tokio::test]
async fn test_non_item_page_is_rejected() {
    let dir = tempdir().unwrap();
    let store_path = dir.path().join("records.json");

    let site = bank_site();
    site.page(
        &url("/review/b"),
        "<html><body><h1>Captcha</h1></body></html>".to_string(),
    );

    let summary = coordinator(site, &store_path, 1)
        .run(&collections(&[url("/reviews/bank/")]))
        .await;

    assert_eq!(summary.items_rejected, 1);
    assert_eq!(summary.items_saved, 2);
    assert!(!DedupStore::load(&store_path).contains(&url("/review/b")));
}

#[tokio::test]
async fn test_discovery_walks_listing_pages_and_dedups() {
    let dir = tempdir().unwrap();
    let store_path = dir.path().join("records.json");

    let listing = url("/?official_products=Bank");
    let site = FixtureSite::new();
    site.page(
        &listing,
        listing_page(
            &["/reviews/bank/", "/reviews/telecom/"],
            Some("/?official_products=Bank&amp;page=2"),
        ),
    );
    site.page(
        &url("/?official_products=Bank&page=2"),
        listing_page(&["/reviews/telecom/", "/reviews/insurance/"], None),
    );

    let seeds = SeedConfig {
        listings: vec![listing],
        collections: vec![url("/reviews/bank/"), url("/reviews/manual/")],
    };

    let discovered = coordinator(site, &store_path, 1)
        .discover_collections(&seeds)
        .await;

    assert_eq!(
        discovered,
        vec![
            url("/reviews/bank/"),
            url("/reviews/telecom/"),
            url("/reviews/insurance/"),
            url("/reviews/manual/"),
        ]
    );
}

#[tokio::test]
async fn test_unavailable_listing_keeps_direct_collections() {
    let dir = tempdir().unwrap();
    let store_path = dir.path().join("records.json");

    let site = FixtureSite::new();
    let seeds = SeedConfig {
        listings: vec![url("/?official_products=Gone")],
        collections: vec![url("/reviews/bank/")],
    };

    let discovered = coordinator(site.clone(), &store_path, 1)
        .discover_collections(&seeds)
        .await;

    assert_eq!(discovered, vec![url("/reviews/bank/")]);
    assert_eq!(site.hits(&url("/?official_products=Gone")), 2);
}

#[tokio::test]
async fn test_unwritable_store_fails_the_run() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    let store_path = blocker.join("records.json");

    let summary = coordinator(bank_site(), &store_path, 1)
        .run(&collections(&[url("/reviews/bank/")]))
        .await;

    assert_eq!(summary.items_saved, 0);
    assert_eq!(summary.store_write_failures, 3);
    assert!(summary.all_writes_failed());
    assert!(summary.into_result().is_err());
}

#[tokio::test]
async fn test_empty_proxy_file_is_a_config_error() {
    use ripple_harvest::config::load_config;
    use ripple_harvest::crawler::Coordinator;
    use ripple_harvest::{ConfigError, HarvestError};

    let dir = tempdir().unwrap();
    let proxies = dir.path().join("proxies.txt");
    fs::write(&proxies, "# no usable lines\nnot-a-proxy\n").unwrap();

    let config_path = dir.path().join("harvest.toml");
    let config = format!(
        r#"
[crawler]
max-retries = 3
request-timeout-secs = 6
max-concurrent-requests = 10

[proxies]
path = "{}"

[output]
store-path = "{}"

[pagination]
last-page-selector = "div.pager a[href]"
listing-numbering = {{ style = "query-param", name = "page" }}
collection-numbering = {{ style = "path-suffix" }}

[seeds]
collections = ["https://site.test/reviews/bank/"]

[extract]
collection-links = {{ selector = "a.product-name" }}
item-links = {{ selector = "meta[itemprop=url]", attr = "content" }}
"#,
        proxies.display(),
        dir.path().join("records.json").display()
    );
    fs::write(&config_path, config).unwrap();

    let config = load_config(&config_path).unwrap();
    let result = Coordinator::from_config(&config);

    assert!(matches!(
        result,
        Err(HarvestError::Config(ConfigError::NoProxies(_)))
    ));
}
