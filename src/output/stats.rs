//! Statistics from the record store and from a finished run
//!
//! This module provides functionality for extracting and displaying
//! store contents and run totals.

use crate::crawler::{ProxyCheck, RunSummary};
use crate::state::CollectionState;
use crate::storage::DedupStore;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Record store statistics summary
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    /// Location of the store file
    pub path: String,

    /// Number of stored records
    pub total_records: u64,

    pub created_at: DateTime<Utc>,

    /// Time of the last successful append
    pub last_update: DateTime<Utc>,

    /// Record count per source collection
    pub records_by_collection: BTreeMap<String, u64>,
}

/// Loads statistics from a store
///
/// # Arguments
///
/// * `store` - The loaded record store
pub fn load_statistics(store: &DedupStore) -> StoreStatistics {
    let stats = store.stats();

    let mut records_by_collection = BTreeMap::new();
    for record in store.records() {
        *records_by_collection
            .entry(record.source_collection.clone())
            .or_insert(0) += 1;
    }

    StoreStatistics {
        path: store.path().display().to_string(),
        total_records: stats.total_records,
        created_at: store.metadata().created_at,
        last_update: stats.last_update,
        records_by_collection,
    }
}

/// Prints store statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Record Store Statistics ===\n");

    println!("Overview:");
    println!("  Store: {}", stats.path);
    println!("  Total records: {}", stats.total_records);
    println!("  Created: {}", stats.created_at.to_rfc3339());
    println!("  Last update: {}", stats.last_update.to_rfc3339());
    println!();

    if stats.records_by_collection.is_empty() {
        return;
    }

    println!("Records by Collection ({}):", stats.records_by_collection.len());
    let mut counts: Vec<_> = stats.records_by_collection.iter().collect();
    counts.sort_by(|a, b| b.1.cmp(a.1));

    for (collection, count) in counts {
        let percentage = if stats.total_records > 0 {
            (*count as f64 / stats.total_records as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", collection, count, percentage);
    }
}

/// Prints the totals of a finished run
pub fn print_run_summary(summary: &RunSummary) {
    println!("=== Harvest Summary ===\n");

    println!("Collections:");
    println!("  Done: {}", summary.collections_done);
    println!("  Skipped: {}", summary.collections_skipped);
    println!(
        "  Pages failed: {} ({} on listings)",
        summary.pages_failed + summary.listing_pages_failed,
        summary.listing_pages_failed
    );
    println!();

    println!("Items:");
    println!("  Saved: {}", summary.items_saved);
    println!("  Already present: {}", summary.items_already_present);
    println!("  Failed (retried next run): {}", summary.items_failed);
    println!("  Rejected by extractor: {}", summary.items_rejected);
    println!("  Store write failures: {}", summary.store_write_failures);
    println!();

    let skipped: Vec<_> = summary
        .collections
        .iter()
        .filter(|report| report.state == CollectionState::Skipped)
        .collect();
    if !skipped.is_empty() {
        println!("Skipped Collections ({}):", skipped.len());
        for report in skipped {
            println!("  - {}", report.collection);
        }
        println!();
    }

    if let Some(stats) = &summary.store_stats {
        println!(
            "Store: {} records in {} (last update {})",
            stats.total_records,
            summary.store_path,
            stats.last_update.to_rfc3339()
        );
    }
}

/// Prints one line per checked proxy, working ones marked
pub fn print_proxy_report(checks: &[ProxyCheck]) {
    println!("=== Proxy Check ===\n");

    for check in checks {
        match &check.outcome {
            Ok(_) if check.is_working() => println!("  ✓ {}", check.endpoint),
            Ok(status) => println!("  ✗ {} (HTTP {})", check.endpoint, status),
            Err(reason) => println!("  ✗ {} ({})", check.endpoint, reason),
        }
    }

    let working = checks.iter().filter(|check| check.is_working()).count();
    println!("\nWorking: {} / {}", working, checks.len());
}
