//! Harvest coordinator - main orchestration logic
//!
//! This module drives a run from seeds to stored records:
//! - Discovering collections from paginated listing pages
//! - Planning and fetching the pages of every collection
//! - Extracting item links and skipping those already stored
//! - Fetching items, extracting records and appending them to the store
//!
//! A collection whose entry page cannot be fetched is skipped; nothing that
//! happens to one collection stops the run.

use crate::config::{Config, SeedConfig};
use crate::crawler::fetcher::{FetchOutcome, FetchSettings, Fetcher, HttpTransport};
use crate::crawler::identity::IdentityPool;
use crate::crawler::pagination::PaginationPlanner;
use crate::crawler::proxy::ProxyPool;
use crate::crawler::scheduler::Scheduler;
use crate::extract::{Extractor, SelectorExtractor};
use crate::state::CollectionState;
use crate::storage::{DedupStore, SharedStore, StoreStats};
use crate::{ConfigError, HarvestError};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, MutexGuard};

/// Planners and concurrency limits of a run
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub listing_planner: PaginationPlanner,
    pub collection_planner: PaginationPlanner,
    pub page_scheduler: Scheduler,
    pub item_scheduler: Scheduler,
}

impl HarvestOptions {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            listing_planner: PaginationPlanner::for_listings(&config.pagination)?,
            collection_planner: PaginationPlanner::for_collections(&config.pagination)?,
            page_scheduler: Scheduler::concurrent(config.crawler.page_concurrency as usize),
            item_scheduler: Scheduler::concurrent(config.crawler.item_concurrency as usize),
        })
    }
}

/// What happened to a single item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Saved,
    AlreadyPresent,
    FetchFailed,
    Rejected,
    WriteFailed,
}

/// Progress and counters of one collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionReport {
    pub collection: String,
    pub state: CollectionState,
    pub pages_planned: usize,
    pub pages_failed: usize,
    pub items_found: usize,
    pub items_saved: usize,
    pub items_already_present: usize,
    pub items_failed: usize,
    pub items_rejected: usize,
    pub store_write_failures: u64,
}

impl CollectionReport {
    fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            state: CollectionState::Discovering,
            pages_planned: 0,
            pages_failed: 0,
            items_found: 0,
            items_saved: 0,
            items_already_present: 0,
            items_failed: 0,
            items_rejected: 0,
            store_write_failures: 0,
        }
    }

    /// Moves the collection to `to`, rejecting out-of-order stages
    fn transition(&mut self, to: CollectionState) -> crate::Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(HarvestError::InvalidTransition {
                collection: self.collection.clone(),
                from: self.state,
                to,
            });
        }

        tracing::debug!(
            collection = %self.collection,
            from = %self.state,
            to = %to,
            "Collection stage"
        );
        self.state = to;
        Ok(())
    }

    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Saved => self.items_saved += 1,
            ItemOutcome::AlreadyPresent => self.items_already_present += 1,
            ItemOutcome::FetchFailed => self.items_failed += 1,
            ItemOutcome::Rejected => self.items_rejected += 1,
            ItemOutcome::WriteFailed => self.store_write_failures += 1,
        }
    }
}

/// Totals of a whole run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub collections_done: usize,
    pub collections_skipped: usize,
    pub listing_pages_failed: usize,
    pub pages_failed: usize,
    pub items_saved: usize,
    pub items_already_present: usize,
    pub items_failed: usize,
    pub items_rejected: usize,
    pub store_write_failures: u64,
    pub store_path: String,
    pub store_stats: Option<StoreStats>,
    pub collections: Vec<CollectionReport>,
}

impl RunSummary {
    fn add(&mut self, report: CollectionReport) {
        match report.state {
            CollectionState::Done => self.collections_done += 1,
            _ => self.collections_skipped += 1,
        }
        self.pages_failed += report.pages_failed;
        self.items_saved += report.items_saved;
        self.items_already_present += report.items_already_present;
        self.items_failed += report.items_failed;
        self.items_rejected += report.items_rejected;
        self.store_write_failures += report.store_write_failures;
        self.collections.push(report);
    }

    /// True when writes were attempted and none of them succeeded
    pub fn all_writes_failed(&self) -> bool {
        self.store_write_failures > 0 && self.items_saved == 0
    }

    /// Turns a run in which no record could be written into an error
    pub fn into_result(self) -> crate::Result<Self> {
        if self.all_writes_failed() {
            return Err(HarvestError::StoreUnwritable {
                path: self.store_path,
                failures: self.store_write_failures,
            });
        }
        Ok(self)
    }
}

/// Main harvest coordinator structure
pub struct Coordinator {
    fetcher: Fetcher,
    extractor: Arc<dyn Extractor>,
    store: SharedStore,
    options: HarvestOptions,
}

impl Coordinator {
    /// Creates a coordinator from already built collaborators
    pub fn new(
        fetcher: Fetcher,
        extractor: Arc<dyn Extractor>,
        store: SharedStore,
        options: HarvestOptions,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            store,
            options,
        }
    }

    /// Builds every collaborator from the configuration
    ///
    /// # Arguments
    ///
    /// * `config` - A validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(HarvestError)` - Proxy file unreadable or empty, a selector
    ///   failed to compile, or an HTTP client could not be built
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let pool = Arc::new(ProxyPool::load(Path::new(&config.proxies.path))?);
        tracing::info!(
            proxies = pool.len(),
            path = %config.proxies.path,
            "Loaded proxy pool"
        );

        let transport = Arc::new(HttpTransport::new(&pool)?);
        let identities = IdentityPool::new(config.identity.user_agents.clone());
        let fetcher = Fetcher::new(
            pool,
            transport,
            identities,
            FetchSettings::from(&config.crawler),
        );

        let extractor = Arc::new(SelectorExtractor::from_config(&config.extract)?);
        let options = HarvestOptions::from_config(config)?;
        let store = DedupStore::load(&config.output.store_path).into_shared();

        Ok(Self::new(fetcher, extractor, store, options))
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Expands listing seeds into collection addresses
    ///
    /// Direct collection seeds are appended verbatim. The result holds every
    /// address once, in first-seen order.
    pub async fn discover_collections(&self, seeds: &SeedConfig) -> Vec<String> {
        self.discover(seeds).await.0
    }

    async fn discover(&self, seeds: &SeedConfig) -> (Vec<String>, usize) {
        let mut collections = Vec::new();
        let mut pages_failed = 0;

        for listing in &seeds.listings {
            let body = match self.fetcher.get(listing).await {
                FetchOutcome::Success { body, .. } => body,
                FetchOutcome::Failure { reason, attempts } => {
                    tracing::warn!(
                        url = %listing,
                        attempts,
                        reason = %reason,
                        "Listing unavailable, skipping"
                    );
                    pages_failed += 1;
                    continue;
                }
            };

            let pages = self.options.listing_planner.plan(&body, listing);
            tracing::info!(url = %listing, pages = pages.len(), "Discovering collections");

            collections.extend(self.extractor.extract_collection_links(&body, listing));

            let mut fetched = self
                .options
                .page_scheduler
                .map_bounded(pages.into_iter().enumerate().skip(1), |(index, page)| async move {
                    let outcome = self.fetcher.get(&page).await;
                    (index, page, outcome)
                })
                .await;
            fetched.sort_by_key(|(index, _, _)| *index);

            for (_, page, outcome) in fetched {
                match outcome {
                    FetchOutcome::Success { body, .. } => {
                        collections.extend(self.extractor.extract_collection_links(&body, &page));
                    }
                    FetchOutcome::Failure { reason, .. } => {
                        tracing::warn!(url = %page, reason = %reason, "Listing page failed, skipping");
                        pages_failed += 1;
                    }
                }
            }
        }

        collections.extend(seeds.collections.iter().cloned());

        let mut seen = HashSet::new();
        collections.retain(|collection| seen.insert(collection.clone()));

        tracing::info!(collections = collections.len(), "Collection discovery finished");
        (collections, pages_failed)
    }

    /// Runs a complete harvest over the seeds
    ///
    /// Collections are processed one after another; pages and items within
    /// a collection use the configured concurrency.
    pub async fn run(&self, seeds: &SeedConfig) -> RunSummary {
        let start_time = std::time::Instant::now();
        tracing::info!(
            listings = seeds.listings.len(),
            collections = seeds.collections.len(),
            "Starting harvest"
        );

        let (collections, listing_pages_failed) = self.discover(seeds).await;

        let mut summary = RunSummary {
            listing_pages_failed,
            ..RunSummary::default()
        };

        let total = collections.len();
        for (position, collection) in collections.iter().enumerate() {
            tracing::info!(
                collection = %collection,
                "Harvesting collection {}/{}",
                position + 1,
                total
            );
            summary.add(self.harvest_collection(collection).await);
        }

        {
            let store = self.lock_store();
            summary.store_path = store.path().display().to_string();
            summary.store_stats = Some(store.stats());
        }

        tracing::info!(
            done = summary.collections_done,
            skipped = summary.collections_skipped,
            saved = summary.items_saved,
            already_present = summary.items_already_present,
            failed = summary.items_failed,
            rejected = summary.items_rejected,
            write_failures = summary.store_write_failures,
            "Harvest completed in {:?}",
            start_time.elapsed()
        );

        summary
    }

    /// Walks one collection through every stage
    async fn harvest_collection(&self, collection: &str) -> CollectionReport {
        let mut report = CollectionReport::new(collection);

        if let Err(e) = self.walk_collection(&mut report).await {
            tracing::error!(collection, error = %e, "Collection aborted");
            report.state = CollectionState::Skipped;
        }

        report
    }

    async fn walk_collection(&self, report: &mut CollectionReport) -> crate::Result<()> {
        let collection = report.collection.clone();

        let entry = match self.fetcher.get(&collection).await {
            FetchOutcome::Success { body, .. } => body,
            FetchOutcome::Failure { reason, attempts } => {
                tracing::warn!(
                    collection = %collection,
                    attempts,
                    reason = %reason,
                    "Entry page unavailable, skipping collection"
                );
                return report.transition(CollectionState::Skipped);
            }
        };

        report.transition(CollectionState::Paginating)?;
        let tasks = self
            .options
            .collection_planner
            .tasks(&collection, &entry, &collection);
        report.pages_planned = tasks.len();

        report.transition(CollectionState::FetchingPages)?;
        let mut pages = vec![(1u32, collection.clone(), entry)];
        let fetched = self
            .options
            .page_scheduler
            .map_bounded(tasks.into_iter().skip(1), |task| async move {
                let outcome = self.fetcher.get(&task.page_url).await;
                (task, outcome)
            })
            .await;

        for (task, outcome) in fetched {
            match outcome {
                FetchOutcome::Success { body, .. } => {
                    pages.push((task.page_index, task.page_url, body))
                }
                FetchOutcome::Failure { reason, .. } => {
                    tracing::warn!(
                        collection = %collection,
                        url = %task.page_url,
                        page = task.page_index,
                        reason = %reason,
                        "Page failed, skipping"
                    );
                    report.pages_failed += 1;
                }
            }
        }
        pages.sort_by_key(|(index, _, _)| *index);

        report.transition(CollectionState::ExtractingItems)?;
        let mut seen = HashSet::new();
        let items: Vec<String> = pages
            .iter()
            .flat_map(|(_, page_url, body)| self.extractor.extract_item_links(body, page_url))
            .filter(|link| seen.insert(link.clone()))
            .collect();
        report.items_found = items.len();

        let (present, pending): (Vec<String>, Vec<String>) = {
            let store = self.lock_store();
            items.into_iter().partition(|item| store.contains(item))
        };
        for item in &present {
            tracing::debug!(collection = %collection, url = %item, "Already processed");
        }
        report.items_already_present = present.len();

        tracing::info!(
            collection = %collection,
            pages = pages.len(),
            found = report.items_found,
            pending = pending.len(),
            "Items extracted"
        );

        report.transition(CollectionState::FetchingItems)?;
        let collection_ref = collection.as_str();
        let outcomes = self
            .options
            .item_scheduler
            .map_bounded(pending, |item| self.process_item(collection_ref, item))
            .await;
        for outcome in outcomes {
            report.record(outcome);
        }

        report.transition(CollectionState::Done)?;
        tracing::info!(
            collection = %collection,
            saved = report.items_saved,
            failed = report.items_failed,
            rejected = report.items_rejected,
            "Collection done"
        );

        Ok(())
    }

    /// Fetches one item and appends its record
    ///
    /// The item only counts as processed once `append` has written it.
    async fn process_item(&self, collection: &str, item: String) -> ItemOutcome {
        if self.lock_store().contains(&item) {
            return ItemOutcome::AlreadyPresent;
        }

        let body = match self.fetcher.get(&item).await {
            FetchOutcome::Success { body, .. } => body,
            FetchOutcome::Failure { reason, attempts } => {
                tracing::warn!(
                    collection,
                    url = %item,
                    attempts,
                    reason = %reason,
                    "Item unavailable, will retry next run"
                );
                return ItemOutcome::FetchFailed;
            }
        };

        let Some(fields) = self.extractor.extract_record(&body) else {
            tracing::warn!(collection, url = %item, "Item page does not look like an item, skipping");
            return ItemOutcome::Rejected;
        };

        let appended = self.lock_store().append(collection, &item, fields);
        match appended {
            Ok(true) => {
                tracing::debug!(collection, url = %item, "Record saved");
                ItemOutcome::Saved
            }
            Ok(false) => ItemOutcome::AlreadyPresent,
            Err(e) => {
                tracing::error!(collection, url = %item, error = %e, "Failed to write record");
                ItemOutcome::WriteFailed
            }
        }
    }

    /// Locks the store, recovering the guard if a holder panicked
    fn lock_store(&self) -> MutexGuard<'_, DedupStore> {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
