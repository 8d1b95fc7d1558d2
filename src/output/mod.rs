//! Output module for reporting harvest results
//!
//! This module handles:
//! - Store statistics for the `--stats` mode
//! - The end-of-run summary
//! - The proxy check report

pub mod stats;

pub use stats::{
    load_statistics, print_proxy_report, print_run_summary, print_statistics, StoreStatistics,
};
