//! State module for tracking crawl progress
//!
//! `CrawlState` holds the query pointer, the page within the active query, and the
//! ledgers of seen, failed and completed items. It round-trips through a JSON file so a
//! crawl can be resumed after interruption.

mod crawl_state;

pub use crawl_state::CrawlState;
