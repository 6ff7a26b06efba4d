//! Help-center crawl into the snapshot cache.
//!
//! This crate provides:
//! - [`Crawler`] — sequential, paginated walk of every help-center category
//! - [`CrawlProgress`] — progress callbacks ([`SilentProgress`] for headless runs)
//! - [`authorize`] — shared-secret check for the scheduled trigger

pub mod engine;
pub mod progress;
pub mod trigger;

pub use engine::{CrawlReport, Crawler};
pub use progress::{CrawlProgress, SilentProgress};
pub use trigger::{authorize, trigger_secret};
