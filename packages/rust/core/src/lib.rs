//! Retrieval engine for groundwork.
//!
//! Ties the source adapters and the snapshot cache into one query path:
//! fan out to the enabled sources, merge, deduplicate by locator, validate
//! help-center links, rank by term containment, truncate.

pub mod cache;
pub mod context;
pub mod dedup;
pub mod rank;
pub mod retrieve;
pub mod validate;

pub use cache::search_cached;
pub use context::{Citation, GroundingContext, NO_GROUNDING};
pub use dedup::dedup_by_locator;
pub use rank::{rank, score_passage};
pub use retrieve::Retriever;
pub use validate::LinkValidator;
