//! Cache storage for groundwork.
//!
//! - [`KvStore`]: the `get`/`set` contract the crawler and readers share
//! - [`SqliteKv`]: libSQL file store (offline, embedded)
//! - [`MemoryKv`]: process-local store
//! - [`SnapshotStore`]: typed snapshot reads and writes over either
//!
//! **Access rules:** the crawler is the only writer; retrieval opens the
//! store and only reads.

mod kv;
mod migrations;
mod snapshot;

pub use kv::{KvStore, MemoryKv, SqliteKv};
pub use snapshot::SnapshotStore;
