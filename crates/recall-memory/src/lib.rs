//! `recall-memory` – The decaying-priority memory layer.
//!
//! Stores what a session has learned about its user, ranks it by an
//! effective score that decays with age, links related items into a semantic
//! graph and keeps the store under a fixed capacity.
//!
//! # Modules
//!
//! - [`store`] – [`MemoryStore`][store::MemoryStore]: one item per key,
//!   contextual recall, reinforcement, graph traversal and score-weighted
//!   eviction.
//! - [`item`] – [`MemoryItem`][item::MemoryItem] and the effective-score
//!   model (7-day half-life decay, freshness and personal-relevance boosts).
//! - [`profile`] – [`PersonalizationProfile`][profile::PersonalizationProfile]:
//!   task-type counters, preference weights, communication style and
//!   emotional tallies derived from memories and turns.
//! - [`snapshot`] – [`SessionSnapshot`][snapshot::SessionSnapshot] plus the
//!   [`SnapshotStore`][snapshot::SnapshotStore] persistence trait and its
//!   SQLite implementation.
//! - [`text`] – the naive tokenizer shared with the context layer.

pub mod item;
pub mod profile;
pub mod snapshot;
pub mod store;
pub mod text;

pub use item::MemoryItem;
pub use profile::PersonalizationProfile;
pub use snapshot::{SessionSnapshot, SnapshotError, SnapshotStore, SqliteSnapshotStore};
pub use store::{MemoryConfig, MemoryStore};
