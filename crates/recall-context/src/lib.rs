//! `recall-context` – Conversation routing and session orchestration.
//!
//! Sits on top of [`recall_memory`] and decides which conversation thread
//! every user message belongs to, keeps the working set of threads bounded,
//! queues topics worth bringing back later and ties it all together per user
//! session.
//!
//! # Modules
//!
//! - [`registry`] – [`ContextRegistry`][registry::ContextRegistry]: active
//!   contexts, current pointer, merges, activity-based eviction and the
//!   transition log.
//! - [`router`] – [`ContextRouter`][router::ContextRouter]: stay / switch /
//!   create decisions.
//! - [`relevance`] – scoring plus the [`RelevanceScorer`][relevance::RelevanceScorer]
//!   and [`ValuesProvider`][relevance::ValuesProvider] seams.
//! - [`pending`] – [`PendingTopicQueue`][pending::PendingTopicQueue].
//! - [`response`] – the [`ResponseGenerator`][response::ResponseGenerator]
//!   seam.
//! - [`session`] – [`Session`][session::Session] and
//!   [`SessionManager`][session::SessionManager].
//! - [`events`] – broadcast notifications of context lifecycle changes.
//! - [`telemetry`] – `tracing` subscriber and OTLP exporter setup.

pub mod events;
pub mod pending;
pub mod registry;
pub mod relevance;
pub mod response;
pub mod router;
pub mod session;
pub mod telemetry;

pub use events::{ContextEvent, ContextEventReceiver};
pub use pending::PendingTopicQueue;
pub use registry::{ContextRegistry, RegistryConfig};
pub use relevance::{KeywordRelevance, NoValues, RelevanceScorer, ValuesProvider};
pub use response::{GeneratedResponse, ResponseError, ResponseGenerator, ResponseRequest};
pub use router::{ContextRouter, RouteDecision};
pub use session::{Session, SessionConfig, SessionError, SessionManager};
