//! `Session` – one user's memory, profile and conversation state.
//!
//! A session owns a [`MemoryStore`], a [`PersonalizationProfile`], a
//! [`ContextRegistry`], a [`ContextRouter`] and a [`PendingTopicQueue`] behind
//! a single mutex, so every operation on it is linearizable. Reads hand out
//! owned copies.
//!
//! A conversational turn runs in two locked phases with the response
//! generator called in between, outside the lock:
//!
//! 1. [`Session::begin_turn`] routes the input, records it as a memory when
//!    it carries enough signal, updates the profile, picks a pending topic
//!    and recalls related memories into a [`ResponseRequest`];
//! 2. the caller's [`ResponseGenerator`] produces a reply;
//! 3. [`Session::complete_turn`] appends the reply and queues follow-ups.
//!
//! [`Session::respond`] chains the three.
//!
//! # Example
//!
//! ```rust
//! use recall_context::response::{GeneratedResponse, ResponseError, ResponseRequest};
//! use recall_context::session::{Session, SessionConfig};
//! use recall_types::Metadata;
//!
//! let session = Session::new("alice", SessionConfig::default());
//! let reply = |req: &ResponseRequest| -> Result<GeneratedResponse, ResponseError> {
//!     Ok(GeneratedResponse::text(format!("Noted, about {}.", req.context.topic)))
//! };
//! let (ctx, response) = session
//!     .respond("planning summer vacation italy", Metadata::new(), &reply)
//!     .unwrap();
//! assert_eq!(ctx.message_count(), 2);
//! assert_eq!(response.text, "Noted, about planning summer vacation.");
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use recall_memory::profile::detect_emotion;
use recall_memory::snapshot::SNAPSHOT_VERSION;
use recall_memory::{MemoryConfig, MemoryItem, MemoryStore, PersonalizationProfile, SessionSnapshot, SnapshotStore};
use recall_types::{ContextTransition, ConversationContext, ConversationMessage, Metadata, PendingTopic, RecallError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::ContextEventReceiver;
use crate::pending::{MIN_SELECT_IMPORTANCE, PendingTopicQueue};
use crate::registry::{ContextRegistry, RegistryConfig};
use crate::relevance::{KeywordRelevance, NoValues, RelevanceScorer, ValuesProvider};
use crate::response::{GeneratedResponse, ResponseError, ResponseGenerator, ResponseRequest};
use crate::router::{ContextRouter, DEFAULT_RELEVANCE_THRESHOLD};

/// Default number of memories recalled per turn.
pub const DEFAULT_RECALL_LIMIT: usize = 5;

/// Category under which significant user turns are stored.
pub const CONVERSATION_CATEGORY: &str = "conversation";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Recall(#[from] RecallError),

    #[error(transparent)]
    Response(#[from] ResponseError),

    /// The routed context left the working set while the generator ran.
    #[error("Context {0} is no longer active")]
    ContextGone(String),
}

/// Tuning for a [`Session`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub memory: MemoryConfig,
    pub registry: RegistryConfig,
    pub relevance_threshold: f64,
    pub recall_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            memory: MemoryConfig::default(),
            registry: RegistryConfig::default(),
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            recall_limit: DEFAULT_RECALL_LIMIT,
        }
    }
}

struct SessionState {
    memory: MemoryStore,
    profile: PersonalizationProfile,
    registry: ContextRegistry,
    router: ContextRouter,
    pending: PendingTopicQueue,
}

pub struct Session {
    id: String,
    recall_limit: usize,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(id: &str, config: SessionConfig) -> Self {
        Self::with_collaborators(
            id,
            config,
            Arc::new(KeywordRelevance::default()),
            Arc::new(NoValues),
        )
    }

    pub fn with_collaborators(
        id: &str,
        config: SessionConfig,
        scorer: Arc<dyn RelevanceScorer>,
        values: Arc<dyn ValuesProvider>,
    ) -> Self {
        let state = SessionState {
            memory: MemoryStore::new(config.memory),
            profile: PersonalizationProfile::default(),
            registry: ContextRegistry::with_values(config.registry, values),
            router: ContextRouter::new(scorer).with_threshold(config.relevance_threshold),
            pending: PendingTopicQueue::new(),
        };
        Self {
            id: id.to_string(),
            recall_limit: config.recall_limit,
            state: Mutex::new(state),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    // ── turns ───────────────────────────────────────────────────────────────

    /// Run a full turn: prepare, generate outside the lock, complete.
    pub fn respond(
        &self,
        input: &str,
        metadata: Metadata,
        generator: &dyn ResponseGenerator,
    ) -> Result<(ConversationContext, GeneratedResponse), SessionError> {
        let request = self.begin_turn(input, metadata)?;
        let response = generator.generate(&request)?;
        let context = self
            .complete_turn(&request.context.id, &response)
            .ok_or_else(|| SessionError::ContextGone(request.context.id.clone()))?;
        Ok((context, response))
    }

    pub fn begin_turn(&self, input: &str, metadata: Metadata) -> Result<ResponseRequest, RecallError> {
        self.begin_turn_at(input, metadata, Utc::now())
    }

    /// Route and record a user turn, returning the request for the generator.
    pub fn begin_turn_at(
        &self,
        input: &str,
        metadata: Metadata,
        now: DateTime<Utc>,
    ) -> Result<ResponseRequest, RecallError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let previous = state
            .registry
            .current()
            .map(|c| (c.id.clone(), c.topic.clone(), c.metadata.importance));
        let context = state.router.route_at(&mut state.registry, input, metadata, now);
        if let Some((prev_id, prev_topic, importance)) = previous
            && prev_id != context.id
            && importance >= MIN_SELECT_IMPORTANCE
        {
            debug!(topic = %prev_topic, "left an important context, queued for later");
            state.pending.add_at(&prev_topic, importance, Some(prev_id), now);
        }

        state.profile.observe_turn(input);
        let relevance = state.profile.personal_relevance(input);
        let emotion = detect_emotion(input).unwrap_or("");
        let key = format!("turn:{}:{}", context.id, context.message_count());
        let remembered = state.memory.record_if_significant_at(
            &key,
            input,
            CONVERSATION_CATEGORY,
            emotion,
            relevance,
            now,
        )?;
        if remembered && let Some(item) = state.memory.get(&key) {
            state.profile.observe_memory(item);
        }

        let pending_topic = state.pending.select_if_relevant_at(&context, now);
        let mut memories = state
            .memory
            .contextual_recall_at(input, &context.topic, self.recall_limit + 1, now);
        memories.retain(|m| m.key != key);
        memories.truncate(self.recall_limit);

        debug!(session = %self.id, context = %context.id, remembered, memories = memories.len(), "turn prepared");
        Ok(ResponseRequest {
            input: input.to_string(),
            context,
            pending_topic,
            memories,
            profile: state.profile.export(),
        })
    }

    pub fn complete_turn(&self, context_id: &str, response: &GeneratedResponse) -> Option<ConversationContext> {
        self.complete_turn_at(context_id, response, Utc::now())
    }

    /// Append the generated reply to `context_id` and queue its follow-ups.
    ///
    /// Returns `None` when the context is no longer active; follow-ups are
    /// queued regardless.
    pub fn complete_turn_at(
        &self,
        context_id: &str,
        response: &GeneratedResponse,
        now: DateTime<Utc>,
    ) -> Option<ConversationContext> {
        let mut state = self.state.lock();
        for follow_up in &response.follow_up_topics {
            state
                .pending
                .add_at(&follow_up.topic, follow_up.importance, Some(context_id.to_string()), now);
        }
        state
            .registry
            .append_response_at(context_id, &response.text, response.metadata.clone(), now)
    }

    // ── memory ──────────────────────────────────────────────────────────────

    pub fn remember(
        &self,
        key: &str,
        value: &str,
        priority: f64,
        category: &str,
        emotional_context: &str,
        personal_relevance: f64,
    ) -> Result<(), RecallError> {
        let mut state = self.state.lock();
        state
            .memory
            .remember(key, value, priority, category, emotional_context, personal_relevance)?;
        let SessionState { memory, profile, .. } = &mut *state;
        if let Some(item) = memory.get(key) {
            profile.observe_memory(item);
        }
        Ok(())
    }

    pub fn recall(&self, key: &str) -> Option<String> {
        self.state.lock().memory.recall(key)
    }

    pub fn contextual_recall(&self, query: &str, context: &str, limit: usize) -> Vec<MemoryItem> {
        self.state.lock().memory.contextual_recall(query, context, limit)
    }

    pub fn reinforce_memory(&self, key: &str, effectiveness: f64) -> bool {
        self.state.lock().memory.reinforce_memory(key, effectiveness)
    }

    pub fn find_related_memories(&self, key: &str, depth: usize) -> Vec<MemoryItem> {
        self.state.lock().memory.find_related_memories(key, depth)
    }

    pub fn top_memories(&self, limit: usize) -> Vec<MemoryItem> {
        self.state.lock().memory.top_memories(limit)
    }

    pub fn memory_len(&self) -> usize {
        self.state.lock().memory.len()
    }

    pub fn prune_aged(&self) -> usize {
        self.state.lock().memory.prune_aged()
    }

    pub fn profile(&self) -> PersonalizationProfile {
        self.state.lock().profile.export()
    }

    // ── contexts ────────────────────────────────────────────────────────────

    pub fn create_context(&self, topic: &str, initial_message: Option<ConversationMessage>) -> ConversationContext {
        self.state.lock().registry.create_context(topic, initial_message)
    }

    pub fn switch_context(&self, id: &str) -> Option<ConversationContext> {
        self.state.lock().registry.switch_context(id)
    }

    pub fn merge_contexts(&self, ids: &[&str], new_topic: &str) -> Option<ConversationContext> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.router.merge(&mut state.registry, ids, new_topic)
    }

    /// Set the importance of an active context, in `[0, 1]`.
    pub fn set_context_importance(&self, id: &str, importance: f64) -> Option<ConversationContext> {
        let mut state = self.state.lock();
        let context = state.registry.get(id)?;
        let mut metadata = context.metadata.clone();
        metadata.importance = if importance.is_nan() { 0.0 } else { importance.clamp(0.0, 1.0) };
        let next = context.with_metadata(metadata);
        state.registry.update_active(next.clone());
        Some(next)
    }

    pub fn current_context(&self) -> Option<ConversationContext> {
        self.state.lock().registry.current().cloned()
    }

    pub fn active_contexts(&self) -> Vec<ConversationContext> {
        self.state.lock().registry.active().to_vec()
    }

    pub fn transitions(&self) -> Vec<ContextTransition> {
        self.state.lock().registry.transitions().cloned().collect()
    }

    pub fn subscribe(&self) -> ContextEventReceiver {
        self.state.lock().registry.subscribe()
    }

    pub fn add_pending_topic(&self, topic: &str, importance: f64, relevant_context: Option<String>) {
        self.state.lock().pending.add(topic, importance, relevant_context)
    }

    pub fn pending_topics(&self) -> Vec<PendingTopic> {
        self.state.lock().pending.topics().to_vec()
    }

    // ── persistence ─────────────────────────────────────────────────────────

    /// Owned copy of the whole session state.
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock();
        SessionSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            memories: state.memory.items(),
            profile: state.profile.export(),
            contexts: state.registry.active().to_vec(),
            current_context: state.registry.current_id().map(str::to_string),
            transitions: state.registry.transitions().cloned().collect(),
            pending_topics: state.pending.topics().to_vec(),
        }
    }

    /// Replace the session state with `snapshot`.
    pub fn restore(&self, snapshot: SessionSnapshot) -> Result<(), RecallError> {
        let mut state = self.state.lock();
        state.memory.restore(snapshot.memories)?;
        state.profile.import(snapshot.profile);
        state
            .registry
            .restore(snapshot.contexts, snapshot.current_context, snapshot.transitions);
        state.pending.restore(snapshot.pending_topics);
        info!(session = %self.id, memories = state.memory.len(), "session restored");
        Ok(())
    }

    /// Persist the session and archive contexts that left the working set.
    ///
    /// On failure the in-memory state is untouched and stays usable;
    /// contexts that could not be archived are kept for the next attempt.
    pub fn save(&self, store: &dyn SnapshotStore) -> Result<(), RecallError> {
        let snapshot = self.snapshot();
        let retired = self.state.lock().registry.take_retired();

        if !retired.is_empty()
            && let Err(err) = store.archive_contexts(&self.id, &retired)
        {
            warn!(session = %self.id, error = %err, "context archive failed");
            self.state.lock().registry.requeue_retired(retired);
            return Err(err.into());
        }
        if let Err(err) = store.save_snapshot(&self.id, &snapshot) {
            warn!(session = %self.id, error = %err, "snapshot save failed");
            return Err(err.into());
        }
        debug!(session = %self.id, archived = retired.len(), "session saved");
        Ok(())
    }

    /// Build a session and restore its last snapshot from `store`, if any.
    pub fn load(id: &str, config: SessionConfig, store: &dyn SnapshotStore) -> Result<Self, RecallError> {
        let session = Self::new(id, config);
        match store.load_snapshot(id) {
            Ok(Some(snapshot)) => session.restore(snapshot)?,
            Ok(None) => debug!(session = id, "no snapshot, starting fresh"),
            Err(err) => {
                warn!(session = id, error = %err, "snapshot load failed");
                return Err(err.into());
            }
        }
        Ok(session)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionManager
// ─────────────────────────────────────────────────────────────────────────────

/// Maps session ids to independent sessions.
pub struct SessionManager {
    config: SessionConfig,
    scorer: Arc<dyn RelevanceScorer>,
    values: Arc<dyn ValuesProvider>,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_collaborators(config, Arc::new(KeywordRelevance::default()), Arc::new(NoValues))
    }

    pub fn with_collaborators(
        config: SessionConfig,
        scorer: Arc<dyn RelevanceScorer>,
        values: Arc<dyn ValuesProvider>,
    ) -> Self {
        Self {
            config,
            scorer,
            values,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.lock().get(id).cloned()
    }

    pub fn get_or_create(&self, id: &str) -> Arc<Session> {
        self.sessions
            .lock()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(self.build(id)))
            .clone()
    }

    /// Fetch `id`, restoring it from `store` on first use.
    ///
    /// A failed load is logged and yields a fresh session.
    pub fn load_or_create(&self, id: &str, store: &dyn SnapshotStore) -> Arc<Session> {
        if let Some(session) = self.get(id) {
            return session;
        }
        let session = self.build(id);
        match store.load_snapshot(id) {
            Ok(Some(snapshot)) => {
                if let Err(err) = session.restore(snapshot) {
                    warn!(session = id, error = %err, "snapshot restore failed, starting fresh");
                }
            }
            Ok(None) => {}
            Err(err) => warn!(session = id, error = %err, "snapshot load failed, starting fresh"),
        }
        self.sessions
            .lock()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(session))
            .clone()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.lock().remove(id)
    }

    /// Ids of every open session, sorted.
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Save every open session; returns the failures.
    pub fn save_all(&self, store: &dyn SnapshotStore) -> Vec<(String, RecallError)> {
        let sessions: Vec<Arc<Session>> = self.sessions.lock().values().cloned().collect();
        sessions
            .iter()
            .filter_map(|s| s.save(store).err().map(|e| (s.id().to_string(), e)))
            .collect()
    }

    fn build(&self, id: &str) -> Session {
        Session::with_collaborators(id, self.config.clone(), self.scorer.clone(), self.values.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_memory::{SnapshotError, SqliteSnapshotStore};

    fn echo() -> impl Fn(&ResponseRequest) -> Result<GeneratedResponse, ResponseError> {
        |req: &ResponseRequest| -> Result<GeneratedResponse, ResponseError> {
            Ok(GeneratedResponse::text(format!("re: {}", req.context.topic)))
        }
    }

    struct BrokenStore;

    impl SnapshotStore for BrokenStore {
        fn load_snapshot(&self, _: &str) -> Result<Option<SessionSnapshot>, SnapshotError> {
            Err(SnapshotError::Version { found: 99, expected: SNAPSHOT_VERSION })
        }

        fn save_snapshot(&self, _: &str, _: &SessionSnapshot) -> Result<(), SnapshotError> {
            Err(SnapshotError::Version { found: 99, expected: SNAPSHOT_VERSION })
        }

        fn archive_contexts(&self, _: &str, _: &[ConversationContext]) -> Result<(), SnapshotError> {
            Err(SnapshotError::Version { found: 99, expected: SNAPSHOT_VERSION })
        }
    }

    // ── turns ────────────────────────────────────────────────────────────────

    #[test]
    fn respond_appends_user_and_agent_messages() {
        let session = Session::new("s", SessionConfig::default());
        let (ctx, response) = session
            .respond("planning summer vacation italy", Metadata::new(), &echo())
            .unwrap();
        assert_eq!(response.text, "re: planning summer vacation");
        assert_eq!(ctx.message_count(), 2);
        assert_eq!(session.current_context().unwrap().id, ctx.id);
    }

    #[test]
    fn significant_turns_become_memories() {
        let session = Session::new("s", SessionConfig::default());
        session.begin_turn("planning vacation budget spreadsheet", Metadata::new()).unwrap();
        session.begin_turn("ok", Metadata::new()).unwrap();
        assert_eq!(session.memory_len(), 1);
        // Counted once for the turn and once for the stored memory.
        assert_eq!(session.profile().task_types.get("finance"), Some(&2));
    }

    #[test]
    fn request_excludes_the_turn_itself() {
        let session = Session::new("s", SessionConfig::default());
        session
            .remember("trip", "italy vacation planning notes", 60.0, "travel", "", 0.0)
            .unwrap();
        let request = session
            .begin_turn("planning summer vacation italy", Metadata::new())
            .unwrap();
        let keys: Vec<&str> = request.memories.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["trip"]);
    }

    #[test]
    fn follow_ups_are_queued() {
        let session = Session::new("s", SessionConfig::default());
        let generator = |_: &ResponseRequest| -> Result<GeneratedResponse, ResponseError> {
            Ok(GeneratedResponse::text("ok").with_follow_up("hotel booking", 0.8))
        };
        session
            .respond("planning summer vacation italy", Metadata::new(), &generator)
            .unwrap();
        let pending = session.pending_topics();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].topic, "hotel booking");
    }

    #[test]
    fn generator_failure_leaves_user_message() {
        let session = Session::new("s", SessionConfig::default());
        let failing = |_: &ResponseRequest| -> Result<GeneratedResponse, ResponseError> {
            Err(ResponseError::Unavailable("offline".into()))
        };
        let err = session
            .respond("planning summer vacation italy", Metadata::new(), &failing)
            .unwrap_err();
        assert_eq!(err, SessionError::Response(ResponseError::Unavailable("offline".into())));
        assert_eq!(session.current_context().unwrap().message_count(), 1);
    }

    #[test]
    fn leaving_important_context_queues_its_topic() {
        let session = Session::new("s", SessionConfig::default());
        let request = session
            .begin_turn("planning summer vacation italy", Metadata::new())
            .unwrap();
        session.set_context_importance(&request.context.id, 0.9).unwrap();
        session.begin_turn("quarterly taxes deadline", Metadata::new()).unwrap();
        let pending = session.pending_topics();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].topic, "planning summer vacation");
        assert_eq!(pending[0].relevant_context.as_deref(), Some(request.context.id.as_str()));
    }

    #[test]
    fn pending_topic_surfaces_in_matching_context() {
        let session = Session::new("s", SessionConfig::default());
        session.add_pending_topic("vacation budget", 0.9, None);
        let request = session
            .begin_turn("planning vacation budget spreadsheet", Metadata::new())
            .unwrap();
        assert_eq!(request.pending_topic.unwrap().topic, "vacation budget");
        assert!(session.pending_topics().is_empty());
    }

    // ── persistence ──────────────────────────────────────────────────────────

    #[test]
    fn save_and_load_roundtrip() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        let session = Session::new("alice", SessionConfig::default());
        session.respond("planning summer vacation italy", Metadata::new(), &echo()).unwrap();
        session.remember("color", "likes green", 70.0, "preference", "", 0.0).unwrap();
        session.save(&store).unwrap();

        let loaded = Session::load("alice", SessionConfig::default(), &store).unwrap();
        assert_eq!(loaded.recall("color").as_deref(), Some("likes green"));
        assert_eq!(loaded.active_contexts(), session.active_contexts());
        assert_eq!(loaded.current_context(), session.current_context());
        assert_eq!(loaded.transitions(), session.transitions());
    }

    #[test]
    fn save_archives_merged_contexts() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        let session = Session::new("bob", SessionConfig::default());
        let a = session.create_context("a topic", None);
        let b = session.create_context("b topic", None);
        session.merge_contexts(&[a.id.as_str(), b.id.as_str()], "ab").unwrap();
        session.save(&store).unwrap();
        assert_eq!(store.archived_contexts("bob").unwrap().len(), 2);
        session.save(&store).unwrap();
        assert_eq!(store.archived_contexts("bob").unwrap().len(), 2);
    }

    #[test]
    fn failed_save_keeps_state_usable() {
        let session = Session::new("carol", SessionConfig::default());
        let a = session.create_context("a topic", None);
        let b = session.create_context("b topic", None);
        session.merge_contexts(&[a.id.as_str(), b.id.as_str()], "ab").unwrap();
        let err = session.save(&BrokenStore).unwrap_err();
        assert!(matches!(err, RecallError::Persistence(_)));
        assert_eq!(session.active_contexts().len(), 1);

        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        session.save(&store).unwrap();
        assert_eq!(store.archived_contexts("carol").unwrap().len(), 2);
    }

    #[test]
    fn load_surfaces_store_errors() {
        assert!(Session::load("x", SessionConfig::default(), &BrokenStore).is_err());
    }

    // ── manager ──────────────────────────────────────────────────────────────

    #[test]
    fn manager_isolates_sessions() {
        let manager = SessionManager::new(SessionConfig::default());
        let alice = manager.get_or_create("alice");
        let bob = manager.get_or_create("bob");
        alice.remember("k", "alice value", 50.0, "c", "", 0.0).unwrap();
        assert!(bob.recall("k").is_none());
        assert!(Arc::ptr_eq(&alice, &manager.get_or_create("alice")));
        assert_eq!(manager.session_ids(), vec!["alice", "bob"]);
        assert!(manager.remove("bob").is_some());
        assert!(manager.get("bob").is_none());
    }

    #[test]
    fn manager_falls_back_to_fresh_session() {
        let manager = SessionManager::new(SessionConfig::default());
        let session = manager.load_or_create("dave", &BrokenStore);
        assert_eq!(session.memory_len(), 0);
        let failures = manager.save_all(&BrokenStore);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "dave");
    }

    #[test]
    fn sessions_are_shareable_across_threads() {
        let session = Arc::new(Session::new("t", SessionConfig::default()));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let session = Arc::clone(&session);
                std::thread::spawn(move || {
                    for j in 0..25 {
                        session
                            .remember(&format!("k{i}-{j}"), "value", 50.0, "c", "", 0.0)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(session.memory_len(), 100);
    }
}
