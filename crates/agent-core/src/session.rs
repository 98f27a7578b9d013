//! Session Management
//!
//! Keyed-by-session conversation memory. Each session owns a bounded window
//! of past turns and the most recent non-empty entity list, which later turns
//! use to resolve references like "compare them".
//!
//! ## Locking
//!
//! The registry lock is only held long enough to fetch or insert a session
//! handle. Each session sits behind its own async mutex, held for a whole
//! turn by [`SessionGuard`], so turns of one session run strictly in
//! submission order while distinct sessions never wait on each other.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{AgentError, Result};

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One completed exchange
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turn {
    /// Raw user text
    pub user: String,

    /// Final response shown to the user
    pub assistant: String,

    /// Intent label the turn was classified as
    pub intent: String,

    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn new(
        user: impl Into<String>,
        assistant: impl Into<String>,
        intent: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
            intent: intent.into(),
            at: Utc::now(),
        }
    }
}

/// Conversation memory of one session
#[derive(Clone, Debug)]
pub struct SessionRecord {
    pub session_id: SessionId,

    /// Past turns, oldest first, never longer than the store's cap
    pub history: VecDeque<Turn>,

    /// Most recent non-empty entity list
    pub previous_entities: Vec<String>,

    pub created_at: DateTime<Utc>,

    /// Last time a turn touched this session
    pub last_access: Instant,
}

impl SessionRecord {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            history: VecDeque::new(),
            previous_entities: Vec::new(),
            created_at: Utc::now(),
            last_access: Instant::now(),
        }
    }

    /// Append a turn, dropping the oldest ones beyond `cap`
    pub fn push_turn(&mut self, turn: Turn, entities: &[String], cap: usize) {
        self.history.push_back(turn);
        while self.history.len() > cap {
            self.history.pop_front();
        }
        if !entities.is_empty() {
            self.previous_entities = entities.to_vec();
        }
        self.last_access = Instant::now();
    }

    /// The last `n` turns, oldest first
    pub fn recent_turns(&self, n: usize) -> Vec<Turn> {
        let skip = self.history.len().saturating_sub(n);
        self.history.iter().skip(skip).cloned().collect()
    }

    pub fn last_intent(&self) -> Option<&str> {
        self.history.back().map(|t| t.intent.as_str())
    }

    pub fn is_idle(&self, max_age: Duration) -> bool {
        self.last_access.elapsed() >= max_age
    }
}

/// Serializable view of a session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub history: Vec<Turn>,
    pub previous_entities: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&SessionRecord> for SessionSnapshot {
    fn from(record: &SessionRecord) -> Self {
        Self {
            session_id: record.session_id.clone(),
            history: record.history.iter().cloned().collect(),
            previous_entities: record.previous_entities.clone(),
            created_at: record.created_at,
        }
    }
}

type SessionHandle = Arc<tokio::sync::Mutex<SessionRecord>>;

/// Exclusive access to one session for the duration of a turn
pub struct SessionGuard {
    record: OwnedMutexGuard<SessionRecord>,
    history_cap: usize,
}

impl SessionGuard {
    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    /// Fold a finished turn into the session
    pub fn append(&mut self, turn: Turn, entities: &[String]) {
        self.record.push_turn(turn, entities, self.history_cap);
    }
}

/// In-memory session store
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
    history_cap: usize,
}

impl SessionStore {
    pub fn new(history_cap: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            history_cap: history_cap.max(1),
        }
    }

    pub fn history_cap(&self) -> usize {
        self.history_cap
    }

    fn registry(&self) -> Result<MutexGuard<'_, HashMap<SessionId, SessionHandle>>> {
        self.sessions
            .lock()
            .map_err(|_| AgentError::Session("session registry lock poisoned".into()))
    }

    fn handle(&self, id: &SessionId, create: bool) -> Result<Option<SessionHandle>> {
        let mut sessions = self.registry()?;
        if let Some(handle) = sessions.get(id) {
            return Ok(Some(Arc::clone(handle)));
        }
        if !create {
            return Ok(None);
        }
        let handle = Arc::new(tokio::sync::Mutex::new(SessionRecord::new(id.clone())));
        sessions.insert(id.clone(), Arc::clone(&handle));
        Ok(Some(handle))
    }

    /// Snapshot of a session, or an empty record if it does not exist
    pub async fn get(&self, id: &SessionId) -> Result<SessionRecord> {
        match self.handle(id, false)? {
            Some(handle) => Ok(handle.lock().await.clone()),
            None => Ok(SessionRecord::new(id.clone())),
        }
    }

    /// Lock a session for one turn, creating it on first use
    ///
    /// Waiters are served in FIFO order.
    pub async fn begin_turn(&self, id: &SessionId) -> Result<SessionGuard> {
        let handle = self
            .handle(id, true)?
            .ok_or_else(|| AgentError::Session(format!("session {id} vanished")))?;
        let mut record = handle.lock_owned().await;
        record.last_access = Instant::now();
        Ok(SessionGuard {
            record,
            history_cap: self.history_cap,
        })
    }

    /// Append a finished turn outside of an open guard
    pub async fn append(&self, id: &SessionId, turn: Turn, entities: &[String]) -> Result<()> {
        let mut guard = self.begin_turn(id).await?;
        guard.append(turn, entities);
        Ok(())
    }

    /// Forget a session's history and entities
    ///
    /// Waits for an in-flight turn of that session to finish first.
    pub async fn clear(&self, id: &SessionId) -> Result<bool> {
        let Some(handle) = self.handle(id, false)? else {
            return Ok(false);
        };
        let mut record = handle.lock().await;
        *record = SessionRecord::new(id.clone());
        Ok(true)
    }

    /// Remove sessions idle for at least `max_age`
    ///
    /// Sessions with an open turn, or a turn waiting for the lock, are kept.
    pub fn evict_idle(&self, max_age: Duration) -> Result<usize> {
        let mut sessions = self.registry()?;
        let before = sessions.len();
        sessions.retain(|_, handle| {
            // another clone means some turn holds or awaits this session
            if Arc::strong_count(handle) > 1 {
                return true;
            }
            match handle.try_lock() {
                Ok(record) => !record.is_idle(max_age),
                Err(_) => true,
            }
        });
        Ok(before - sessions.len())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.registry()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.registry()?.is_empty())
    }

    /// Periodically evict idle sessions on the current runtime
    pub fn spawn_evictor(self: Arc<Self>, every: Duration, max_age: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match self.evict_idle(max_age) {
                    Ok(0) => {}
                    Ok(evicted) => tracing::debug!(evicted, "Evicted idle sessions"),
                    Err(e) => tracing::error!("Session eviction failed: {}", e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn test_get_unknown_session_is_empty() {
        let store = SessionStore::new(5);
        let record = store.get(&SessionId::from_string("nobody")).await.unwrap();
        assert!(record.history.is_empty());
        assert!(record.previous_entities.is_empty());
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_history_is_fifo_capped() {
        let store = SessionStore::new(3);
        let id = SessionId::from_string("s1");
        for i in 0..7 {
            store
                .append(&id, Turn::new(format!("q{i}"), format!("a{i}"), "direct"), &[])
                .await
                .unwrap();
            let record = store.get(&id).await.unwrap();
            assert!(record.history.len() <= 3);
        }
        let record = store.get(&id).await.unwrap();
        let users: Vec<_> = record.history.iter().map(|t| t.user.as_str()).collect();
        assert_eq!(users, vec!["q4", "q5", "q6"]);
    }

    #[tokio::test]
    async fn test_empty_entities_keep_antecedents() {
        let store = SessionStore::new(5);
        let id = SessionId::from_string("s2");
        store
            .append(&id, Turn::new("tìm laptop dell", "...", "search"), &names(&["A", "B"]))
            .await
            .unwrap();
        store
            .append(&id, Turn::new("cảm ơn", "...", "greeting"), &[])
            .await
            .unwrap();
        let record = store.get(&id).await.unwrap();
        assert_eq!(record.previous_entities, names(&["A", "B"]));
        assert_eq!(record.last_intent(), Some("greeting"));
    }

    #[tokio::test]
    async fn test_clear_resets_session() {
        let store = SessionStore::new(5);
        let id = SessionId::from_string("s3");
        store
            .append(&id, Turn::new("q", "a", "search"), &names(&["A"]))
            .await
            .unwrap();
        assert!(store.clear(&id).await.unwrap());
        let record = store.get(&id).await.unwrap();
        assert!(record.history.is_empty());
        assert!(record.previous_entities.is_empty());
        assert!(!store.clear(&SessionId::from_string("missing")).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_idle_skips_active_turns() {
        let store = SessionStore::new(5);
        let idle = SessionId::from_string("idle");
        let busy = SessionId::from_string("busy");
        store.append(&idle, Turn::new("q", "a", "direct"), &[]).await.unwrap();

        let guard = store.begin_turn(&busy).await.unwrap();
        tokio::time::advance(Duration::from_secs(120)).await;

        let evicted = store.evict_idle(Duration::from_secs(60)).unwrap();
        assert_eq!(evicted, 1);
        assert_eq!(store.len().unwrap(), 1);
        drop(guard);

        // released and long idle, so now eligible
        assert_eq!(store.evict_idle(Duration::from_secs(60)).unwrap(), 1);
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_turns_of_one_session_are_serialized() {
        let store = Arc::new(SessionStore::new(5));
        let id = SessionId::from_string("serial");

        let mut first = store.begin_turn(&id).await.unwrap();

        let waiter = {
            let store = Arc::clone(&store);
            let id = id.clone();
            tokio::spawn(async move {
                let guard = store.begin_turn(&id).await.unwrap();
                guard.record().previous_entities.clone()
            })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        first.append(Turn::new("tìm", "ok", "search"), &names(&["A", "B"]));
        drop(first);

        assert_eq!(waiter.await.unwrap(), names(&["A", "B"]));
    }
}
