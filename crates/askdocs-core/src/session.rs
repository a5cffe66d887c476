//! Per-session conversational memory.
//!
//! Sessions are created lazily on first write and live for the process
//! lifetime; each holds an append-only, insertion-ordered log of turns.
//! Operations on distinct sessions never contend — the store-wide lock is
//! held only long enough to resolve a session id — while each session
//! carries an async gate the chain holds for the duration of one request,
//! serializing `answer` calls per session.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard};

use crate::models::{Role, SessionTurn};

/// One session's state: the turn log plus the per-session request gate.
pub struct Session {
    id: String,
    turns: RwLock<Vec<SessionTurn>>,
    gate: Mutex<()>,
}

impl Session {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            turns: RwLock::new(Vec::new()),
            gate: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Acquire the per-session gate. Holding the guard serializes whole
    /// requests against this session; other sessions are unaffected.
    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    /// Append one turn.
    pub fn append(&self, role: Role, text: &str) -> SessionTurn {
        let turn = self.turn(role, text);
        self.turns.write().unwrap().push(turn.clone());
        turn
    }

    /// Append a user turn and its assistant reply under one write lock.
    ///
    /// There is no await point between the two pushes, so a cancelled or
    /// failed request can never leave a dangling unmatched user turn and
    /// the log stays strictly alternating.
    pub fn record_exchange(&self, user_text: &str, assistant_text: &str) -> SessionTurn {
        let user_turn = self.turn(Role::User, user_text);
        let assistant_turn = self.turn(Role::Assistant, assistant_text);
        let mut turns = self.turns.write().unwrap();
        turns.push(user_turn);
        turns.push(assistant_turn.clone());
        assistant_turn
    }

    /// Snapshot of the turn log in insertion order.
    pub fn history(&self) -> Vec<SessionTurn> {
        self.turns.read().unwrap().clone()
    }

    fn turn(&self, role: Role, text: &str) -> SessionTurn {
        SessionTurn {
            session_id: self.id.clone(),
            role,
            text: text.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Session registry keyed by caller-supplied session id.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a session, creating it on first use.
    pub fn session(&self, session_id: &str) -> Arc<Session> {
        if let Some(session) = self.sessions.read().unwrap().get(session_id) {
            return Arc::clone(session);
        }
        let mut sessions = self.sessions.write().unwrap();
        Arc::clone(
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Session::new(session_id))),
        )
    }

    /// Append one turn, creating the session if needed.
    pub fn append(&self, session_id: &str, role: Role, text: &str) -> SessionTurn {
        self.session(session_id).append(role, text)
    }

    /// History for a session. Unknown sessions return an empty sequence
    /// without being created — creation happens on first write.
    pub fn history(&self, session_id: &str) -> Vec<SessionTurn> {
        match self.sessions.read().unwrap().get(session_id) {
            Some(session) => session.history(),
            None => Vec::new(),
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_session_has_empty_history() {
        let store = SessionStore::new();
        assert!(store.history("nobody").is_empty());
        // history() must not create the session as a side effect.
        assert!(store.sessions.read().unwrap().is_empty());
    }

    #[test]
    fn test_append_creates_session_lazily() {
        let store = SessionStore::new();
        store.append("s1", Role::User, "hello");
        let history = store.history("s1");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].text, "hello");
        assert_eq!(history[0].session_id, "s1");
    }

    #[test]
    fn test_insertion_order_preserved() {
        let store = SessionStore::new();
        store.append("s1", Role::User, "first");
        store.append("s1", Role::Assistant, "second");
        store.append("s1", Role::User, "third");
        let history = store.history("s1");
        let texts: Vec<&str> = history.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = SessionStore::new();
        store.append("a", Role::User, "for a");
        store.append("b", Role::User, "for b");
        assert_eq!(store.history("a").len(), 1);
        assert_eq!(store.history("b").len(), 1);
        assert_eq!(store.history("a")[0].text, "for a");
    }

    #[test]
    fn test_record_exchange_appends_pair_in_order() {
        let store = SessionStore::new();
        let session = store.session("s1");
        let assistant = session.record_exchange("question", "answer");
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(assistant.text, "answer");

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[test]
    fn test_alternation_after_exchanges() {
        let store = SessionStore::new();
        let session = store.session("s1");
        for i in 0..4 {
            session.record_exchange(&format!("q{i}"), &format!("a{i}"));
        }
        let history = session.history();
        assert_eq!(history.len(), 8);
        for (i, turn) in history.iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(turn.role, expected, "turn {i} out of order");
        }
    }

    #[tokio::test]
    async fn test_gate_serializes_same_session() {
        let store = Arc::new(SessionStore::new());
        let session = store.session("s1");

        let guard = session.acquire().await;
        // A second acquire on the same session must not complete while
        // the first guard is held.
        let contender = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                let _guard = session.acquire().await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_distinct_sessions_do_not_contend() {
        let store = SessionStore::new();
        let a = store.session("a");
        let b = store.session("b");
        let _guard_a = a.acquire().await;
        // Acquiring b's gate succeeds immediately even while a's is held.
        let _guard_b = b.acquire().await;
    }
}
