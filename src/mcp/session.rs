use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const DEFAULT_MAX_SESSIONS: usize = 1024;
pub const DEFAULT_IDLE_TTL_MINUTES: i64 = 60;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub protocol_version: String,
    pub client_name: Option<String>,
    pub last_seen: DateTime<Utc>,
    pub initialized: bool,
}

impl Session {
    fn is_expired(&self, now: DateTime<Utc>, idle_ttl: Duration) -> bool {
        now - self.last_seen > idle_ttl
    }
}

/// In-memory `Mcp-Session-Id` registry, bounded in size and idle time.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    max_sessions: usize,
    idle_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(
            DEFAULT_MAX_SESSIONS,
            Duration::minutes(DEFAULT_IDLE_TTL_MINUTES),
        )
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_sessions: usize, idle_ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
            idle_ttl,
        }
    }

    // 鎖中毒時沿用內部資料；map 本身不會處於半更新狀態
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Session>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Session>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a new session, first dropping idle ones and, when full, the least recently used.
    pub fn create(&self, protocol_version: &str, client_name: Option<String>) -> Session {
        let now = Utc::now();
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            protocol_version: protocol_version.to_string(),
            client_name,
            last_seen: now,
            initialized: false,
        };

        let mut sessions = self.write();
        let idle_ttl = self.idle_ttl;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now, idle_ttl));
        if sessions.len() < before {
            tracing::debug!("清除 {} 個閒置 MCP session", before - sessions.len());
        }

        while sessions.len() >= self.max_sessions {
            let Some(oldest) = sessions
                .values()
                .min_by_key(|s| s.last_seen)
                .map(|s| s.id.clone())
            else {
                break;
            };
            sessions.remove(&oldest);
            tracing::warn!("⚠️ MCP session 數量達上限 {}，移除最舊的 {}", self.max_sessions, oldest);
        }

        sessions.insert(session.id.clone(), session.clone());
        session
    }

    /// Refreshes `last_seen` and reports whether the session is live. Expired ones are removed.
    pub fn touch(&self, id: &str) -> bool {
        let now = Utc::now();
        let mut sessions = self.write();
        let Some(session) = sessions.get_mut(id) else {
            return false;
        };
        if !session.is_expired(now, self.idle_ttl) {
            session.last_seen = now;
            return true;
        }
        sessions.remove(id);
        false
    }

    /// Marks the client's `notifications/initialized` as received.
    pub fn mark_initialized(&self, id: &str) -> Option<Session> {
        let mut sessions = self.write();
        let session = sessions.get_mut(id)?;
        session.initialized = true;
        Some(session.clone())
    }

    pub fn remove(&self, id: &str) -> bool {
        self.write().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let store = SessionStore::new();
        let session = store.create("2025-03-26", Some("inspector".to_string()));

        assert_eq!(session.id.len(), 36);
        assert!(store.touch(&session.id));

        let marked = store.mark_initialized(&session.id).unwrap();
        assert!(marked.initialized);
        assert_eq!(marked.client_name.as_deref(), Some("inspector"));
        assert_eq!(marked.protocol_version, "2025-03-26");
        assert!(store.mark_initialized("missing").is_none());

        assert!(store.remove(&session.id));
        assert!(!store.remove(&session.id));
        assert!(!store.touch(&session.id));
        assert!(store.is_empty());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let store = SessionStore::new();
        let a = store.create("2025-03-26", None);
        let b = store.create("2025-03-26", None);
        assert_ne!(a.id, b.id);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_create_evicts_least_recently_used_when_full() {
        let store = SessionStore::with_limits(3, Duration::minutes(60));
        let first = store.create("2025-03-26", None);
        let second = store.create("2025-03-26", None);
        let third = store.create("2025-03-26", None);

        // first 最近被使用，second 成為最舊
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(store.touch(&first.id));

        let fourth = store.create("2025-03-26", None);
        assert_eq!(store.len(), 3);
        assert!(!store.touch(&second.id));
        assert!(store.touch(&first.id));
        assert!(store.touch(&third.id));
        assert!(store.touch(&fourth.id));
    }

    #[test]
    fn test_repeated_initialize_stays_bounded() {
        let store = SessionStore::with_limits(50, Duration::minutes(60));
        for _ in 0..5000 {
            store.create("2025-03-26", None);
        }
        assert_eq!(store.len(), 50);
    }

    #[test]
    fn test_idle_sessions_expire() {
        let store = SessionStore::with_limits(10, Duration::zero());
        let stale = store.create("2025-03-26", None);
        std::thread::sleep(std::time::Duration::from_millis(5));

        assert!(!store.touch(&stale.id));
        assert!(store.is_empty());

        let a = store.create("2025-03-26", None);
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.create("2025-03-26", None);
        assert!(!store.touch(&a.id));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_poisoned_lock_still_tracks_sessions() {
        let store = SessionStore::with_limits(2, Duration::minutes(60));
        let before = store.create("2025-03-26", None);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.sessions.write().unwrap();
            panic!("worker panicked while holding the session lock");
        }));
        assert!(result.is_err());
        assert!(store.sessions.is_poisoned());

        let after = store.create("2025-03-26", None);
        assert!(store.touch(&before.id));
        assert!(store.touch(&after.id));
        store.create("2025-03-26", None);
        assert_eq!(store.len(), 2);
    }
}
