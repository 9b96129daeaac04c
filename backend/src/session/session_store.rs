use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "bt_session";

/// What the browser flow remembers between the upload and the result page.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEntry {
    pub filename: Option<String>,
    pub pred_label: Option<String>,
    pub last_accessed: DateTime<Utc>,
}

impl SessionEntry {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            filename: None,
            pred_label: None,
            last_accessed: now,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_accessed > ttl
    }
}

/// In-memory server-side sessions keyed by the `bt_session` cookie value.
#[derive(Clone)]
pub struct SessionStore {
    entries: Arc<Mutex<HashMap<Uuid, SessionEntry>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, SessionEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: Uuid) -> Option<SessionEntry> {
        let now = Utc::now();
        let mut entries = self.lock();
        let entry = entries.get_mut(&id)?;
        if entry.is_expired(now, self.ttl) {
            entries.remove(&id);
            return None;
        }
        entry.last_accessed = now;
        Some(entry.clone())
    }

    /// Stores the latest prediction, replacing any earlier one. Returns the
    /// session id, minting a new session when `id` is absent or unknown.
    pub fn record_prediction(&self, id: Option<Uuid>, filename: String, label: String) -> Uuid {
        let now = Utc::now();
        let mut entries = self.lock();
        Self::evict_expired_locked(&mut entries, now, self.ttl);

        let id = id
            .filter(|id| entries.contains_key(id))
            .unwrap_or_else(Uuid::new_v4);
        let entry = entries.entry(id).or_insert_with(|| SessionEntry::new(now));
        entry.filename = Some(filename);
        entry.pred_label = Some(label);
        entry.last_accessed = now;
        id
    }

    /// Forgets the pending prediction and hands back the filename it referred to.
    pub fn clear_prediction(&self, id: Uuid) -> Option<String> {
        let mut entries = self.lock();
        let entry = entries.get_mut(&id)?;
        entry.pred_label = None;
        entry.last_accessed = Utc::now();
        entry.filename.take()
    }

    pub fn evict_expired(&self) -> usize {
        let mut entries = self.lock();
        Self::evict_expired_locked(&mut entries, Utc::now(), self.ttl)
    }

    fn evict_expired_locked(
        entries: &mut HashMap<Uuid, SessionEntry>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now, ttl));
        let evicted = before - entries.len();
        if evicted > 0 {
            log::debug!("Evicted {} idle sessions", evicted);
        }
        evicted
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    fn backdate(&self, id: Uuid, by: Duration) {
        if let Some(entry) = self.lock().get_mut(&id) {
            entry.last_accessed -= by;
        }
    }
}
