use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::intent::Intent;

pub const GREETING_QUESTION: &str = "Halo, saya mulai belajar dari mana?";
pub const GREETING_ANSWER: &str = "Mulai dari selling skill dasar atau langsung tanya produk. Jika butuh motivasi, cukup ketik: *butuh motivasi*.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub query: String,
    pub answer: String,
    /// `None` for the greeting seed.
    pub intent: Option<Intent>,
    pub created_at: String,
}

impl TranscriptEntry {
    pub fn new(query: impl Into<String>, answer: impl Into<String>, intent: Option<Intent>) -> Self {
        Self {
            query: query.into(),
            answer: answer.into(),
            intent,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Ordered query/answer pairs of one session. Append-only until cleared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh transcript holding the greeting pair.
    pub fn seeded() -> Self {
        Self {
            entries: vec![TranscriptEntry::new(GREETING_QUESTION, GREETING_ANSWER, None)],
        }
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }
}

pub type SessionTranscript = Arc<Mutex<Transcript>>;

/// Bounds on the in-memory session table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub max_sessions: usize,
    pub idle_ttl: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_sessions: 1000,
            idle_ttl: Duration::from_secs(3600),
        }
    }
}

struct SessionSlot {
    transcript: SessionTranscript,
    /// Milliseconds since the store's epoch.
    last_seen: AtomicU64,
}

impl SessionSlot {
    fn new(transcript: SessionTranscript, now: u64) -> Self {
        Self {
            transcript,
            last_seen: AtomicU64::new(now),
        }
    }

    fn touch(&self, now: u64) {
        self.last_seen.fetch_max(now, Ordering::Relaxed);
    }

    fn last_seen(&self) -> u64 {
        self.last_seen.load(Ordering::Relaxed)
    }

    /// A handler still holds the transcript.
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.transcript) > 1
    }
}

/// In-memory transcripts keyed by session id.
///
/// Each session has its own mutex: a request holds it for the whole
/// answer, other sessions are not blocked. Sessions idle for longer than
/// `idle_ttl` are dropped, and the table never grows past `max_sessions`;
/// at the cap the least recently used session makes room.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionSlot>>>,
    limits: SessionLimits,
    epoch: Instant,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(SessionLimits::default())
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: SessionLimits) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            limits: SessionLimits {
                max_sessions: limits.max_sessions.max(1),
                idle_ttl: limits.idle_ttl,
            },
            epoch: Instant::now(),
        }
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// Create a seeded session under a new id.
    pub async fn create(&self) -> (String, SessionTranscript) {
        let id = uuid::Uuid::new_v4().to_string();
        let transcript = Arc::new(Mutex::new(Transcript::seeded()));
        let now = self.now_millis();

        let mut sessions = self.sessions.write().await;
        self.make_room(&mut sessions, now);
        sessions.insert(id.clone(), SessionSlot::new(transcript.clone(), now));
        tracing::debug!("Created session {}", id);
        (id, transcript)
    }

    /// A live session's transcript. Expired sessions read as absent.
    pub async fn get(&self, id: &str) -> Option<SessionTranscript> {
        let now = self.now_millis();
        let sessions = self.sessions.read().await;
        let slot = sessions.get(id)?;
        if self.is_expired(slot, now) {
            return None;
        }
        slot.touch(now);
        Some(slot.transcript.clone())
    }

    /// The session's transcript, seeding a new one the first time `id` is
    /// seen or after it expired.
    pub async fn get_or_create(&self, id: &str) -> SessionTranscript {
        if let Some(existing) = self.get(id).await {
            return existing;
        }

        let now = self.now_millis();
        let mut sessions = self.sessions.write().await;
        if let Some(slot) = sessions.get(id) {
            if !self.is_expired(slot, now) {
                slot.touch(now);
                return slot.transcript.clone();
            }
        }

        self.make_room(&mut sessions, now);
        tracing::debug!("Seeding session {}", id);
        let transcript = Arc::new(Mutex::new(Transcript::seeded()));
        sessions.insert(id.to_string(), SessionSlot::new(transcript.clone(), now));
        transcript
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    /// Number of stored sessions, expired ones included until swept.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop every idle session that no request is using. Returns the count.
    pub async fn evict_idle(&self) -> usize {
        let now = self.now_millis();
        let mut sessions = self.sessions.write().await;
        self.evict_expired(&mut sessions, now)
    }

    fn make_room(&self, sessions: &mut HashMap<String, SessionSlot>, now: u64) {
        self.evict_expired(sessions, now);
        while sessions.len() >= self.limits.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, slot)| (slot.in_use(), slot.last_seen()))
                .map(|(id, _)| id.clone());
            let Some(oldest) = oldest else {
                break;
            };
            sessions.remove(&oldest);
            tracing::info!(
                "Session limit {} reached; dropped least recently used session {}",
                self.limits.max_sessions,
                oldest
            );
        }
    }

    fn evict_expired(&self, sessions: &mut HashMap<String, SessionSlot>, now: u64) -> usize {
        let before = sessions.len();
        sessions.retain(|_, slot| !self.is_expired(slot, now));
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} idle sessions", evicted);
        }
        evicted
    }

    /// Idle past the TTL and not held by any request.
    fn is_expired(&self, slot: &SessionSlot, now: u64) -> bool {
        !slot.in_use()
            && now.saturating_sub(slot.last_seen()) > duration_millis(self.limits.idle_ttl)
    }

    fn now_millis(&self) -> u64 {
        duration_millis(self.epoch.elapsed())
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Periodically drop idle sessions until the store's last handle is gone.
pub fn spawn_idle_sweeper(store: &SessionStore, every: Duration) -> tokio::task::JoinHandle<()> {
    let sessions = Arc::downgrade(&store.sessions);
    let limits = store.limits;
    let epoch = store.epoch;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(sessions) = sessions.upgrade() else {
                break;
            };
            let store = SessionStore {
                sessions,
                limits,
                epoch,
            };
            store.evict_idle().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_transcript_holds_the_greeting() {
        let transcript = Transcript::seeded();
        assert_eq!(transcript.len(), 1);
        let entry = &transcript.entries()[0];
        assert_eq!(entry.query, GREETING_QUESTION);
        assert_eq!(entry.answer, GREETING_ANSWER);
        assert_eq!(entry.intent, None);
    }

    #[test]
    fn clear_empties_regardless_of_length() {
        let mut transcript = Transcript::seeded();
        for i in 0..5 {
            transcript.push(TranscriptEntry::new(format!("q{i}"), format!("a{i}"), Some(Intent::Standard)));
        }
        assert_eq!(transcript.len(), 6);
        transcript.clear();
        assert!(transcript.is_empty());
        transcript.clear();
        assert!(transcript.is_empty());
    }

    #[test]
    fn entries_keep_chronological_order() {
        let mut transcript = Transcript::new();
        transcript.push(TranscriptEntry::new("pertama", "a", Some(Intent::Standard)));
        transcript.push(TranscriptEntry::new("kedua", "b", Some(Intent::Motivational)));
        let queries: Vec<&str> = transcript.entries().iter().map(|e| e.query.as_str()).collect();
        assert_eq!(queries, vec!["pertama", "kedua"]);
        assert_eq!(transcript.last().map(|e| e.query.as_str()), Some("kedua"));
    }

    #[tokio::test]
    async fn sessions_are_seeded_once_and_isolated() {
        let store = SessionStore::new();
        let first = store.get_or_create("kasir-1").await;
        first
            .lock()
            .await
            .push(TranscriptEntry::new("q", "a", Some(Intent::Standard)));

        let again = store.get_or_create("kasir-1").await;
        assert_eq!(again.lock().await.len(), 2);

        let other = store.get_or_create("kasir-2").await;
        assert_eq!(other.lock().await.len(), 1);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn create_and_remove() {
        let store = SessionStore::new();
        let (id, transcript) = store.create().await;
        assert_eq!(transcript.lock().await.len(), 1);
        assert!(store.get(&id).await.is_some());

        assert!(store.remove(&id).await);
        assert!(!store.remove(&id).await);
        assert!(store.get(&id).await.is_none());
    }

    fn limited(max_sessions: usize, idle_secs: u64) -> SessionStore {
        SessionStore::with_limits(SessionLimits {
            max_sessions,
            idle_ttl: Duration::from_secs(idle_secs),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_expires_and_reseeds() {
        let store = limited(10, 60);
        store
            .get_or_create("kasir-1")
            .await
            .lock()
            .await
            .push(TranscriptEntry::new("q", "a", Some(Intent::Standard)));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.get("kasir-1").await.is_none());

        let fresh = store.get_or_create("kasir-1").await;
        assert_eq!(fresh.lock().await.len(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn activity_keeps_a_session_alive() {
        let store = limited(10, 60);
        store.get_or_create("kasir-1").await;

        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(40)).await;
            assert!(store.get("kasir-1").await.is_some());
        }
        assert_eq!(store.evict_idle().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cap_drops_least_recently_used() {
        let store = limited(2, 3600);
        store.get_or_create("a").await;
        store.get_or_create("b").await;

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get("a").await.is_some());

        store.get_or_create("c").await;
        assert_eq!(store.len().await, 2);
        assert!(store.get("a").await.is_some());
        assert!(store.get("b").await.is_none());
        assert!(store.get("c").await.is_some());

        for i in 0..50 {
            store.create().await;
            assert!(store.len().await <= 2, "grew past the cap at {}", i);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_in_use_survive_idle_sweep() {
        let store = limited(10, 60);
        let held = store.get_or_create("kasir-1").await;
        store.get_or_create("kasir-2").await;

        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(store.evict_idle().await, 1);
        assert_eq!(store.len().await, 1);

        assert!(store.get("kasir-1").await.is_some());
        drop(held);
        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(store.evict_idle().await, 1);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_drops_idle_sessions() {
        let store = limited(10, 60);
        store.get_or_create("kasir-1").await;
        let sweeper = spawn_idle_sweeper(&store, Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(store.len().await, 0);
        sweeper.abort();
    }

    #[tokio::test]
    async fn concurrent_appends_to_one_session_are_not_lost() {
        let store = SessionStore::new();
        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let transcript = store.get_or_create("kasir-1").await;
                    let mut transcript = transcript.lock().await;
                    let before = transcript.len();
                    tokio::task::yield_now().await;
                    transcript.push(TranscriptEntry::new(format!("q{i}"), "a", Some(Intent::Standard)));
                    assert_eq!(transcript.len(), before + 1);
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.len().await, 1);
        let transcript = store.get("kasir-1").await.unwrap();
        assert_eq!(transcript.lock().await.len(), 21);
    }
}
