use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use shared_config::AppConfig;

use crate::models::ConversationSession;

/// Keyed session store with TTL eviction.
///
/// Each session sits behind its own mutex; checking one out and locking it
/// serializes message handling per phone, so stage transitions stay linear
/// even when a patient double-sends. The sweeper never evicts a session whose
/// mutex is currently held: a held lock means a turn is in flight.
pub struct ConversationStore {
    sessions: Mutex<HashMap<String, Arc<Mutex<ConversationSession>>>>,
    ttl: Duration,
}

impl ConversationStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: Duration::minutes(config.session_ttl_minutes),
        }
    }

    /// Fetch the session for `phone`, creating a fresh one when none exists
    /// or the existing one has expired.
    pub async fn checkout(
        &self,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Arc<Mutex<ConversationSession>> {
        let mut map = self.sessions.lock().await;

        if let Some(existing) = map.get(phone) {
            let expired = match existing.try_lock() {
                Ok(session) => session.is_expired(now, self.ttl),
                // A held lock means an in-flight turn; the session is live.
                Err(_) => false,
            };
            if !expired {
                return Arc::clone(existing);
            }
            debug!("Session for {} expired, starting fresh", phone);
        }

        let fresh = Arc::new(Mutex::new(ConversationSession::new(phone, now)));
        map.insert(phone.to_string(), Arc::clone(&fresh));
        fresh
    }

    /// Explicit reset command: drop the session entirely.
    pub async fn reset(&self, phone: &str) {
        let mut map = self.sessions.lock().await;
        if map.remove(phone).is_some() {
            debug!("Session for {} reset", phone);
        }
    }

    /// Periodic TTL sweep. Returns how many sessions were evicted.
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut map = self.sessions.lock().await;
        let before = map.len();

        map.retain(|_, session| match session.try_lock() {
            Ok(guard) => !guard.is_expired(now, self.ttl),
            Err(_) => true,
        });

        let evicted = before - map.len();
        if evicted > 0 {
            debug!("Evicted {} expired sessions", evicted);
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
