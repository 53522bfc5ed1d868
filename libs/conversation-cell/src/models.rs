use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use availability_cell::Slot;

/// History is bounded both in message count and per-message length so the
/// responder context can never grow without limit.
pub const MAX_HISTORY_MESSAGES: usize = 40;
pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    AwaitingSlotChoice,
    CollectingDetails,
    Confirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Patient,
    Assistant,
    SystemContext,
}

impl MessageRole {
    fn label(&self) -> &'static str {
        match self {
            MessageRole::Patient => "Patient",
            MessageRole::Assistant => "Assistant",
            MessageRole::SystemContext => "Context",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// Per-patient dialog state, keyed by phone number.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub phone: String,
    pub history: Vec<ChatMessage>,
    pub updated_at: DateTime<Utc>,
    /// Last time the assistant offered to show times.
    pub last_invite_at: Option<DateTime<Utc>>,
    /// Last time a slot list was actually shown (anti-repeat throttle).
    pub last_list_at: Option<DateTime<Utc>>,
    /// Pagination cursor for the next availability window.
    pub offer_from: Option<DateTime<Utc>>,
    /// Most recently offered slots, in the order they were shown.
    pub last_slots: Vec<Slot>,
    pub stage: Stage,
}

impl ConversationSession {
    pub fn new(phone: &str, now: DateTime<Utc>) -> Self {
        Self {
            phone: phone.to_string(),
            history: Vec::new(),
            updated_at: now,
            last_invite_at: None,
            last_list_at: None,
            offer_from: None,
            last_slots: Vec::new(),
            stage: Stage::Idle,
        }
    }

    pub fn push(&mut self, role: MessageRole, content: &str, now: DateTime<Utc>) {
        let content: String = content.chars().take(MAX_MESSAGE_CHARS).collect();
        self.history.push(ChatMessage { role, content, at: now });
        if self.history.len() > MAX_HISTORY_MESSAGES {
            let overflow = self.history.len() - MAX_HISTORY_MESSAGES;
            self.history.drain(0..overflow);
        }
        self.updated_at = now;
    }

    /// Render the bounded history as the responder's conversation context.
    pub fn render_context(&self) -> String {
        self.history
            .iter()
            .map(|m| format!("{}: {}", m.role.label(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.updated_at > ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn history_is_bounded_in_count_and_length() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap();
        let mut session = ConversationSession::new("555", now);

        let long = "x".repeat(MAX_MESSAGE_CHARS + 500);
        for _ in 0..(MAX_HISTORY_MESSAGES + 5) {
            session.push(MessageRole::Patient, &long, now);
        }

        assert_eq!(session.history.len(), MAX_HISTORY_MESSAGES);
        assert!(session
            .history
            .iter()
            .all(|m| m.content.chars().count() == MAX_MESSAGE_CHARS));
    }

    #[test]
    fn context_renders_role_labels() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap();
        let mut session = ConversationSession::new("555", now);
        session.push(MessageRole::Patient, "hi", now);
        session.push(MessageRole::Assistant, "hello", now);

        assert_eq!(session.render_context(), "Patient: hi\nAssistant: hello");
    }

    #[test]
    fn expiry_follows_updated_at() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap();
        let session = ConversationSession::new("555", now);

        assert!(!session.is_expired(now + chrono::Duration::minutes(30), chrono::Duration::minutes(60)));
        assert!(session.is_expired(now + chrono::Duration::minutes(90), chrono::Duration::minutes(60)));
    }
}
