//! Conversation history for a single call
//!
//! Keeps the ordered turns of the call and drops the oldest ones once the
//! configured maximum is exceeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// The caller
    User,
    /// The voice agent
    Agent,
    /// Runtime notices, never sent to the model as dialogue
    System,
}

impl Role {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
            Role::System => "system",
        }
    }
}

/// A single turn in the conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationEvent {
    /// Who said it
    pub role: Role,

    /// Text content
    pub content: String,

    /// When the turn was recorded
    pub timestamp: DateTime<Utc>,
}

impl ConversationEvent {
    /// Create a new conversation event
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an agent turn
    pub fn agent(content: impl Into<String>) -> Self {
        Self::new(Role::Agent, content)
    }

    /// Create a system notice
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Whether the event carries any text
    pub fn has_text(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// Ordered, bounded conversation history
#[derive(Clone, Debug)]
pub struct ConversationContext {
    /// Conversation history, oldest first
    events: Vec<ConversationEvent>,

    /// Maximum number of turns to keep
    max_length: usize,
}

impl ConversationContext {
    /// Create an empty context keeping at most `max_length` turns
    pub fn new(max_length: usize) -> Self {
        Self {
            events: Vec::new(),
            max_length: max_length.max(1),
        }
    }

    /// Append a turn, dropping the oldest ones beyond the limit
    pub fn add_event(&mut self, event: ConversationEvent) {
        self.events.push(event);
        self.trim_to_fit();
    }

    /// Add a user turn
    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.add_event(ConversationEvent::user(content));
    }

    /// Add an agent turn
    pub fn add_agent_message(&mut self, content: impl Into<String>) {
        self.add_event(ConversationEvent::agent(content));
    }

    /// All turns, oldest first
    pub fn events(&self) -> &[ConversationEvent] {
        &self.events
    }

    /// Text of the most recent user turn
    pub fn latest_user_transcript(&self) -> Option<&str> {
        self.events
            .iter()
            .rev()
            .find(|e| e.role == Role::User)
            .map(|e| e.content.as_str())
    }

    /// Number of turns in history
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Maximum number of turns kept
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Clear conversation history
    pub fn clear(&mut self) {
        self.events.clear();
    }

    fn trim_to_fit(&mut self) {
        if self.events.len() > self.max_length {
            let excess = self.events.len() - self.max_length;
            self.events.drain(..excess);
        }
    }
}
