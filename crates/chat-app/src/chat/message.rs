use std::fmt;
use std::time::SystemTime;

use serenity_llm::FailureKind;

/// Title every conversation carries until its first message arrives.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New conversation";

/// Upper bound, in characters, of a title derived from the first message.
pub const TITLE_MAX_CHARS: usize = 30;

/// Stable identifier for one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationId(pub u64);

impl ConversationId {
    /// Creates a typed conversation identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Stable identifier for one message. Allocation order equals creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Creates a typed message identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

/// Outcome carried by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Done,
    /// Assistant placeholder written after a failed gateway call.
    Failed(FailureKind),
}

/// Core immutable message model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub created_at: SystemTime,
    pub status: MessageStatus,
}

impl Message {
    /// Creates a message with explicit status, stamped with the current time.
    pub fn new(
        id: MessageId,
        role: Role,
        content: impl Into<String>,
        status: MessageStatus,
    ) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            created_at: SystemTime::now(),
            status,
        }
    }

    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self::new(id, Role::User, content, MessageStatus::Done)
    }

    pub fn assistant(id: MessageId, content: impl Into<String>) -> Self {
        Self::new(id, Role::Assistant, content, MessageStatus::Done)
    }

    /// Assistant reply standing in for a failed provider call.
    pub fn assistant_failed(id: MessageId, content: impl Into<String>, kind: FailureKind) -> Self {
        Self::new(id, Role::Assistant, content, MessageStatus::Failed(kind))
    }
}

/// Conversation aggregate root for chat state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: SystemTime,
}

impl Conversation {
    /// Creates an empty conversation with the placeholder title.
    pub fn new(id: ConversationId) -> Self {
        Self {
            id,
            title: DEFAULT_CONVERSATION_TITLE.to_string(),
            messages: Vec::new(),
            created_at: SystemTime::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Leading `TITLE_MAX_CHARS` characters of `content`, without an ellipsis.
pub fn derive_title(content: &str) -> String {
    content.chars().take(TITLE_MAX_CHARS).collect()
}
