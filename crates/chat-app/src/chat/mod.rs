/// Request lifecycle around the conversation store.
pub mod dispatch;
pub mod input;
/// Domain entities for conversations and their messages.
pub mod message;
pub mod store;

pub use dispatch::{
    ChatSession, DispatchState, InFlight, SendOutcome, Submission, SubmissionId, SubmitRejection,
};
pub use input::{EnterAction, InputBuffer};
pub use message::{
    Conversation, ConversationId, DEFAULT_CONVERSATION_TITLE, Message, MessageId, MessageStatus,
    Role, TITLE_MAX_CHARS, derive_title,
};
pub use store::{ConversationStore, StoreError, StoreResult};
