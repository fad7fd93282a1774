use snafu::{OptionExt, Snafu};

use super::message::{Conversation, ConversationId, Message, MessageId, derive_title};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("conversation {conversation_id} does not exist"))]
    ConversationNotFound {
        stage: &'static str,
        conversation_id: ConversationId,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// In-memory, insertion-ordered conversation collection with a current pointer.
///
/// The current pointer is either `None` or names a conversation in the collection.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    current: Option<ConversationId>,
    next_conversation_id: u64,
    next_message_id: u64,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session start state: a single empty conversation, selected.
    pub fn bootstrap() -> Self {
        let mut store = Self::new();
        store.create();
        store
    }

    pub fn create(&mut self) -> ConversationId {
        self.next_conversation_id = self.next_conversation_id.saturating_add(1);
        let id = ConversationId::new(self.next_conversation_id);

        self.conversations.push(Conversation::new(id));
        self.current = Some(id);
        tracing::debug!(conversation_id = %id, "created conversation");
        id
    }

    /// Moves the current pointer. Unknown ids leave the store untouched and return `false`.
    pub fn select(&mut self, id: ConversationId) -> bool {
        if self.get(id).is_none() {
            tracing::debug!(conversation_id = %id, "ignoring selection of unknown conversation");
            return false;
        }

        self.current = Some(id);
        true
    }

    /// Removes a conversation, repairing the current pointer when it referenced it.
    pub fn remove(&mut self, id: ConversationId) -> bool {
        let Some(position) = self.position(id) else {
            return false;
        };

        self.conversations.remove(position);
        if self.current == Some(id) {
            self.current = self.conversations.first().map(|conversation| conversation.id);
        }

        tracing::debug!(
            conversation_id = %id,
            remaining = self.conversations.len(),
            current = ?self.current,
            "removed conversation"
        );
        true
    }

    /// Appends to the target conversation; the first message also fixes the title.
    pub fn append_message(
        &mut self,
        conversation_id: ConversationId,
        message: Message,
    ) -> StoreResult<()> {
        let conversation = self
            .conversations
            .iter_mut()
            .find(|conversation| conversation.id == conversation_id)
            .context(ConversationNotFoundSnafu {
                stage: "append-message",
                conversation_id,
            })?;

        if conversation.messages.is_empty() {
            conversation.title = derive_title(&message.content);
        }
        conversation.messages.push(message);
        Ok(())
    }

    pub fn alloc_message_id(&mut self) -> MessageId {
        self.next_message_id = self.next_message_id.saturating_add(1);
        MessageId::new(self.next_message_id)
    }

    pub fn current_id(&self) -> Option<ConversationId> {
        self.current
    }

    pub fn current(&self) -> Option<&Conversation> {
        self.current.and_then(|id| self.get(id))
    }

    pub fn get(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|conversation| conversation.id == id)
    }

    fn position(&self, id: ConversationId) -> Option<usize> {
        self.conversations
            .iter()
            .position(|conversation| conversation.id == id)
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::{DEFAULT_CONVERSATION_TITLE, TITLE_MAX_CHARS};

    fn pointer_is_valid(store: &ConversationStore) -> bool {
        match store.current_id() {
            Some(id) => store.get(id).is_some(),
            None => store.is_empty(),
        }
    }

    #[test]
    fn bootstrap_holds_one_selected_empty_conversation() {
        let store = ConversationStore::bootstrap();
        assert_eq!(store.len(), 1);

        let current = store.current().expect("bootstrap selects its conversation");
        assert_eq!(current.title, DEFAULT_CONVERSATION_TITLE);
        assert!(current.is_empty());
    }

    #[test]
    fn create_appends_in_order_and_selects() {
        let mut store = ConversationStore::bootstrap();
        let first = store.current_id().unwrap();
        let second = store.create();

        assert_eq!(store.current_id(), Some(second));
        let order = store
            .conversations()
            .iter()
            .map(|conversation| conversation.id)
            .collect::<Vec<_>>();
        assert_eq!(order, vec![first, second]);
    }

    #[test]
    fn select_unknown_id_is_a_no_op() {
        let mut store = ConversationStore::bootstrap();
        let current = store.current_id();

        assert!(!store.select(ConversationId::new(999)));
        assert_eq!(store.current_id(), current);
    }

    #[test]
    fn removing_current_of_two_selects_the_other() {
        let mut store = ConversationStore::bootstrap();
        let first = store.current_id().unwrap();
        let second = store.create();

        assert!(store.remove(second));
        assert_eq!(store.current_id(), Some(first));
    }

    #[test]
    fn removing_the_only_conversation_clears_current() {
        let mut store = ConversationStore::bootstrap();
        let only = store.current_id().unwrap();

        assert!(store.remove(only));
        assert!(store.is_empty());
        assert_eq!(store.current_id(), None);
        assert!(store.current().is_none());
    }

    #[test]
    fn removing_a_non_current_conversation_keeps_pointer() {
        let mut store = ConversationStore::bootstrap();
        let first = store.current_id().unwrap();
        let second = store.create();

        assert!(store.remove(first));
        assert_eq!(store.current_id(), Some(second));
        assert!(!store.remove(first));
    }

    #[test]
    fn pointer_stays_valid_across_mixed_create_remove_sequences() {
        let mut store = ConversationStore::new();
        assert!(pointer_is_valid(&store));

        // Deterministic LCG drives a long mixed sequence of operations.
        let mut seed: u64 = 0x5eed;
        for _ in 0..500 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let roll = (seed >> 33) % 4;

            if roll == 0 || store.is_empty() {
                store.create();
            } else {
                let ids = store
                    .conversations()
                    .iter()
                    .map(|conversation| conversation.id)
                    .collect::<Vec<_>>();
                let victim = ids[(seed >> 40) as usize % ids.len()];
                if roll == 1 {
                    store.select(victim);
                } else {
                    store.remove(victim);
                }
            }

            assert!(pointer_is_valid(&store));
        }
    }

    #[test]
    fn first_message_sets_title_and_later_ones_do_not() {
        let mut store = ConversationStore::bootstrap();
        let id = store.current_id().unwrap();

        let first_id = store.alloc_message_id();
        store
            .append_message(
                id,
                Message::user(first_id, "A first message that is rather long indeed"),
            )
            .unwrap();
        let title = store.get(id).unwrap().title.clone();
        assert_eq!(title, "A first message that is rather");
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS);

        let second_id = store.alloc_message_id();
        store
            .append_message(id, Message::assistant(second_id, "Something else"))
            .unwrap();
        assert_eq!(store.get(id).unwrap().title, title);
        assert!(first_id < second_id);
    }

    #[test]
    fn append_to_missing_conversation_fails() {
        let mut store = ConversationStore::new();
        let message_id = store.alloc_message_id();
        let error = store
            .append_message(ConversationId::new(7), Message::user(message_id, "hi"))
            .unwrap_err();

        assert!(matches!(
            error,
            StoreError::ConversationNotFound { conversation_id, .. }
                if conversation_id == ConversationId::new(7)
        ));
    }
}
