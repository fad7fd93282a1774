use std::time::Instant;

use serenity_llm::{FailureKind, GatewayReply, GatewayResult, MessageGateway, ProviderMessage};

use super::input::{EnterAction, InputBuffer};
use super::message::{Conversation, ConversationId, Message, MessageId, Role};
use super::store::ConversationStore;

/// Identifier for one accepted send.
///
/// This changes on every submission so a reply for an abandoned request can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubmissionId(pub u64);

impl SubmissionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Bookkeeping for the single pending gateway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    pub submission_id: SubmissionId,
    pub conversation_id: ConversationId,
    pub started_at: Instant,
}

/// Session-wide request state. At most one submission is pending at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchState {
    #[default]
    Idle,
    Submitting(InFlight),
}

impl DispatchState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn in_flight(&self) -> Option<InFlight> {
        match self {
            Self::Idle => None,
            Self::Submitting(in_flight) => Some(*in_flight),
        }
    }
}

/// Why a send attempt did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    EmptyInput,
    RequestInFlight,
    NoActiveConversation,
}

/// An accepted send: the user turn is already in the conversation and `history` is the
/// context to hand to the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub id: SubmissionId,
    pub conversation_id: ConversationId,
    pub user_message_id: MessageId,
    pub history: Vec<ProviderMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Replied {
        conversation_id: ConversationId,
        message_id: MessageId,
    },
    /// The gateway failed and the fallback reply was appended.
    Failed {
        conversation_id: ConversationId,
        message_id: MessageId,
        kind: FailureKind,
    },
    /// The target conversation was removed before the reply arrived.
    ConversationGone { conversation_id: ConversationId },
    /// The submission was abandoned before it completed.
    Stale { submission_id: SubmissionId },
    Rejected(SubmitRejection),
}

/// Resets the request state when dropped, including when a pending `send` is cancelled.
struct InFlightGuard<'a> {
    state: &'a mut DispatchState,
}

impl<'a> InFlightGuard<'a> {
    fn new(state: &'a mut DispatchState) -> Self {
        Self { state }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let DispatchState::Submitting(in_flight) = *self.state {
            tracing::debug!(
                submission_id = in_flight.submission_id.0,
                elapsed_ms = in_flight.started_at.elapsed().as_millis() as u64,
                "request settled"
            );
        }
        *self.state = DispatchState::Idle;
    }
}

/// Owns conversation state, the composing input and the request lifecycle.
pub struct ChatSession {
    store: ConversationStore,
    input: InputBuffer,
    state: DispatchState,
    gateway: MessageGateway,
    model_id: String,
    next_submission_id: u64,
}

impl ChatSession {
    /// Session with one empty conversation selected.
    pub fn new(gateway: MessageGateway, model_id: impl Into<String>) -> Self {
        Self::with_store(ConversationStore::bootstrap(), gateway, model_id)
    }

    pub fn with_store(
        store: ConversationStore,
        gateway: MessageGateway,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            input: InputBuffer::new(),
            state: DispatchState::Idle,
            gateway,
            model_id: model_id.into(),
            next_submission_id: 1,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn input(&self) -> &InputBuffer {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputBuffer {
        &mut self.input
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn gateway(&self) -> &MessageGateway {
        &self.gateway
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn set_model_id(&mut self, model_id: impl Into<String>) {
        self.model_id = model_id.into();
    }

    pub fn current_conversation(&self) -> Option<&Conversation> {
        self.store.current()
    }

    pub fn create_conversation(&mut self) -> ConversationId {
        self.store.create()
    }

    pub fn select_conversation(&mut self, id: ConversationId) -> bool {
        self.store.select(id)
    }

    /// A pending reply for a removed conversation is dropped when it arrives.
    pub fn remove_conversation(&mut self, id: ConversationId) -> bool {
        self.store.remove(id)
    }

    /// True when a send right now would be accepted.
    pub fn can_submit(&self) -> bool {
        self.check_submit().is_ok()
    }

    fn check_submit(&self) -> Result<ConversationId, SubmitRejection> {
        if self.input.is_blank() {
            return Err(SubmitRejection::EmptyInput);
        }
        if !self.state.is_idle() {
            return Err(SubmitRejection::RequestInFlight);
        }
        self.store
            .current_id()
            .ok_or(SubmitRejection::NoActiveConversation)
    }

    /// Idle -> Submitting: appends the user turn, clears the input and captures history.
    pub fn begin_submit(&mut self) -> Result<Submission, SubmitRejection> {
        let conversation_id = self.check_submit()?;

        let user_message_id = self.store.alloc_message_id();
        let message = Message::user(user_message_id, self.input.text());
        if let Err(error) = self.store.append_message(conversation_id, message) {
            tracing::warn!(error = %error, "current conversation vanished before submit");
            return Err(SubmitRejection::NoActiveConversation);
        }
        self.input.clear();

        let history = self
            .store
            .get(conversation_id)
            .map(build_history)
            .unwrap_or_default();

        let submission_id = SubmissionId::new(self.next_submission_id);
        // Submission ids are never reused.
        self.next_submission_id = self.next_submission_id.saturating_add(1);

        self.state = DispatchState::Submitting(InFlight {
            submission_id,
            conversation_id,
            started_at: Instant::now(),
        });

        tracing::info!(
            conversation_id = %conversation_id,
            submission_id = submission_id.0,
            history_len = history.len(),
            model_id = %self.model_id,
            "submitting message"
        );

        Ok(Submission {
            id: submission_id,
            conversation_id,
            user_message_id,
            history,
        })
    }

    /// Submitting -> Idle: appends the reply (or the fallback) to the submission's conversation.
    pub fn complete_submit(
        &mut self,
        submission: Submission,
        result: GatewayResult<String>,
    ) -> SendOutcome {
        let active = self.state.in_flight().map(|in_flight| in_flight.submission_id);
        if active != Some(submission.id) {
            tracing::warn!(
                submission_id = submission.id.0,
                active = ?active,
                "discarding reply for a submission that is no longer active"
            );
            return SendOutcome::Stale {
                submission_id: submission.id,
            };
        }

        let outcome = Self::reconcile(&mut self.store, &submission, result);
        self.state = DispatchState::Idle;
        outcome
    }

    /// Cancellation hook: returns to Idle without appending anything.
    pub fn abandon(&mut self) -> Option<InFlight> {
        let in_flight = self.state.in_flight()?;
        self.state = DispatchState::Idle;
        tracing::info!(
            conversation_id = %in_flight.conversation_id,
            submission_id = in_flight.submission_id.0,
            "abandoned pending request"
        );
        Some(in_flight)
    }

    /// Runs one full submission. Dropping the returned future abandons the request.
    pub async fn send(&mut self) -> SendOutcome {
        let submission = match self.begin_submit() {
            Ok(submission) => submission,
            Err(rejection) => {
                tracing::debug!(?rejection, "send rejected");
                return SendOutcome::Rejected(rejection);
            }
        };

        let _in_flight = InFlightGuard::new(&mut self.state);
        let result = self
            .gateway
            .complete(&submission.history, &self.model_id)
            .await;
        Self::reconcile(&mut self.store, &submission, result)
    }

    /// Enter submits; Shift+Enter inserts a line break and never submits.
    pub async fn press_enter(&mut self, shift: bool) -> Option<SendOutcome> {
        match self.input.press_enter(shift) {
            EnterAction::Newline => None,
            EnterAction::Submit => Some(self.send().await),
        }
    }

    fn reconcile(
        store: &mut ConversationStore,
        submission: &Submission,
        result: GatewayResult<String>,
    ) -> SendOutcome {
        let conversation_id = submission.conversation_id;
        let message_id = store.alloc_message_id();

        let failure = result.as_ref().err().map(|error| {
            let kind = error.kind();
            tracing::warn!(
                conversation_id = %conversation_id,
                kind = %kind,
                error = %error,
                "gateway failed; appending fallback reply"
            );
            kind
        });

        let text = result.text_or_fallback();
        let message = match failure {
            None => Message::assistant(message_id, text),
            Some(kind) => Message::assistant_failed(message_id, text, kind),
        };

        if let Err(error) = store.append_message(conversation_id, message) {
            tracing::warn!(error = %error, "dropping reply for a removed conversation");
            return SendOutcome::ConversationGone { conversation_id };
        }

        match failure {
            None => SendOutcome::Replied {
                conversation_id,
                message_id,
            },
            Some(kind) => SendOutcome::Failed {
                conversation_id,
                message_id,
                kind,
            },
        }
    }
}

/// Ordered `{content, role}` pairs of every message, empty replies included.
fn build_history(conversation: &Conversation) -> Vec<ProviderMessage> {
    conversation
        .messages
        .iter()
        .map(|message| {
            // Keep role mapping explicit at the crate boundary so llm types stay
            // decoupled from chat domain enums.
            let role = match message.role {
                Role::User => serenity_llm::Role::User,
                Role::Assistant => serenity_llm::Role::Assistant,
            };
            ProviderMessage::new(role, message.content.clone())
        })
        .collect()
}
