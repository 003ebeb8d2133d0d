//! Conversation step — a chat with the automation backend that builds the
//! user's profile.
//!
//! Phases: `GreetingPending → Active ⇄ Confirming → Complete`, with an error
//! overlay on top of whichever phase issued the failed call. A relay call is
//! split into [`prepare_*`](ConversationStep::prepare_send) (validate, record
//! the outbound message, hand back an [`Exchange`]) and
//! [`apply`](ConversationStep::apply) (fold the reply back in). A reply whose
//! exchange no longer matches the step is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::controller::WizardController;
use super::model::ConversationMessage;
use crate::error::{RelayError, ValidationError};
use crate::relay::{
    CallState, ChatContext, ChatRelay, ChatReply, ChatRequest, ChatStatus, bounded,
    spawn_best_effort,
};
use crate::session::SessionId;

/// Synthetic opener sent on first entry. Not added to the log.
pub const GREETING_MESSAGE: &str = "Hi, I just signed up!";

/// Sent when the user accepts what the assistant asked to confirm.
pub const ACCEPT_MESSAGE: &str = "Yes, that's right!";

/// Local assistant line shown after cancelling a confirmation.
pub const CANCEL_PROMPT: &str = "No problem. What would you like to change?";

/// Sent to the backend when the user skips the conversation.
pub const SKIP_MESSAGE: &str = "[User skipped the conversation]";

/// Overlay text when the greeting fails.
pub const GREETING_ERROR: &str = "Could not connect to the assistant. You can skip this step.";

static NEXT_EXCHANGE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationPhase {
    GreetingPending,
    Active,
    Confirming,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Greeting,
    Message,
    Accept,
}

/// One outbound chat call, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    id: u64,
    kind: ExchangeKind,
    session_id: SessionId,
    step_index: usize,
    pub request: ChatRequest,
}

impl Exchange {
    fn new(kind: ExchangeKind, wizard: &WizardController, request: ChatRequest) -> Self {
        Self {
            id: NEXT_EXCHANGE_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            session_id: wizard.session_id().clone(),
            step_index: wizard.current_step(),
            request,
        }
    }

    pub fn kind(&self) -> ExchangeKind {
        self.kind
    }
}

/// Result of folding a reply into the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Updated(ConversationPhase),
    /// The step moved on; the reply was ignored.
    Stale,
}

#[derive(Debug)]
pub struct ConversationStep {
    phase: ConversationPhase,
    call: CallState,
    error: Option<&'static str>,
    /// The in-flight (or last failed) exchange, kept for retry.
    pending: Option<Exchange>,
    quick_replies: Vec<String>,
}

impl ConversationStep {
    /// Enter the step, picking the phase from what the wizard already has.
    pub fn enter(wizard: &WizardController) -> Self {
        let state = wizard.state();
        let phase = if state.conversation_done {
            ConversationPhase::Complete
        } else if state.conversation_messages.is_empty() {
            ConversationPhase::GreetingPending
        } else {
            ConversationPhase::Active
        };
        Self {
            phase,
            call: CallState::Idle,
            error: None,
            pending: None,
            quick_replies: Vec::new(),
        }
    }

    pub fn phase(&self) -> ConversationPhase {
        self.phase
    }

    pub fn call_state(&self) -> &CallState {
        &self.call
    }

    /// Error overlay text, if the last call failed.
    pub fn error(&self) -> Option<&'static str> {
        self.error
    }

    pub fn quick_replies(&self) -> &[String] {
        &self.quick_replies
    }

    /// Whether the input should be disabled.
    pub fn is_busy(&self) -> bool {
        self.call.is_pending()
    }

    // ── Outbound ────────────────────────────────────────────────────

    /// The automatic opening exchange. Only available before any message
    /// exists in the log.
    pub fn prepare_greeting(&mut self, wizard: &WizardController) -> Result<Exchange, ValidationError> {
        if self.phase != ConversationPhase::GreetingPending
            || !wizard.state().conversation_messages.is_empty()
        {
            return Err(ValidationError::ConversationClosed);
        }
        let request = self.base_request(wizard, GREETING_MESSAGE, true);
        self.start(Exchange::new(ExchangeKind::Greeting, wizard, request))
    }

    /// Record the user's message and build the exchange that sends it.
    pub async fn prepare_send(
        &mut self,
        wizard: &mut WizardController,
        text: &str,
    ) -> Result<Exchange, ValidationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        if self.phase != ConversationPhase::Active {
            return Err(ValidationError::ConversationClosed);
        }
        if self.call.is_pending() {
            return Err(ValidationError::RequestInFlight);
        }

        let first = wizard.state().conversation_messages.is_empty();
        let request = self.base_request(wizard, text, first);
        wizard
            .add_conversation_message(ConversationMessage::user(text))
            .await;
        self.quick_replies.clear();
        self.start(Exchange::new(ExchangeKind::Message, wizard, request))
    }

    /// Accept the assistant's confirmation request.
    pub async fn accept(&mut self, wizard: &mut WizardController) -> Result<Exchange, ValidationError> {
        if self.phase != ConversationPhase::Confirming {
            return Err(ValidationError::ConversationClosed);
        }
        if self.call.is_pending() {
            return Err(ValidationError::RequestInFlight);
        }
        let request = self.base_request(wizard, ACCEPT_MESSAGE, false);
        wizard
            .add_conversation_message(ConversationMessage::user(ACCEPT_MESSAGE))
            .await;
        self.start(Exchange::new(ExchangeKind::Accept, wizard, request))
    }

    /// Decline the confirmation. Stays local: a prompt is appended and the
    /// text box comes back.
    pub async fn cancel(&mut self, wizard: &mut WizardController) -> Result<(), ValidationError> {
        if self.phase != ConversationPhase::Confirming || self.call.is_pending() {
            return Err(ValidationError::ConversationClosed);
        }
        wizard
            .add_conversation_message(ConversationMessage::assistant(CANCEL_PROMPT))
            .await;
        self.quick_replies.clear();
        self.phase = ConversationPhase::Active;
        Ok(())
    }

    /// Re-issue the last failed exchange. The log is left as it is, so the
    /// user's message is not sent twice into it.
    pub fn retry(&mut self, wizard: &WizardController) -> Result<Exchange, ValidationError> {
        if self.call.is_pending() {
            return Err(ValidationError::RequestInFlight);
        }
        let failed = match (&self.call, self.pending.take()) {
            (CallState::Failed(_), Some(exchange)) => exchange,
            (_, pending) => {
                self.pending = pending;
                return Err(ValidationError::ConversationClosed);
            }
        };
        self.error = None;
        self.start(Exchange::new(failed.kind, wizard, failed.request))
    }

    /// Skip the rest of the conversation. The backend is told in the
    /// background; the wizard moves on regardless of how that goes.
    pub async fn skip(
        &mut self,
        wizard: &mut WizardController,
        relay: Arc<dyn ChatRelay>,
    ) -> Result<JoinHandle<()>, ValidationError> {
        if self.phase == ConversationPhase::Complete {
            return Err(ValidationError::ConversationClosed);
        }

        let request = self.base_request(wizard, SKIP_MESSAGE, false).skipped();
        let timeout = wizard.config().relay_timeout;
        let notify = spawn_best_effort("chat-skip", async move {
            bounded(timeout, relay.send_message(&request))
                .await
                .map(|_| ())
        });

        info!(session_id = %wizard.session_id(), "Conversation skipped");
        self.phase = ConversationPhase::Complete;
        self.pending = None;
        self.error = None;
        self.call.reset();
        self.quick_replies.clear();

        wizard.set_conversation_done(true, None).await;
        wizard.next().await;
        Ok(notify)
    }

    // ── Inbound ─────────────────────────────────────────────────────

    /// Fold a relay outcome back into the step and the wizard.
    pub async fn apply(
        &mut self,
        wizard: &mut WizardController,
        exchange: &Exchange,
        result: Result<ChatReply, RelayError>,
    ) -> Applied {
        let current = self.pending.as_ref().map(|p| p.id) == Some(exchange.id)
            && exchange.session_id == *wizard.session_id()
            && exchange.step_index == wizard.current_step();
        if !current {
            debug!(
                session_id = %exchange.session_id,
                step = exchange.step_index,
                "Dropping stale chat reply"
            );
            return Applied::Stale;
        }

        self.call.settle(&result);
        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                warn!(session_id = %exchange.session_id, error = %e, "Chat relay failed");
                self.error = Some(match exchange.kind {
                    ExchangeKind::Greeting => GREETING_ERROR,
                    _ => RelayError::USER_MESSAGE,
                });
                return Applied::Updated(self.phase);
            }
        };

        self.pending = None;
        self.error = None;
        self.quick_replies = reply.quick_replies;
        wizard
            .add_conversation_message(ConversationMessage::assistant(reply.message))
            .await;

        self.phase = match reply.status {
            ChatStatus::Active => ConversationPhase::Active,
            ChatStatus::Confirming => ConversationPhase::Confirming,
            ChatStatus::Complete => {
                wizard.set_conversation_done(true, reply.profile).await;
                self.quick_replies.clear();
                info!(session_id = %exchange.session_id, "Conversation complete");
                return Applied::Updated(ConversationPhase::Complete);
            }
        };
        if let Some(profile) = reply.profile {
            wizard.set_profile(profile).await;
        }
        Applied::Updated(self.phase)
    }

    /// Send an exchange through the relay under the configured timeout and
    /// apply the outcome.
    pub async fn dispatch(
        &mut self,
        wizard: &mut WizardController,
        relay: &dyn ChatRelay,
        exchange: Exchange,
    ) -> Applied {
        let timeout = wizard.config().relay_timeout;
        let result = bounded(timeout, relay.send_message(&exchange.request)).await;
        self.apply(wizard, &exchange, result).await
    }

    /// Validate, record, send, and apply one user message.
    pub async fn send(
        &mut self,
        wizard: &mut WizardController,
        relay: &dyn ChatRelay,
        text: &str,
    ) -> Result<Applied, ValidationError> {
        let exchange = self.prepare_send(wizard, text).await?;
        Ok(self.dispatch(wizard, relay, exchange).await)
    }

    /// Run the greeting if it has not happened yet.
    pub async fn greet(
        &mut self,
        wizard: &mut WizardController,
        relay: &dyn ChatRelay,
    ) -> Result<Applied, ValidationError> {
        let exchange = self.prepare_greeting(wizard)?;
        Ok(self.dispatch(wizard, relay, exchange).await)
    }

    // ── Internals ───────────────────────────────────────────────────

    fn base_request(&self, wizard: &WizardController, message: &str, with_context: bool) -> ChatRequest {
        let state = wizard.state();
        let request = ChatRequest::new(state.session_id.clone(), message)
            .with_stripe_session(state.checkout_session_id.clone());
        if with_context {
            request.with_context(ChatContext::from_state(state))
        } else {
            request
        }
    }

    fn start(&mut self, exchange: Exchange) -> Result<Exchange, ValidationError> {
        if !self.call.begin() {
            return Err(ValidationError::RequestInFlight);
        }
        self.pending = Some(exchange.clone());
        Ok(exchange)
    }
}
