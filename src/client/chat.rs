//! Multi-turn streaming conversation.
//!
//! The session owns provider-side context (system prompt and committed turns). Each
//! `send` returns a forward-only stream of text deltas for that one message; callers
//! accumulate the deltas themselves. A failed stream yields its error once and ends,
//! and the failed exchange is not committed to history.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::{stream, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error_classification::classify;
use crate::drivers::GenerativeBackend;
use crate::error_code::FailureKind;
use crate::notify::{Notifier, Severity};
use crate::resilience::QuotaCooldown;
use crate::types::{GenerateRequest, Message};
use crate::{BoxStream, Error, Result};

const CHAT_FEATURE: &str = "chat";

/// Reference to the conversation started by one [`StreamingChatSession::start`] call.
///
/// Becomes stale as soon as the session is started again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationHandle {
    id: Uuid,
}

impl ConversationHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug)]
struct Conversation {
    id: Uuid,
    system_prompt: Option<String>,
    history: Vec<Message>,
}

type SharedConversation = Arc<Mutex<Option<Conversation>>>;

fn lock(state: &SharedConversation) -> MutexGuard<'_, Option<Conversation>> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Streaming chat on top of a [`GenerativeBackend`].
///
/// No retry loop: a failure ends that `send`, after being classified the same way the
/// executor does (quota errors activate the shared cooldown).
pub struct StreamingChatSession {
    backend: Option<Arc<dyn GenerativeBackend>>,
    model: String,
    temperature: Option<f32>,
    cooldown: QuotaCooldown,
    notifier: Arc<dyn Notifier>,
    state: SharedConversation,
}

impl StreamingChatSession {
    /// `backend` is `None` when no credential could be resolved; every `send` then fails
    /// with [`Error::NoCredential`].
    pub fn new(
        backend: Option<Arc<dyn GenerativeBackend>>,
        model: impl Into<String>,
        cooldown: QuotaCooldown,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            temperature: None,
            cooldown,
            notifier,
            state: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Start a fresh conversation, invalidating any previous handle.
    pub fn start(&self, system_prompt: impl Into<String>) -> ConversationHandle {
        let system_prompt = system_prompt.into();
        let id = Uuid::new_v4();
        let previous = lock(&self.state).replace(Conversation {
            id,
            system_prompt: (!system_prompt.trim().is_empty()).then_some(system_prompt),
            history: Vec::new(),
        });
        debug!(conversation = %id, replaced = previous.is_some(), "chat conversation started");
        ConversationHandle { id }
    }

    pub fn is_current(&self, handle: &ConversationHandle) -> bool {
        lock(&self.state).as_ref().is_some_and(|c| c.id == handle.id)
    }

    /// Committed turns of the current conversation (user and model alternating).
    pub fn history(&self) -> Vec<Message> {
        lock(&self.state)
            .as_ref()
            .map(|c| c.history.clone())
            .unwrap_or_default()
    }

    /// Send one user message and stream the reply.
    pub async fn send(
        &self,
        handle: &ConversationHandle,
        text: impl Into<String>,
    ) -> Result<BoxStream<'static, String>> {
        let text = text.into();

        let request = {
            let guard = lock(&self.state);
            let conversation = match guard.as_ref() {
                Some(c) if c.id == handle.id => c,
                _ => return Err(Error::StaleConversation),
            };
            let mut messages = conversation.history.clone();
            messages.push(Message::user(text.clone()));
            let mut request = GenerateRequest::new(self.model.clone(), messages);
            if let Some(system) = &conversation.system_prompt {
                request = request.system_instruction(system.clone());
            }
            if let Some(t) = self.temperature {
                request = request.temperature(t);
            }
            request
        };

        let Some(backend) = &self.backend else {
            let provider = crate::config::DEFAULT_PROVIDER_ID.to_string();
            self.notifier.notify(
                "No API key is configured for the AI service. Add one to use chat.",
                Severity::Error,
            );
            return Err(Error::NoCredential { provider });
        };

        if let Some(remaining) = self.cooldown.remaining() {
            let minutes = remaining.as_secs().div_ceil(60).max(1);
            self.notifier.notify(
                &format!(
                    "AI features are paused because the usage quota was exhausted. Chat is unavailable for about {} more minute{}.",
                    minutes,
                    if minutes == 1 { "" } else { "s" }
                ),
                Severity::Error,
            );
            return Err(Error::CooldownActive {
                remaining_ms: remaining.as_millis() as u64,
            });
        }

        let reporter = FailureReporter {
            cooldown: self.cooldown.clone(),
            notifier: Arc::clone(&self.notifier),
        };

        let inner = match backend.stream(&request).await {
            Ok(s) => s,
            Err(e) => {
                reporter.report(&e);
                return Err(e);
            }
        };

        let turn = PendingTurn {
            state: Arc::clone(&self.state),
            conversation: handle.id,
            user: text,
            reply: String::new(),
            reporter,
        };

        let deltas = stream::unfold((inner, Some(turn)), |(mut inner, turn)| async move {
            let mut turn = turn?;
            match inner.next().await {
                Some(Ok(delta)) => {
                    turn.reply.push_str(&delta);
                    Some((Ok(delta), (inner, Some(turn))))
                }
                Some(Err(e)) => {
                    turn.reporter.report(&e);
                    Some((Err(e), (inner, None)))
                }
                None => {
                    turn.commit();
                    None
                }
            }
        });
        Ok(Box::pin(deltas))
    }
}

struct FailureReporter {
    cooldown: QuotaCooldown,
    notifier: Arc<dyn Notifier>,
}

impl FailureReporter {
    /// Classify and emit exactly one notification.
    fn report(&self, err: &Error) {
        let class = classify(err);
        let kind = FailureKind::from_classification(&class);
        warn!(
            feature = CHAT_FEATURE,
            kind = kind.name(),
            status_code = class.status_code,
            error = %err,
            "chat stream failed"
        );
        match kind {
            FailureKind::QuotaExhausted => {
                if !self
                    .cooldown
                    .activate(Arc::clone(&self.notifier), Some(CHAT_FEATURE))
                {
                    self.notifier.notify(
                        &format!("AI quota exhausted during chat: {}", class.display_message),
                        Severity::Error,
                    );
                }
            }
            FailureKind::RateLimited => self.notifier.notify(
                "The AI service is busy (rate limited). Please wait a moment and send again.",
                Severity::Error,
            ),
            _ => self.notifier.notify(
                &format!("Chat failed: {}", class.display_message),
                Severity::Error,
            ),
        }
    }
}

struct PendingTurn {
    state: SharedConversation,
    conversation: Uuid,
    user: String,
    reply: String,
    reporter: FailureReporter,
}

impl PendingTurn {
    fn commit(self) {
        let mut guard = lock(&self.state);
        match guard.as_mut() {
            Some(c) if c.id == self.conversation => {
                c.history.push(Message::user(self.user));
                c.history.push(Message::model(self.reply));
                info!(conversation = %c.id, turns = c.history.len() / 2, "chat turn committed");
            }
            // Restarted while streaming; the old conversation is gone.
            _ => debug!(conversation = %self.conversation, "dropping reply for stale conversation"),
        }
    }
}
