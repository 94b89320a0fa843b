//! Conversation engine — the slot-filling state machine behind the API.
//!
//! Sessions live in memory behind per-session mutexes: exactly one
//! `send_message` call may hold a session at a time, a concurrent caller
//! gets `SessionBusy` instead of queueing. On completion the session is
//! handed off to the orchestrator queue and the engine replies immediately.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::OnboardConfig;
use crate::error::{Result, SessionError};
use crate::extract;
use crate::llm::{ChatMessage, CompletionRequest, TextInference};
use crate::orchestrator::Orchestrator;
use crate::schema::{FieldKey, Slots};
use crate::session::{Session, SessionStatus, Speaker};

/// How often the idle sweeper wakes up.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Pure small talk that should not trigger an extraction round-trip.
const NOISE_UTTERANCES: &[&str] = &[
    "hi", "hello", "hey", "yo", "thanks", "thank you", "ok", "okay", "cool", "great", "sure",
    "yes", "no", "bye", "goodbye",
];

/// Reply to one user message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReply {
    pub message: String,
    pub completion_percentage: u8,
    pub is_complete: bool,
    /// Everything collected so far.
    pub client_info: Slots,
    /// Set once the session completes and a run has been enqueued.
    pub run_id: Option<Uuid>,
}

pub struct ConversationEngine {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>,
    llm: Arc<dyn TextInference>,
    orchestrator: Arc<Orchestrator>,
    config: OnboardConfig,
}

impl ConversationEngine {
    pub fn new(
        llm: Arc<dyn TextInference>,
        orchestrator: Arc<Orchestrator>,
        config: OnboardConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            llm,
            orchestrator,
            config,
        })
    }

    /// Allocate a session and produce the opening greeting.
    pub async fn start_session(&self, label: &str) -> (Uuid, String) {
        let mut session = Session::new(label);
        let greeting = self.greeting(label).await;
        session.push_agent_turn(&greeting);

        let id = session.id;
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        info!(session_id = %id, label, "Session started");
        (id, greeting)
    }

    /// Process one user utterance.
    ///
    /// Errors with `UnknownSession` for absent or terminal sessions and
    /// `SessionBusy` when another call holds the session lock.
    pub async fn send_message(&self, session_id: Uuid, utterance: &str) -> Result<TurnReply> {
        let handle = self
            .sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or(SessionError::UnknownSession { id: session_id })?;

        // Exactly one concurrent caller wins the session.
        let mut session = handle
            .try_lock()
            .map_err(|_| SessionError::SessionBusy { id: session_id })?;

        if session.status.is_terminal() {
            return Err(SessionError::UnknownSession { id: session_id }.into());
        }

        session.push_user_turn(utterance);

        if is_noise(utterance) {
            debug!(session_id = %session_id, "Small-talk turn, skipping extraction");
            let message = format!(
                "Happy to help! To keep things moving, could you tell me {}?",
                next_ask(&session.slots)
            );
            session.push_agent_turn(&message);
            return Ok(reply(&session, message, None));
        }

        let history: Vec<ChatMessage> = session
            .turns
            .iter()
            .map(|turn| match turn.speaker {
                Speaker::User => ChatMessage::user(&turn.text),
                Speaker::Agent => ChatMessage::assistant(&turn.text),
            })
            .collect();

        let extracted = extract::extract(
            &self.llm,
            utterance,
            &session.slots,
            &history,
            self.config.turn_timeout,
        )
        .await;
        session.merge_slots(extracted);

        if session.meets_completion(self.config.completion_threshold) {
            session.mark_complete();
            let run_id = self.hand_off(&session).await;
            let message = self.completion_ack(&session).await;
            session.push_agent_turn(&message);
            info!(
                session_id = %session_id,
                completeness = session.completeness,
                "Session complete, orchestration handed off"
            );
            return Ok(reply(&session, message, run_id));
        }

        let message = self.follow_up(&session).await;
        session.push_agent_turn(&message);
        Ok(reply(&session, message, None))
    }

    /// Snapshot a session for inspection.
    pub async fn session(&self, session_id: Uuid) -> Result<Session> {
        let handle = self
            .sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or(SessionError::UnknownSession { id: session_id })?;
        let session = handle.lock().await;
        Ok(session.clone())
    }

    /// One sweep: idle Active sessions become Abandoned, terminal sessions
    /// past the retention window are evicted.
    pub async fn sweep_idle(&self) {
        let now = Utc::now();
        let idle = chrono::Duration::from_std(self.config.idle_window)
            .unwrap_or_else(|_| chrono::Duration::minutes(30));
        let retention = chrono::Duration::from_std(self.config.retention_window)
            .unwrap_or_else(|_| chrono::Duration::minutes(15));

        let handles: Vec<(Uuid, Arc<Mutex<Session>>)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, handle)| (*id, Arc::clone(handle)))
            .collect();

        let mut evict = Vec::new();
        for (id, handle) in handles {
            // A held lock means a turn is in flight: skip rather than stall
            // the sweep or race the caller.
            let Ok(mut session) = handle.try_lock() else {
                continue;
            };
            match session.status {
                SessionStatus::Active => {
                    if session.idle_for(now) > idle {
                        session.mark_abandoned();
                        warn!(session_id = %id, "Session abandoned after idle window");
                    }
                }
                SessionStatus::Complete | SessionStatus::Abandoned => {
                    if session.idle_for(now) > retention {
                        evict.push(id);
                    }
                }
            }
        }

        if !evict.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in &evict {
                sessions.remove(id);
            }
            info!(count = evict.len(), "Evicted terminal sessions");
        }

        self.orchestrator.sweep_runs().await;
    }

    async fn hand_off(&self, session: &Session) -> Option<Uuid> {
        let client_name = session
            .client_name()
            .unwrap_or(&session.label)
            .to_string();
        match self
            .orchestrator
            .submit(
                session.id,
                client_name,
                session.slots.clone(),
                session.transcript(),
            )
            .await
        {
            Ok(run_id) => Some(run_id),
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Orchestration handoff failed");
                None
            }
        }
    }

    async fn greeting(&self, label: &str) -> String {
        let fields: Vec<&str> = FieldKey::ALL.iter().map(|k| k.ask_hint()).collect();
        let request = CompletionRequest::new(vec![
            ChatMessage::system(
                "You are a friendly onboarding assistant for a programme delivery team. \
                 Greet the user in at most three sentences and invite them to describe \
                 their project.",
            ),
            ChatMessage::user(format!(
                "Session label: {label}. Over the conversation you will collect: {}.",
                fields.join("; ")
            )),
        ])
        .with_max_tokens(256);

        self.compose(
            request,
            "Hi! I'm here to get your programme onboarding started. Tell me a bit \
             about your company and the challenge you'd like us to tackle."
                .to_string(),
        )
        .await
    }

    /// Run one reply-generation inference call, degrading to canned text
    /// when the provider fails, times out, or returns nothing.
    async fn compose(&self, request: CompletionRequest, fallback: String) -> String {
        match tokio::time::timeout(self.config.turn_timeout, self.llm.complete(request)).await {
            Ok(Ok(completion)) if !completion.content.trim().is_empty() => {
                completion.content.trim().to_string()
            }
            _ => {
                debug!("Reply inference unavailable, using canned reply");
                fallback
            }
        }
    }

    /// Follow-up question for the next missing field, phrased by the
    /// inference capability.
    async fn follow_up(&self, session: &Session) -> String {
        let ask = next_ask(&session.slots);
        let fallback = format!(
            "Got it — you're at {}% complete. Could you tell me {ask}?",
            session.completeness
        );
        let request = CompletionRequest::new(vec![
            ChatMessage::system(
                "You are a friendly onboarding assistant for a programme delivery team. \
                 Write the next reply to the user: briefly acknowledge what they shared, \
                 then ask one concise question for the requested detail.",
            ),
            ChatMessage::user(format!(
                "Onboarding is {}% complete. Ask the user for {ask}.",
                session.completeness
            )),
        ])
        .with_max_tokens(256);

        self.compose(request, fallback).await
    }

    /// Completion acknowledgement, phrased by the inference capability.
    async fn completion_ack(&self, session: &Session) -> String {
        let client = session.client_name().unwrap_or("your team").to_string();
        let fallback = format!(
            "Thank you! I have everything I need — onboarding for {client} is complete \
             and our analysis is underway."
        );
        let request = CompletionRequest::new(vec![
            ChatMessage::system(
                "You are a friendly onboarding assistant for a programme delivery team. \
                 Write the next reply to the user: thank them and confirm, in at most \
                 two sentences, that onboarding is complete and analysis is underway.",
            ),
            ChatMessage::user(format!("Onboarding for {client} is now complete.")),
        ])
        .with_max_tokens(256);

        self.compose(request, fallback).await
    }
}

fn reply(session: &Session, message: String, run_id: Option<Uuid>) -> TurnReply {
    TurnReply {
        message,
        completion_percentage: session.completeness,
        is_complete: session.status == SessionStatus::Complete,
        client_info: session.slots.clone(),
        run_id,
    }
}

fn next_ask(slots: &Slots) -> &'static str {
    match slots.next_missing() {
        Some(key) => key.ask_hint(),
        None => "anything else you'd like us to know",
    }
}

fn is_noise(utterance: &str) -> bool {
    let trimmed = utterance
        .trim()
        .trim_matches(|c: char| c.is_ascii_punctuation())
        .to_lowercase();
    NOISE_UTTERANCES.contains(&trimmed.as_str())
}

/// Spawn the periodic idle sweep.
pub fn spawn_idle_sweeper(engine: Arc<ConversationEngine>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval = ?SWEEP_INTERVAL, "Idle sweeper started");
        let mut tick = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tick.tick().await;
            engine.sweep_idle().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_detection() {
        assert!(is_noise("hi"));
        assert!(is_noise("  Thanks!  "));
        assert!(is_noise("OK."));
        assert!(!is_noise("hi, we are Acme Corp"));
        assert!(!is_noise("our budget is 50k"));
    }
}
