//! Session model — one onboarding conversation's state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{FieldKey, Slots, score};

/// Session lifecycle status.
///
/// Sessions are created Active (collecting), and reach exactly one of the
/// two terminal states: Complete when the schema is sufficiently filled,
/// Abandoned on idle timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Complete,
    Abandoned,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Complete => "complete",
            Self::Abandoned => "abandoned",
        };
        write!(f, "{s}")
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Agent,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Agent,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One onboarding session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub label: String,
    pub status: SessionStatus,
    pub turns: Vec<Turn>,
    pub slots: Slots,
    /// Pure function of `slots`; recomputed by [`Session::push_user_turn`]
    /// and [`Session::merge_slots`], never hand-set.
    pub completeness: u8,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(label: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            status: SessionStatus::Active,
            turns: Vec::new(),
            slots: Slots::new(),
            completeness: 0,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn push_user_turn(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::user(text));
        self.last_activity = Utc::now();
    }

    pub fn push_agent_turn(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::agent(text));
        self.last_activity = Utc::now();
    }

    /// Merge extracted slots and recompute the completeness score.
    pub fn merge_slots(&mut self, extracted: Slots) {
        self.slots.merge(extracted);
        self.completeness = score(&self.slots);
    }

    /// Whether the completion condition holds: score at or above the
    /// threshold AND every required field non-empty. Both directions
    /// matter — a high score alone is not sufficient.
    pub fn meets_completion(&self, threshold: u8) -> bool {
        self.completeness >= threshold && self.slots.missing_required().is_empty()
    }

    pub fn mark_complete(&mut self) {
        self.status = SessionStatus::Complete;
        self.last_activity = Utc::now();
    }

    pub fn mark_abandoned(&mut self) {
        self.status = SessionStatus::Abandoned;
    }

    /// Idle duration since the last turn.
    pub fn idle_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_activity
    }

    /// The client name, once collected.
    pub fn client_name(&self) -> Option<&str> {
        self.slots.get(FieldKey::ClientName).and_then(|v| v.as_text())
    }

    /// Render the conversation as a transcript, one line per turn.
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|turn| {
                let speaker = match turn.speaker {
                    Speaker::User => "User",
                    Speaker::Agent => "Agent",
                };
                format!("{speaker}: {}", turn.text)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SlotValue;

    fn session_with_required() -> Session {
        let mut session = Session::new("demo");
        let mut slots = Slots::new();
        slots.insert(FieldKey::ClientName, SlotValue::text("Acme Corp"));
        slots.insert(FieldKey::Industry, SlotValue::text("Automotive"));
        slots.insert(FieldKey::ProblemStatement, SlotValue::text("manual leads"));
        session.merge_slots(slots);
        session
    }

    #[test]
    fn new_session_is_active_and_empty() {
        let session = Session::new("demo");
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.completeness, 0);
        assert!(session.turns.is_empty());
        assert!(!session.status.is_terminal());
    }

    #[test]
    fn merge_recomputes_completeness() {
        let session = session_with_required();
        assert_eq!(session.completeness, 70);
    }

    #[test]
    fn completion_needs_both_score_and_required_fields() {
        let mut session = Session::new("demo");
        // Fill all optional fields plus two required: score = 30 + 45 = 75
        let mut slots = Slots::new();
        slots.insert(FieldKey::ClientName, SlotValue::text("Acme"));
        slots.insert(FieldKey::Industry, SlotValue::text("Retail"));
        slots.insert(FieldKey::TechStack, SlotValue::List(vec!["React".into()]));
        slots.insert(FieldKey::Timeline, SlotValue::text("Q3"));
        slots.insert(FieldKey::Budget, SlotValue::text("50k"));
        slots.insert(
            FieldKey::Stakeholders,
            SlotValue::Stakeholders(vec![crate::schema::Stakeholder {
                name: "Sam".into(),
                role: "PM".into(),
            }]),
        );
        slots.insert(FieldKey::Regions, SlotValue::List(vec!["NA".into()]));
        session.merge_slots(slots);

        // High-ish score but problem_statement missing — must not complete
        // even against a low threshold.
        assert!(!session.meets_completion(75));

        let mut more = Slots::new();
        more.insert(FieldKey::ProblemStatement, SlotValue::text("abandonment"));
        session.merge_slots(more);
        assert_eq!(session.completeness, 100);
        assert!(session.meets_completion(90));
    }

    #[test]
    fn required_only_does_not_meet_default_threshold() {
        let session = session_with_required();
        assert!(!session.meets_completion(90));
        assert!(session.meets_completion(70));
    }

    #[test]
    fn turns_preserve_order() {
        let mut session = Session::new("demo");
        session.push_agent_turn("hello");
        session.push_user_turn("hi, we're Acme");
        session.push_agent_turn("great");
        assert_eq!(session.turns.len(), 3);
        assert_eq!(session.turns[0].speaker, Speaker::Agent);
        assert_eq!(session.turns[1].speaker, Speaker::User);
        assert_eq!(session.turns[1].text, "hi, we're Acme");
    }

    #[test]
    fn transcript_format() {
        let mut session = Session::new("demo");
        session.push_agent_turn("Welcome!");
        session.push_user_turn("Hello");
        let transcript = session.transcript();
        assert!(transcript.starts_with("Agent: Welcome!"));
        assert!(transcript.contains("User: Hello"));
    }

    #[test]
    fn terminal_states() {
        let mut session = Session::new("demo");
        session.mark_complete();
        assert!(session.status.is_terminal());

        let mut session = Session::new("demo");
        session.mark_abandoned();
        assert_eq!(session.status, SessionStatus::Abandoned);
        assert!(session.status.is_terminal());
    }

    #[test]
    fn status_serde_matches_display() {
        for status in [
            SessionStatus::Active,
            SessionStatus::Complete,
            SessionStatus::Abandoned,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }
}
