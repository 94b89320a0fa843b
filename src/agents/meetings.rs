//! Meetings agent — transcript sentiment, action items, and engagement.
//!
//! Sentiment uses a small word lexicon: polarity is the signed share of
//! positive vs negative tokens, clamped to [-1, 1], with the usual ±0.1
//! neutral band.

use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde_json::{Value, json};
use tracing::info;

use crate::error::AgentError;

use super::{AgentInput, AgentKind, SpecialistAgent};

const POSITIVE_WORDS: &[&str] = &[
    "great",
    "good",
    "excellent",
    "excited",
    "happy",
    "love",
    "fantastic",
    "progress",
    "success",
    "agree",
    "perfect",
    "confident",
    "thanks",
    "helpful",
    "positive",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad",
    "poor",
    "concern",
    "concerned",
    "worried",
    "problem",
    "issue",
    "blocked",
    "delay",
    "risk",
    "fail",
    "failure",
    "frustrated",
    "difficult",
    "negative",
];

fn action_patterns() -> &'static [Regex; 6] {
    static PATTERNS: OnceLock<[Regex; 6]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?i)action items?:?\s*([^.!?\n]+)").unwrap(),
            Regex::new(r"(?i)todos?:?\s*([^.!?\n]+)").unwrap(),
            Regex::new(r"(?i)follow[- ]?up:?\s*([^.!?\n]+)").unwrap(),
            Regex::new(r"(?i)next steps?:?\s*([^.!?\n]+)").unwrap(),
            Regex::new(r"(?i)\bneeds? to\s+([^.!?\n]+)").unwrap(),
            Regex::new(r"(?i)\bwill\s+([^.!?\n]+)").unwrap(),
        ]
    })
}

/// Analyses the onboarding conversation as a meeting record.
pub struct MeetingsAgent;

impl MeetingsAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MeetingsAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpecialistAgent for MeetingsAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Meetings
    }

    async fn execute(&self, input: &AgentInput) -> Result<Value, AgentError> {
        let transcript = input.transcript.as_str();
        if transcript.trim().is_empty() {
            return Err(AgentError::InvalidInput {
                agent: self.kind().to_string(),
                reason: "empty transcript".to_string(),
            });
        }

        let sentiment = analyze_sentiment(transcript);
        let action_items = extract_action_items(transcript);
        let engagement = engagement_metrics(transcript);
        let topics = extract_topics(transcript);
        let participants = identify_participants(transcript);
        let summary = meeting_summary(&sentiment, &topics, action_items.len());

        info!(
            client = %input.client_name,
            sentiment = %sentiment["category"].as_str().unwrap_or("neutral"),
            action_items = action_items.len(),
            "Meeting analysed"
        );

        Ok(json!({
            "agent": self.kind().as_str(),
            "client_name": input.client_name,
            "meeting_analysis": {
                "sentiment": sentiment,
                "action_items": action_items,
                "engagement_metrics": engagement,
                "topics": topics,
                "participants": participants,
                "summary": summary,
                "transcript_length": transcript.len(),
                "analyzed_at": Utc::now().to_rfc3339(),
            }
        }))
    }
}

fn analyze_sentiment(transcript: &str) -> Value {
    let words: Vec<String> = transcript
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();

    let positive = words
        .iter()
        .filter(|w| POSITIVE_WORDS.contains(&w.as_str()))
        .count() as f64;
    let negative = words
        .iter()
        .filter(|w| NEGATIVE_WORDS.contains(&w.as_str()))
        .count() as f64;
    let scored = positive + negative;

    let polarity = if scored == 0.0 {
        0.0
    } else {
        ((positive - negative) / scored).clamp(-1.0, 1.0)
    };

    let (category, description) = if polarity > 0.1 {
        ("positive", "Positive sentiment detected")
    } else if polarity < -0.1 {
        ("negative", "Negative sentiment detected")
    } else {
        ("neutral", "Neutral sentiment detected")
    };

    json!({
        "polarity": (polarity * 1000.0).round() / 1000.0,
        "category": category,
        "description": description,
        "confidence": polarity.abs(),
        "positive_hits": positive as u64,
        "negative_hits": negative as u64,
    })
}

fn extract_action_items(transcript: &str) -> Vec<Value> {
    let mut items = Vec::new();
    let mut seen = Vec::new();

    for pattern in action_patterns() {
        for capture in pattern.captures_iter(transcript) {
            let Some(text) = capture.get(1) else { continue };
            let text = text.as_str().trim();
            if text.len() <= 10 {
                continue;
            }
            let lowered = text.to_lowercase();
            if seen.contains(&lowered) {
                continue;
            }
            seen.push(lowered);
            items.push(json!({
                "item": capitalize(text),
                "priority": action_priority(text),
                "type": action_type(text),
            }));
        }
    }

    items.truncate(5);
    items
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn action_priority(text: &str) -> &'static str {
    let text = text.to_lowercase();
    const HIGH: &[&str] = &["urgent", "asap", "immediately", "critical", "must"];
    const MEDIUM: &[&str] = &["should", "need", "important", "soon"];
    if HIGH.iter().any(|w| text.contains(w)) {
        "high"
    } else if MEDIUM.iter().any(|w| text.contains(w)) {
        "medium"
    } else {
        "low"
    }
}

fn action_type(text: &str) -> &'static str {
    let text = text.to_lowercase();
    if ["plan", "design", "architect"].iter().any(|w| text.contains(w)) {
        "planning"
    } else if ["develop", "implement", "build", "code"]
        .iter()
        .any(|w| text.contains(w))
    {
        "development"
    } else if ["test", "verify", "validate"].iter().any(|w| text.contains(w)) {
        "testing"
    } else if ["review", "approve", "check"].iter().any(|w| text.contains(w)) {
        "review"
    } else if ["meet", "discuss", "call"].iter().any(|w| text.contains(w)) {
        "communication"
    } else {
        "general"
    }
}

fn engagement_metrics(transcript: &str) -> Value {
    let word_count = transcript.split_whitespace().count();
    let sentence_count = transcript
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count();
    let question_count = transcript.matches('?').count();
    let exclamation_count = transcript.matches('!').count();
    // Roughly 150 spoken words per minute.
    let estimated_duration_minutes = (word_count as f64 / 150.0).max(1.0);

    let base = (word_count as f64 / 200.0).min(1.0);
    let question_bonus = (question_count as f64 * 0.1).min(0.3);
    let exclamation_bonus = (exclamation_count as f64 * 0.05).min(0.2);
    let score = (base + question_bonus + exclamation_bonus).min(1.0);

    let participation = if score >= 0.8 {
        "high"
    } else if score >= 0.6 {
        "medium"
    } else {
        "low"
    };

    json!({
        "word_count": word_count,
        "sentence_count": sentence_count,
        "question_count": question_count,
        "exclamation_count": exclamation_count,
        "estimated_duration_minutes": (estimated_duration_minutes * 10.0).round() / 10.0,
        "engagement_score": score,
        "participation_level": participation,
    })
}

fn extract_topics(transcript: &str) -> Vec<&'static str> {
    const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
        (
            "Technology",
            &["system", "platform", "software", "application", "tech", "development"],
        ),
        (
            "Project Management",
            &["timeline", "deadline", "milestone", "project", "scope", "requirements"],
        ),
        (
            "Business",
            &["revenue", "cost", "roi", "business", "strategy", "market"],
        ),
        (
            "User Experience",
            &["user", "customer", "experience", "interface", "usability"],
        ),
        (
            "Security",
            &["security", "compliance", "privacy", "encryption", "audit"],
        ),
        (
            "Performance",
            &["performance", "speed", "optimization", "efficiency", "scalability"],
        ),
    ];

    let transcript = transcript.to_lowercase();
    TOPIC_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| transcript.contains(k)))
        .map(|(topic, _)| *topic)
        .collect()
}

fn identify_participants(transcript: &str) -> Vec<&'static str> {
    const ROLE_PATTERNS: &[(&str, &[&str])] = &[
        ("CTO", &["cto", "chief technology officer", "tech lead"]),
        ("VP of Product", &["vp of product", "product vp"]),
        ("Marketing Lead", &["marketing lead", "marketing director"]),
        ("Project Manager", &["project manager", "project lead"]),
        ("Developer", &["developer", "engineer", "programmer"]),
        ("Designer", &["designer", "ux", "ui"]),
    ];

    let transcript = transcript.to_lowercase();
    ROLE_PATTERNS
        .iter()
        .filter(|(_, patterns)| patterns.iter().any(|p| transcript.contains(p)))
        .map(|(role, _)| *role)
        .collect()
}

fn meeting_summary(sentiment: &Value, topics: &[&str], action_count: usize) -> String {
    let mut parts = vec![format!(
        "Meeting sentiment: {}",
        sentiment["description"].as_str().unwrap_or("Neutral")
    )];
    if !topics.is_empty() {
        let shown: Vec<&str> = topics.iter().take(3).copied().collect();
        parts.push(format!("Key topics discussed: {}", shown.join(", ")));
    }
    if action_count > 0 {
        let plural = if action_count == 1 { "" } else { "s" };
        parts.push(format!("Generated {action_count} action item{plural}"));
    }
    parts.join(". ") + "."
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Slots;

    fn input(transcript: &str) -> AgentInput {
        AgentInput::new("Acme Corp", Slots::new(), transcript)
    }

    #[tokio::test]
    async fn positive_transcript_scores_positive() {
        let agent = MeetingsAgent::new();
        let record = agent
            .execute(&input(
                "Great progress this week! The team is excited and confident. \
                 Everyone agreed the rollout plan looks excellent.",
            ))
            .await
            .unwrap();

        let sentiment = &record["meeting_analysis"]["sentiment"];
        assert_eq!(sentiment["category"], "positive");
        assert!(sentiment["polarity"].as_f64().unwrap() > 0.1);
    }

    #[tokio::test]
    async fn negative_transcript_scores_negative() {
        let agent = MeetingsAgent::new();
        let record = agent
            .execute(&input(
                "The team is worried about the delay. This problem is a serious risk \
                 and the stakeholders are frustrated.",
            ))
            .await
            .unwrap();

        assert_eq!(
            record["meeting_analysis"]["sentiment"]["category"],
            "negative"
        );
    }

    #[tokio::test]
    async fn extracts_and_prioritizes_action_items() {
        let agent = MeetingsAgent::new();
        let record = agent
            .execute(&input(
                "Action item: must review the security audit immediately. \
                 We will implement the checkout redesign next sprint.",
            ))
            .await
            .unwrap();

        let items = record["meeting_analysis"]["action_items"].as_array().unwrap();
        assert!(!items.is_empty());
        assert!(items.iter().any(|i| i["priority"] == "high"));
        assert!(items.iter().any(|i| i["type"] == "development"));
    }

    #[tokio::test]
    async fn detects_topics_and_participants() {
        let agent = MeetingsAgent::new();
        let record = agent
            .execute(&input(
                "Our CTO walked the developer team through the platform timeline \
                 and the compliance requirements.",
            ))
            .await
            .unwrap();

        let analysis = &record["meeting_analysis"];
        let topics: Vec<&str> = analysis["topics"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t.as_str().unwrap())
            .collect();
        assert!(topics.contains(&"Technology"));
        assert!(topics.contains(&"Security"));

        let participants = analysis["participants"].as_array().unwrap();
        assert!(participants.iter().any(|p| p == "CTO"));
    }

    #[tokio::test]
    async fn rejects_empty_transcript() {
        let agent = MeetingsAgent::new();
        let err = agent.execute(&input("   ")).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidInput { .. }));
    }
}
