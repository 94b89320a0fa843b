//! Slot extractor — turns a user utterance into field assignments.
//!
//! Extraction is a separate, low-temperature inference call that returns
//! JSON keyed by the schema's field names. It is best-effort: unparseable
//! output yields an empty map, never an error the caller must handle.

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use std::sync::OnceLock;

use crate::llm::{ChatMessage, CompletionRequest, TextInference};
use crate::schema::{FieldKey, SlotValue, Slots, Stakeholder};

/// Build the extraction prompt for one utterance.
///
/// The schema fields are spelled out one by one so the model returns only
/// known keys; already-filled fields are listed so the model focuses on
/// what is new in this utterance.
pub fn extraction_prompt(utterance: &str, known: &Slots, history: &[ChatMessage]) -> String {
    let mut known_lines = String::new();
    for (key, value) in known.iter() {
        let rendered = serde_json::to_string(value).unwrap_or_default();
        known_lines.push_str(&format!("- {key}: {rendered}\n"));
    }
    if known_lines.is_empty() {
        known_lines.push_str("(nothing yet)\n");
    }

    let mut context = String::new();
    // Last few turns give the model enough context to resolve references
    // like "the second one" without blowing up the prompt.
    for msg in history.iter().rev().take(6).collect::<Vec<_>>().into_iter().rev() {
        let speaker = match msg.role {
            crate::llm::Role::User => "User",
            crate::llm::Role::Assistant => "Assistant",
            crate::llm::Role::System => continue,
        };
        context.push_str(&format!("{speaker}: {}\n", msg.content));
    }

    format!(
        r#"You are extracting structured onboarding data from a client conversation.

Recent conversation:
{context}
Latest user message: "{utterance}"

Already collected:
{known_lines}
Extract any NEW information from the latest message. Return a JSON object
using only these keys (omit keys with nothing new; never invent values):
{{
  "client_name": "company name, exactly as written (any language or format)",
  "industry": "industry sector",
  "problem_statement": "the main business problem, in the user's own words",
  "tech_stack": ["technologies, tools, platforms mentioned"],
  "timeline": "project timeline",
  "budget": "budget information",
  "stakeholders": [{{"name": "person", "role": "their role"}}],
  "regions": ["regions or locations of operation"]
}}

Respond with ONLY valid JSON, no explanation or markdown formatting."#
    )
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```(?:json)?").expect("static regex"))
}

/// Salvage a JSON object from model output: strip code fences, then slice
/// from the first `{` to the last `}`.
fn salvage_json(text: &str) -> Option<serde_json::Value> {
    let stripped = fence_re().replace_all(text, "");
    let start = stripped.find('{')?;
    let end = stripped.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&stripped[start..=end]).ok()
}

fn string_field(value: &serde_json::Value) -> Option<String> {
    let s = value.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Accept both an array of strings and a single string for list fields —
/// models return either.
fn list_field(value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(string_field)
            .collect(),
        serde_json::Value::String(_) => string_field(value).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn stakeholder_field(value: &serde_json::Value) -> Vec<Stakeholder> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let name = string_field(item.get("name")?)?;
            let role = item
                .get("role")
                .and_then(string_field)
                .unwrap_or_default();
            Some(Stakeholder { name, role })
        })
        .collect()
}

/// Parse model output into a partial slot map. Pure; unknown keys and
/// nulls are ignored, and anything unparseable yields an empty map.
pub fn parse_extraction(text: &str) -> Slots {
    let mut slots = Slots::new();
    let Some(value) = salvage_json(text) else {
        return slots;
    };
    let Some(object) = value.as_object() else {
        return slots;
    };

    for (name, field_value) in object {
        let Some(key) = FieldKey::from_name(name) else {
            continue;
        };
        if field_value.is_null() {
            continue;
        }
        match key {
            FieldKey::Stakeholders => {
                let items = stakeholder_field(field_value);
                if !items.is_empty() {
                    slots.insert(key, SlotValue::Stakeholders(items));
                }
            }
            _ if key.is_multi() => {
                let items = list_field(field_value);
                if !items.is_empty() {
                    slots.insert(key, SlotValue::List(items));
                }
            }
            _ => {
                if let Some(s) = string_field(field_value) {
                    slots.insert(key, SlotValue::Text(s));
                }
            }
        }
    }
    slots
}

/// Run extraction against the inference capability.
///
/// Degrades gracefully: timeouts, provider errors, and unparseable output
/// all produce an empty map. `known` is never mutated.
pub async fn extract(
    llm: &Arc<dyn TextInference>,
    utterance: &str,
    known: &Slots,
    history: &[ChatMessage],
    timeout: Duration,
) -> Slots {
    let prompt = extraction_prompt(utterance, known, history);
    let request = CompletionRequest::new(vec![
        ChatMessage::system("You are a data extraction assistant. Output only valid JSON."),
        ChatMessage::user(prompt),
    ])
    .with_max_tokens(1024)
    .with_temperature(0.0);

    match tokio::time::timeout(timeout, llm.complete(request)).await {
        Ok(Ok(response)) => {
            let extracted = parse_extraction(&response.content);
            if extracted.is_empty() {
                tracing::debug!("Extraction returned no usable fields");
            }
            extracted
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Extraction inference call failed");
            Slots::new()
        }
        Err(_) => {
            tracing::warn!(timeout = ?timeout, "Extraction inference call timed out");
            Slots::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let slots = parse_extraction(
            r#"{"client_name": "Acme Corp", "industry": "Automotive"}"#,
        );
        assert_eq!(
            slots.get(FieldKey::ClientName).unwrap().as_text(),
            Some("Acme Corp")
        );
        assert_eq!(
            slots.get(FieldKey::Industry).unwrap().as_text(),
            Some("Automotive")
        );
    }

    #[test]
    fn parses_fenced_json_with_chatter() {
        let text = "Here is the extracted data:\n```json\n{\"tech_stack\": [\"Java\", \"Salesforce\"]}\n```\nLet me know if you need more.";
        let slots = parse_extraction(text);
        assert_eq!(
            slots.get(FieldKey::TechStack).unwrap().as_list().unwrap(),
            &["Java", "Salesforce"]
        );
    }

    #[test]
    fn parses_stakeholders() {
        let slots = parse_extraction(
            r#"{"stakeholders": [{"name": "Dana", "role": "CTO"}, {"name": "Sam"}]}"#,
        );
        let stakeholders = slots
            .get(FieldKey::Stakeholders)
            .unwrap()
            .as_stakeholders()
            .unwrap();
        assert_eq!(stakeholders.len(), 2);
        assert_eq!(stakeholders[0].role, "CTO");
        assert_eq!(stakeholders[1].role, "");
    }

    #[test]
    fn single_string_accepted_for_list_field() {
        let slots = parse_extraction(r#"{"regions": "EMEA"}"#);
        assert_eq!(
            slots.get(FieldKey::Regions).unwrap().as_list().unwrap(),
            &["EMEA"]
        );
    }

    #[test]
    fn nulls_and_unknown_keys_ignored() {
        let slots = parse_extraction(
            r#"{"client_name": null, "team_size": 40, "budget": "100k"}"#,
        );
        assert!(slots.get(FieldKey::ClientName).is_none());
        assert_eq!(slots.get(FieldKey::Budget).unwrap().as_text(), Some("100k"));
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn garbage_yields_empty_map() {
        assert!(parse_extraction("I could not find any data, sorry!").is_empty());
        assert!(parse_extraction("").is_empty());
        assert!(parse_extraction("{broken json").is_empty());
        assert!(parse_extraction("[1, 2, 3]").is_empty());
    }

    #[test]
    fn prompt_names_every_field_and_known_values() {
        let mut known = Slots::new();
        known.insert(FieldKey::ClientName, SlotValue::text("Acme"));
        let prompt = extraction_prompt("we use Java", &known, &[]);
        for key in FieldKey::ALL {
            assert!(prompt.contains(key.name()), "prompt missing {key}");
        }
        assert!(prompt.contains("Acme"));
        assert!(prompt.contains("we use Java"));
    }

    #[test]
    fn prompt_includes_recent_history_only() {
        let history: Vec<ChatMessage> = (0..10)
            .map(|i| ChatMessage::user(format!("turn-{i}")))
            .collect();
        let prompt = extraction_prompt("latest", &Slots::new(), &history);
        assert!(prompt.contains("turn-9"));
        assert!(!prompt.contains("turn-0"));
    }
}
