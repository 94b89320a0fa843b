//! Onboarding field schema — the fixed set of slots collected during a
//! conversation, merge rules, and the completeness scorer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The fixed onboarding schema. Declaration order is the tie-break order
/// when several missing fields share a weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    ClientName,
    Industry,
    ProblemStatement,
    TechStack,
    Timeline,
    Budget,
    Stakeholders,
    Regions,
}

impl FieldKey {
    pub const ALL: [FieldKey; 8] = [
        FieldKey::ClientName,
        FieldKey::Industry,
        FieldKey::ProblemStatement,
        FieldKey::TechStack,
        FieldKey::Timeline,
        FieldKey::Budget,
        FieldKey::Stakeholders,
        FieldKey::Regions,
    ];

    /// Snake-case wire name, matching the serde representation.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClientName => "client_name",
            Self::Industry => "industry",
            Self::ProblemStatement => "problem_statement",
            Self::TechStack => "tech_stack",
            Self::Timeline => "timeline",
            Self::Budget => "budget",
            Self::Stakeholders => "stakeholders",
            Self::Regions => "regions",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Scoring weight. Required fields sum to 70, optional to 30.
    pub fn weight(&self) -> u32 {
        match self {
            Self::ClientName => 25,
            Self::Industry => 20,
            Self::ProblemStatement => 25,
            Self::TechStack => 8,
            Self::Timeline => 8,
            Self::Budget => 5,
            Self::Stakeholders => 5,
            Self::Regions => 4,
        }
    }

    pub fn required(&self) -> bool {
        matches!(
            self,
            Self::ClientName | Self::Industry | Self::ProblemStatement
        )
    }

    /// Multi-valued fields accumulate entries across turns.
    pub fn is_multi(&self) -> bool {
        matches!(self, Self::TechStack | Self::Stakeholders | Self::Regions)
    }

    /// Human wording used when asking for this field.
    pub fn ask_hint(&self) -> &'static str {
        match self {
            Self::ClientName => "your company name",
            Self::Industry => "the industry you operate in",
            Self::ProblemStatement => "the main challenge or problem you want to address",
            Self::TechStack => "the systems, platforms, and tools you currently use",
            Self::Timeline => "your preferred timeline",
            Self::Budget => "your budget expectations",
            Self::Stakeholders => "the key stakeholders and their roles",
            Self::Regions => "the regions you operate in",
        }
    }
}

impl std::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A named stakeholder. Deduplicated by case-insensitive name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stakeholder {
    pub name: String,
    #[serde(default)]
    pub role: String,
}

/// A slot value — scalar text or an ordered multi-valued sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotValue {
    Stakeholders(Vec<Stakeholder>),
    List(Vec<String>),
    Text(String),
}

impl SlotValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Stakeholders(items) => items.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_stakeholders(&self) -> Option<&[Stakeholder]> {
        match self {
            Self::Stakeholders(items) => Some(items),
            _ => None,
        }
    }
}

/// The collected slot map for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slots(BTreeMap<FieldKey, SlotValue>);

impl Slots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: FieldKey) -> Option<&SlotValue> {
        self.0.get(&key)
    }

    pub fn insert(&mut self, key: FieldKey, value: SlotValue) {
        if !value.is_empty() {
            self.0.insert(key, value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &SlotValue)> {
        self.0.iter()
    }

    /// Whether a field counts as filled: present and non-empty (a
    /// multi-valued field is filled once it has at least one element).
    pub fn is_filled(&self, key: FieldKey) -> bool {
        self.get(key).is_some_and(|v| !v.is_empty())
    }

    /// Merge newly extracted values into this map.
    ///
    /// Extraction never deletes: empty incoming values are ignored. Scalar
    /// fields are last-write-wins; multi-valued fields accumulate with
    /// case-insensitive exact-match dedupe.
    pub fn merge(&mut self, incoming: Slots) {
        for (key, value) in incoming.0 {
            if value.is_empty() {
                continue;
            }
            if !key.is_multi() {
                self.0.insert(key, value);
                continue;
            }
            match (self.0.get_mut(&key), value) {
                (Some(SlotValue::List(existing)), SlotValue::List(new_items)) => {
                    for item in new_items {
                        let duplicate = existing
                            .iter()
                            .any(|e| e.eq_ignore_ascii_case(item.trim()));
                        if !duplicate && !item.trim().is_empty() {
                            existing.push(item.trim().to_string());
                        }
                    }
                }
                (Some(SlotValue::Stakeholders(existing)), SlotValue::Stakeholders(new_items)) => {
                    for item in new_items {
                        let duplicate = existing
                            .iter()
                            .any(|e| e.name.eq_ignore_ascii_case(item.name.trim()));
                        if !duplicate && !item.name.trim().is_empty() {
                            existing.push(Stakeholder {
                                name: item.name.trim().to_string(),
                                role: item.role.trim().to_string(),
                            });
                        }
                    }
                }
                // Kind changed or slot was previously absent — take the new value.
                (_, value) => {
                    self.0.insert(key, value);
                }
            }
        }
    }

    /// All required fields that are still empty, in schema order.
    pub fn missing_required(&self) -> Vec<FieldKey> {
        FieldKey::ALL
            .iter()
            .copied()
            .filter(|k| k.required() && !self.is_filled(*k))
            .collect()
    }

    /// The next field to ask for: the highest-weighted missing required
    /// field, falling back to the highest-weighted missing optional field.
    /// Ties break by schema declaration order.
    pub fn next_missing(&self) -> Option<FieldKey> {
        let pick = |required: bool| {
            FieldKey::ALL
                .iter()
                .copied()
                .filter(|k| k.required() == required && !self.is_filled(*k))
                .max_by_key(|k| {
                    // max_by_key returns the last max; invert position so the
                    // earliest-declared field wins ties.
                    let pos = FieldKey::ALL.iter().position(|a| a == k).unwrap_or(0);
                    (k.weight(), usize::MAX - pos)
                })
        };
        pick(true).or_else(|| pick(false))
    }
}

/// Completeness score: `round(100 * Σ filled_weight / Σ all_weights)`.
///
/// Deterministic and idempotent — a pure function of the slot map.
pub fn score(slots: &Slots) -> u8 {
    let total: u32 = FieldKey::ALL.iter().map(|k| k.weight()).sum();
    let filled: u32 = FieldKey::ALL
        .iter()
        .filter(|k| slots.is_filled(**k))
        .map(|k| k.weight())
        .sum();
    ((100 * filled + total / 2) / total) as u8
}
