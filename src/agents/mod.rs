//! Specialist agents — the four analysis nodes the orchestrator fans out to.
//!
//! Each agent is deterministic: it reads the collected slots (and, for the
//! insights agent, the outputs of upstream agents) and produces a JSON record
//! for the knowledge store. The orchestrator dispatches on [`AgentKind`], and
//! the [`AgentRegistry`] lets tests swap any node for a stub.

mod client_profile;
mod domain_knowledge;
mod insights;
mod meetings;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::schema::Slots;
use crate::store::RecordKind;

pub use client_profile::ClientProfileAgent;
pub use domain_knowledge::DomainKnowledgeAgent;
pub use insights::ActionableInsightsAgent;
pub use meetings::MeetingsAgent;

/// The four nodes of the orchestration graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    DomainKnowledge,
    ClientProfile,
    Meetings,
    Insights,
}

impl AgentKind {
    pub const ALL: [AgentKind; 4] = [
        AgentKind::DomainKnowledge,
        AgentKind::ClientProfile,
        AgentKind::Meetings,
        AgentKind::Insights,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::DomainKnowledge => "domain_knowledge",
            AgentKind::ClientProfile => "client_profile",
            AgentKind::Meetings => "meetings",
            AgentKind::Insights => "insights",
        }
    }

    /// The store record kind this agent's output is persisted under.
    pub fn record_kind(&self) -> RecordKind {
        match self {
            AgentKind::DomainKnowledge => RecordKind::DomainKnowledge,
            AgentKind::ClientProfile => RecordKind::ClientProfile,
            AgentKind::Meetings => RecordKind::Meeting,
            AgentKind::Insights => RecordKind::Insight,
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a node needs to run, captured from the completed session.
#[derive(Debug, Clone)]
pub struct AgentInput {
    pub client_name: String,
    pub slots: Slots,
    /// Full conversation transcript, analysed by the meetings node.
    pub transcript: String,
    /// Outputs of already-completed upstream nodes, keyed by kind. Empty for
    /// the fan-out nodes; populated for the insights fan-in.
    pub upstream: BTreeMap<AgentKind, serde_json::Value>,
}

impl AgentInput {
    pub fn new(client_name: impl Into<String>, slots: Slots, transcript: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            slots,
            transcript: transcript.into(),
            upstream: BTreeMap::new(),
        }
    }
}

/// One node of the orchestration graph.
#[async_trait]
pub trait SpecialistAgent: Send + Sync {
    fn kind(&self) -> AgentKind;

    async fn execute(&self, input: &AgentInput) -> Result<serde_json::Value, AgentError>;
}

/// Maps each [`AgentKind`] to its implementation. [`AgentRegistry::default`]
/// wires the four built-in agents; [`AgentRegistry::with_agent`] replaces one.
pub struct AgentRegistry {
    agents: HashMap<AgentKind, Arc<dyn SpecialistAgent>>,
}

impl AgentRegistry {
    pub fn with_agent(mut self, agent: Arc<dyn SpecialistAgent>) -> Self {
        self.agents.insert(agent.kind(), agent);
        self
    }

    pub fn get(&self, kind: AgentKind) -> Arc<dyn SpecialistAgent> {
        // Default always populates every kind, and with_agent only replaces.
        Arc::clone(&self.agents[&kind])
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        let mut agents: HashMap<AgentKind, Arc<dyn SpecialistAgent>> = HashMap::new();
        agents.insert(
            AgentKind::DomainKnowledge,
            Arc::new(DomainKnowledgeAgent::new()),
        );
        agents.insert(AgentKind::ClientProfile, Arc::new(ClientProfileAgent::new()));
        agents.insert(AgentKind::Meetings, Arc::new(MeetingsAgent::new()));
        agents.insert(AgentKind::Insights, Arc::new(ActionableInsightsAgent::new()));
        Self { agents }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_kind() {
        let registry = AgentRegistry::default();
        for kind in AgentKind::ALL {
            assert_eq!(registry.get(kind).kind(), kind);
        }
    }

    #[test]
    fn record_kind_mapping() {
        assert_eq!(AgentKind::Meetings.record_kind(), RecordKind::Meeting);
        assert_eq!(AgentKind::Insights.record_kind(), RecordKind::Insight);
        assert_eq!(
            AgentKind::DomainKnowledge.record_kind(),
            RecordKind::DomainKnowledge
        );
    }
}
