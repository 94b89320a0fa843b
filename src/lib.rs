//! Programme onboarding engine — conversational slot filling plus a
//! four-agent orchestration pipeline feeding a shared knowledge store.

pub mod agents;
pub mod api;
pub mod config;
pub mod conversation;
pub mod error;
pub mod extract;
pub mod llm;
pub mod orchestrator;
pub mod schema;
pub mod session;
pub mod store;
