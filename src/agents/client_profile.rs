//! Client profile agent — structured profile built from the collected slots.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::info;

use crate::error::AgentError;
use crate::schema::{FieldKey, Stakeholder};

use super::{AgentInput, AgentKind, SpecialistAgent};

const COMPLEXITY_INDICATORS: &[&str] = &[
    "enterprise",
    "scale",
    "multiple",
    "integration",
    "complex",
    "large",
    "global",
    "distributed",
    "microservices",
];

/// Builds the per-client profile record.
pub struct ClientProfileAgent;

impl ClientProfileAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClientProfileAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpecialistAgent for ClientProfileAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::ClientProfile
    }

    async fn execute(&self, input: &AgentInput) -> Result<Value, AgentError> {
        let slots = &input.slots;
        let industry = slots
            .get(FieldKey::Industry)
            .and_then(|v| v.as_text())
            .unwrap_or("unknown")
            .to_string();
        let problem = slots
            .get(FieldKey::ProblemStatement)
            .and_then(|v| v.as_text())
            .unwrap_or("")
            .to_string();
        let tech_stack: Vec<String> = slots
            .get(FieldKey::TechStack)
            .and_then(|v| v.as_list())
            .map(|items| items.to_vec())
            .unwrap_or_default();

        let regions: Vec<String> = slots
            .get(FieldKey::Regions)
            .and_then(|v| v.as_list())
            .map(|items| items.to_vec())
            .unwrap_or_else(|| default_regions(&industry));
        let stakeholders: Vec<Stakeholder> = slots
            .get(FieldKey::Stakeholders)
            .and_then(|v| v.as_stakeholders())
            .map(|items| items.to_vec())
            .unwrap_or_else(|| default_stakeholders(&problem, &industry));

        let complexity = assess_complexity(&problem, &tech_stack);
        let profile = json!({
            "name": input.client_name,
            "industry": industry,
            "company_size": estimate_company_size(&problem, &tech_stack),
            "regions": regions,
            "stakeholders": stakeholders,
            "tech_stack": tech_stack,
            "timeline": slots.get(FieldKey::Timeline).and_then(|v| v.as_text()),
            "budget": slots.get(FieldKey::Budget).and_then(|v| v.as_text()),
            "primary_challenge": primary_challenge(&problem),
            "current_project": {
                "problem_statement": problem,
                "project_type": project_type(&problem),
                "complexity_level": complexity,
            },
            "business_context": {
                "industry_trends": industry_trends(&industry),
                "business_drivers": business_drivers(&problem),
                "risk_factors": risk_factors(&industry, &problem),
            },
            "last_updated": Utc::now().to_rfc3339(),
        });

        let completeness_score = profile_completeness(&profile);
        let insights = profile_insights(&profile, &industry);

        info!(client = %input.client_name, completeness_score, "Client profile assembled");

        Ok(json!({
            "agent": self.kind().as_str(),
            "client_profile": profile,
            "completeness_score": completeness_score,
            "insights": insights,
        }))
    }
}

fn complexity_score(problem: &str, tech_stack: &[String]) -> usize {
    let text = format!("{} {}", problem, tech_stack.join(" ")).to_lowercase();
    COMPLEXITY_INDICATORS
        .iter()
        .filter(|indicator| text.contains(*indicator))
        .count()
}

fn estimate_company_size(problem: &str, tech_stack: &[String]) -> &'static str {
    match complexity_score(problem, tech_stack) {
        0 => "Small (10-100 employees)",
        1 | 2 => "Medium (100-1000 employees)",
        _ => "Large (1000+ employees)",
    }
}

fn assess_complexity(problem: &str, tech_stack: &[String]) -> &'static str {
    match complexity_score(problem, tech_stack) {
        0 | 1 => "low",
        2 | 3 => "medium",
        _ => "high",
    }
}

fn default_regions(industry: &str) -> Vec<String> {
    let regions: &[&str] = match industry.to_lowercase().as_str() {
        "automotive" | "finance" | "manufacturing" => &["USA", "Europe", "Asia"],
        "healthcare" => &["USA", "Canada"],
        "retail" => &["Global"],
        "technology" => &["USA", "Europe"],
        _ => &["USA"],
    };
    regions.iter().map(|r| r.to_string()).collect()
}

fn default_stakeholders(problem: &str, industry: &str) -> Vec<Stakeholder> {
    let problem = problem.to_lowercase();
    let mut stakeholders = vec![Stakeholder {
        name: "Technical Lead".to_string(),
        role: "CTO".to_string(),
    }];

    if problem.contains("lead management") || problem.contains("sales") {
        stakeholders.push(Stakeholder {
            name: "Sales Director".to_string(),
            role: "VP of Sales".to_string(),
        });
    }
    if problem.contains("patient") || industry.to_lowercase() == "healthcare" {
        stakeholders.push(Stakeholder {
            name: "Compliance Officer".to_string(),
            role: "Compliance Officer".to_string(),
        });
    }
    if problem.contains("checkout") || problem.contains("e-commerce") {
        stakeholders.push(Stakeholder {
            name: "Marketing Lead".to_string(),
            role: "VP of Marketing".to_string(),
        });
    }
    if stakeholders.len() < 2 {
        stakeholders.push(Stakeholder {
            name: "Project Manager".to_string(),
            role: "Project Manager".to_string(),
        });
    }
    stakeholders
}

fn primary_challenge(problem: &str) -> &'static str {
    let problem = problem.to_lowercase();
    if problem.contains("lead management") {
        "Lead Management and Conversion"
    } else if problem.contains("patient record") {
        "Healthcare Data Management and Compliance"
    } else if problem.contains("checkout") {
        "E-commerce Conversion Optimization"
    } else if problem.contains("optimization") {
        "Process Optimization"
    } else if problem.contains("integration") {
        "System Integration"
    } else {
        "Digital Transformation"
    }
}

fn project_type(problem: &str) -> &'static str {
    let problem = problem.to_lowercase();
    if problem.contains("implement") || problem.contains("develop") {
        "Implementation"
    } else if problem.contains("optimize") || problem.contains("improve") {
        "Optimization"
    } else if problem.contains("integrate") {
        "Integration"
    } else if problem.contains("migrate") {
        "Migration"
    } else {
        "Custom Development"
    }
}

fn industry_trends(industry: &str) -> Vec<&'static str> {
    match industry.to_lowercase().as_str() {
        "automotive" => vec!["Digital transformation", "Connected vehicles", "Data analytics"],
        "healthcare" => vec!["Digital health records", "Telemedicine", "AI diagnostics"],
        "retail" => vec!["Omnichannel experience", "Mobile commerce", "Personalization"],
        _ => vec!["Digital transformation", "Cloud adoption"],
    }
}

fn business_drivers(problem: &str) -> Vec<&'static str> {
    let problem = problem.to_lowercase();
    let mut drivers = Vec::new();
    if problem.contains("efficiency") || problem.contains("optimize") {
        drivers.push("Operational efficiency");
    }
    if problem.contains("customer") || problem.contains("user") {
        drivers.push("Customer experience");
    }
    if problem.contains("cost") || problem.contains("save") {
        drivers.push("Cost reduction");
    }
    if problem.contains("growth") || problem.contains("scale") {
        drivers.push("Business growth");
    }
    if drivers.is_empty() {
        drivers.push("Digital transformation");
    }
    drivers
}

fn risk_factors(industry: &str, problem: &str) -> Vec<&'static str> {
    let problem = problem.to_lowercase();
    let mut risks = Vec::new();
    if industry.to_lowercase() == "healthcare" {
        risks.push("Regulatory compliance");
        risks.push("Data security");
    }
    if problem.contains("integration") {
        risks.push("System compatibility");
    }
    if problem.contains("new") || problem.contains("implement") {
        risks.push("User adoption");
    }
    if risks.is_empty() {
        risks.push("Technical complexity");
        risks.push("Timeline constraints");
    }
    risks
}

fn profile_completeness(profile: &Value) -> f64 {
    let required = [
        "name",
        "industry",
        "company_size",
        "regions",
        "stakeholders",
        "tech_stack",
        "primary_challenge",
    ];
    let filled = required
        .iter()
        .filter(|field| {
            let value = &profile[**field];
            match value {
                Value::Null => false,
                Value::String(s) => !s.is_empty(),
                Value::Array(items) => !items.is_empty(),
                _ => true,
            }
        })
        .count();
    let base = filled as f64 / required.len() as f64;

    let mut bonus = 0.0;
    if !profile["current_project"].is_null() {
        bonus += 0.1;
    }
    if !profile["business_context"].is_null() {
        bonus += 0.1;
    }
    if profile["stakeholders"]
        .as_array()
        .is_some_and(|s| s.len() >= 2)
    {
        bonus += 0.05;
    }

    (base + bonus).min(1.0)
}

fn profile_insights(profile: &Value, industry: &str) -> Vec<String> {
    let mut insights = Vec::new();

    if profile["tech_stack"].as_array().is_some_and(|t| t.len() > 3) {
        insights.push(
            "Diverse technology stack suggests complex technical requirements".to_string(),
        );
    }
    if profile["stakeholders"]
        .as_array()
        .is_some_and(|s| s.len() >= 3)
    {
        insights.push(
            "Multiple stakeholders indicate need for comprehensive change management".to_string(),
        );
    }
    match industry.to_lowercase().as_str() {
        "healthcare" => insights.push(
            "Healthcare industry requires strict compliance and security measures".to_string(),
        ),
        "retail" => insights.push(
            "Retail focus suggests emphasis on customer experience and conversion".to_string(),
        ),
        _ => {}
    }

    insights
}
