//! Actionable insights agent — the fan-in node of the orchestration graph.
//!
//! Synthesizes the domain-knowledge, client-profile, and meetings records
//! into strategy, risks, metrics, and an overall project health score. Runs
//! on whatever subset of upstream outputs succeeded; absent ones are listed
//! under `missing_inputs` and their health components drop out of the
//! average.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::info;

use crate::error::AgentError;

use super::{AgentInput, AgentKind, SpecialistAgent};

const UPSTREAM: [AgentKind; 3] = [
    AgentKind::DomainKnowledge,
    AgentKind::ClientProfile,
    AgentKind::Meetings,
];

pub struct ActionableInsightsAgent;

impl ActionableInsightsAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ActionableInsightsAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpecialistAgent for ActionableInsightsAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Insights
    }

    async fn execute(&self, input: &AgentInput) -> Result<Value, AgentError> {
        if input.upstream.is_empty() {
            return Err(AgentError::InvalidInput {
                agent: self.kind().to_string(),
                reason: "no upstream agent outputs available".to_string(),
            });
        }

        let missing_inputs: Vec<&str> = UPSTREAM
            .iter()
            .filter(|kind| !input.upstream.contains_key(kind))
            .map(|kind| kind.as_str())
            .collect();

        let domain = input.upstream.get(&AgentKind::DomainKnowledge);
        let profile = input.upstream.get(&AgentKind::ClientProfile);
        let meeting = input.upstream.get(&AgentKind::Meetings);

        let industry = profile
            .and_then(|p| p["client_profile"]["industry"].as_str())
            .or_else(|| domain.and_then(|d| d["industry"].as_str()))
            .unwrap_or("unknown")
            .to_string();
        let sentiment_category = meeting
            .and_then(|m| m["meeting_analysis"]["sentiment"]["category"].as_str())
            .unwrap_or("neutral")
            .to_string();
        let complexity = profile
            .and_then(|p| p["client_profile"]["current_project"]["complexity_level"].as_str())
            .unwrap_or("medium")
            .to_string();

        let strategic = strategic_recommendations(&industry, &sentiment_category);
        let tactical = tactical_actions(domain, meeting, &complexity);
        let risks = assess_risks(domain, &industry, &sentiment_category, &complexity);
        let metrics = success_metrics(&industry);
        let timeline = timeline_recommendation(&industry, &complexity);
        let health = health_score(domain, profile, meeting);

        let executive_summary = executive_summary(
            &input.client_name,
            &strategic,
            &risks,
            &health,
            &missing_inputs,
        );

        info!(
            client = %input.client_name,
            health = health["overall_score"].as_f64().unwrap_or(0.0),
            missing = missing_inputs.len(),
            "Insights assembled"
        );

        Ok(json!({
            "agent": self.kind().as_str(),
            "client_name": input.client_name,
            "insights": {
                "executive_summary": executive_summary,
                "strategic_recommendations": strategic,
                "tactical_actions": tactical,
                "risk_assessment": risks,
                "success_metrics": metrics,
                "timeline_recommendation": timeline,
                "project_health_score": health,
                "generated_at": Utc::now().to_rfc3339(),
            },
            "missing_inputs": missing_inputs,
        }))
    }
}

fn strategic_recommendations(industry: &str, sentiment: &str) -> Vec<Value> {
    let mut recommendations: Vec<Value> = match industry.to_lowercase().as_str() {
        "automotive" => vec![
            json!({
                "title": "Establish Clear KPI Framework",
                "description": "Define measurable KPIs early to track lead management success",
                "priority": "high",
                "category": "strategy",
            }),
            json!({
                "title": "Implement Phased Rollout",
                "description": "Deploy the implementation in phases to minimize risk",
                "priority": "medium",
                "category": "implementation",
            }),
        ],
        "healthcare" => vec![
            json!({
                "title": "Prioritize Compliance Framework",
                "description": "Establish HIPAA compliance as the foundation for all development",
                "priority": "high",
                "category": "compliance",
            }),
            json!({
                "title": "Implement Security-First Architecture",
                "description": "Design system architecture with security as the primary concern",
                "priority": "high",
                "category": "security",
            }),
        ],
        "retail" => vec![
            json!({
                "title": "Focus on Conversion Optimization",
                "description": "Prioritize checkout flow optimization to maximize conversions",
                "priority": "high",
                "category": "optimization",
            }),
            json!({
                "title": "Mobile-First Approach",
                "description": "Design and optimize for mobile experience first",
                "priority": "medium",
                "category": "user_experience",
            }),
        ],
        _ => vec![json!({
            "title": "Establish Delivery Baseline",
            "description": "Agree scope, milestones, and owners before development starts",
            "priority": "high",
            "category": "strategy",
        })],
    };

    match sentiment {
        "negative" => recommendations.push(json!({
            "title": "Address Stakeholder Concerns",
            "description": "Proactively address concerns surfaced in the onboarding conversation",
            "priority": "high",
            "category": "stakeholder_management",
        })),
        "positive" => recommendations.push(json!({
            "title": "Leverage Positive Momentum",
            "description": "Capitalize on positive stakeholder sentiment to accelerate progress",
            "priority": "medium",
            "category": "momentum",
        })),
        _ => {}
    }

    recommendations
}

fn tactical_actions(domain: Option<&Value>, meeting: Option<&Value>, complexity: &str) -> Vec<Value> {
    let mut actions = Vec::new();

    if let Some(items) = meeting
        .and_then(|m| m["meeting_analysis"]["action_items"].as_array())
    {
        for item in items {
            actions.push(json!({
                "title": item["item"],
                "type": item["type"],
                "priority": item["priority"],
                "source": "meeting_analysis",
            }));
        }
    }

    if let Some(missing) = domain
        .and_then(|d| d["domain_knowledge"]["tech_analysis"]["missing_recommended_tools"].as_array())
    {
        for tool in missing.iter().take(3) {
            if let Some(tool) = tool.as_str() {
                actions.push(json!({
                    "title": format!("Evaluate {tool} integration"),
                    "type": "evaluation",
                    "priority": "medium",
                    "source": "domain_knowledge",
                }));
            }
        }
    }

    if complexity == "high" {
        actions.push(json!({
            "title": "Conduct detailed technical architecture review",
            "type": "planning",
            "priority": "high",
            "source": "complexity_analysis",
        }));
    }

    actions
}

fn assess_risks(domain: Option<&Value>, industry: &str, sentiment: &str, complexity: &str) -> Value {
    let mut risks = Vec::new();

    let compatibility = domain
        .and_then(|d| d["domain_knowledge"]["tech_analysis"]["compatibility_score"].as_f64())
        .unwrap_or(1.0);
    if compatibility < 0.5 {
        risks.push(json!({
            "category": "technical",
            "risk": "Low technology stack compatibility",
            "probability": "medium",
            "impact": "high",
            "mitigation": "Conduct detailed technical assessment and consider alternative tools",
        }));
    }
    if complexity == "high" {
        risks.push(json!({
            "category": "complexity",
            "risk": "High project complexity may lead to delays",
            "probability": "medium",
            "impact": "medium",
            "mitigation": "Break down into smaller phases and increase testing",
        }));
    }
    if sentiment == "negative" {
        risks.push(json!({
            "category": "stakeholder",
            "risk": "Negative stakeholder sentiment may impact project support",
            "probability": "medium",
            "impact": "high",
            "mitigation": "Increase communication and address specific concerns",
        }));
    }
    if industry.to_lowercase() == "healthcare" {
        risks.push(json!({
            "category": "compliance",
            "risk": "HIPAA compliance requirements may extend timeline",
            "probability": "high",
            "impact": "medium",
            "mitigation": "Allocate additional time for compliance review and testing",
        }));
    }

    let score = risk_score(&risks);
    let level = if score >= 0.7 {
        "high"
    } else if score >= 0.4 {
        "medium"
    } else {
        "low"
    };
    let top_concerns: Vec<Value> = risks.iter().take(3).map(|r| r["risk"].clone()).collect();

    json!({
        "risks": risks,
        "overall_risk_score": score,
        "risk_level": level,
        "top_concerns": top_concerns,
    })
}

fn risk_score(risks: &[Value]) -> f64 {
    if risks.is_empty() {
        return 0.2;
    }
    let total: f64 = risks
        .iter()
        .map(|r| match r["probability"].as_str() {
            Some("low") => 0.3,
            Some("high") => 0.9,
            _ => 0.6,
        })
        .sum();
    (total / risks.len() as f64).min(1.0)
}

fn success_metrics(industry: &str) -> Vec<Value> {
    let mut metrics: Vec<Value> = match industry.to_lowercase().as_str() {
        "automotive" => vec![
            json!({"name": "Lead Conversion Rate", "target": "15% improvement", "measurement": "Monthly"}),
            json!({"name": "Sales Cycle Time", "target": "20% reduction", "measurement": "Quarterly"}),
        ],
        "healthcare" => vec![
            json!({"name": "Data Accuracy", "target": "99.5%", "measurement": "Daily"}),
            json!({"name": "Compliance Score", "target": "100%", "measurement": "Monthly"}),
        ],
        "retail" => vec![
            json!({"name": "Conversion Rate", "target": "25% improvement", "measurement": "Daily"}),
            json!({"name": "Cart Abandonment Rate", "target": "30% reduction", "measurement": "Weekly"}),
        ],
        _ => Vec::new(),
    };

    metrics.push(json!({"name": "Project Timeline Adherence", "target": "95%", "measurement": "Weekly"}));
    metrics.push(json!({"name": "Budget Variance", "target": "<5%", "measurement": "Monthly"}));
    metrics.push(json!({"name": "Stakeholder Satisfaction", "target": "4.5/5", "measurement": "Monthly"}));
    metrics
}

fn timeline_recommendation(industry: &str, complexity: &str) -> Value {
    let (mut planning, development, mut testing, deployment) = match complexity {
        "low" => (2, 8, 3, 1),
        "high" => (4, 16, 6, 3),
        _ => (3, 12, 4, 2),
    };
    // Compliance work stretches healthcare schedules.
    if industry.to_lowercase() == "healthcare" {
        planning += 1;
        testing += 2;
    }
    let total = planning + development + testing + deployment;

    json!({
        "phases": {
            "planning_weeks": planning,
            "development_weeks": development,
            "testing_weeks": testing,
            "deployment_weeks": deployment,
        },
        "total_duration_weeks": total,
        "critical_path": ["planning", "development", "testing"],
        "buffer_recommendation": "20% additional time for unforeseen challenges",
    })
}

fn health_score(domain: Option<&Value>, profile: Option<&Value>, meeting: Option<&Value>) -> Value {
    let mut components = serde_json::Map::new();
    let mut scores = Vec::new();

    if let Some(tech) = domain
        .and_then(|d| d["domain_knowledge"]["tech_analysis"]["compatibility_score"].as_f64())
    {
        let score = tech * 100.0;
        components.insert("technical_compatibility".to_string(), json!(round1(score)));
        scores.push(score);
    }
    if let Some(confidence) = domain.and_then(|d| d["confidence_score"].as_f64()) {
        let score = confidence * 100.0;
        components.insert("domain_knowledge".to_string(), json!(round1(score)));
        scores.push(score);
    }
    if let Some(completeness) = profile.and_then(|p| p["completeness_score"].as_f64()) {
        let score = completeness * 100.0;
        components.insert("profile_completeness".to_string(), json!(round1(score)));
        scores.push(score);
    }
    if let Some(polarity) = meeting
        .and_then(|m| m["meeting_analysis"]["sentiment"]["polarity"].as_f64())
    {
        // Map [-1, 1] onto [0, 100].
        let score = ((polarity + 1.0) * 50.0).max(0.0);
        components.insert("stakeholder_sentiment".to_string(), json!(round1(score)));
        scores.push(score);
    }

    let overall = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };
    let level = if overall >= 80.0 {
        "excellent"
    } else if overall >= 60.0 {
        "good"
    } else if overall >= 40.0 {
        "fair"
    } else {
        "poor"
    };

    json!({
        "overall_score": round1(overall),
        "health_level": level,
        "component_scores": components,
    })
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn executive_summary(
    client_name: &str,
    strategic: &[Value],
    risks: &Value,
    health: &Value,
    missing_inputs: &[&str],
) -> String {
    let health_level = health["health_level"].as_str().unwrap_or("fair");
    let overall = health["overall_score"].as_f64().unwrap_or(0.0);
    let risk_level = risks["risk_level"].as_str().unwrap_or("medium");
    let top = strategic
        .first()
        .and_then(|r| r["title"].as_str())
        .unwrap_or("No specific recommendations");

    let mut summary = format!(
        "Executive summary for {client_name}: project health {health_level} ({overall}%), \
         risk level {risk_level}. Key recommendation: {top}."
    );
    if !missing_inputs.is_empty() {
        summary.push_str(&format!(
            " Analysis is partial; missing inputs: {}.",
            missing_inputs.join(", ")
        ));
    }
    summary
}
