use std::sync::Arc;

use onboard::agents::AgentRegistry;
use onboard::api::{ApiState, api_routes};
use onboard::config::OnboardConfig;
use onboard::conversation::{ConversationEngine, spawn_idle_sweeper};
use onboard::llm::{LlmBackend, LlmConfig, create_provider};
use onboard::orchestrator::{Orchestrator, spawn_orchestrator};
use onboard::store::{KnowledgeStore, LibSqlBackend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = OnboardConfig::from_env();

    // Provider selection: Anthropic by default, OpenAI when requested.
    let backend = match std::env::var("ONBOARD_LLM_BACKEND").as_deref() {
        Ok("openai") => LlmBackend::OpenAi,
        _ => LlmBackend::Anthropic,
    };
    let (key_var, default_model) = match backend {
        LlmBackend::Anthropic => ("ANTHROPIC_API_KEY", "claude-sonnet-4-20250514"),
        LlmBackend::OpenAi => ("OPENAI_API_KEY", "gpt-4o-mini"),
    };
    let api_key = std::env::var(key_var).unwrap_or_else(|_| {
        eprintln!("Error: {key_var} not set");
        std::process::exit(1);
    });
    let model =
        std::env::var("ONBOARD_MODEL").unwrap_or_else(|_| default_model.to_string());

    let port: u16 = std::env::var("ONBOARD_PORT")
        .unwrap_or_else(|_| "8000".to_string())
        .parse()
        .unwrap_or(8000);
    let db_path =
        std::env::var("ONBOARD_DB_PATH").unwrap_or_else(|_| "./data/onboard.db".to_string());

    eprintln!("📋 Onboard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {model}");
    eprintln!("   API: http://0.0.0.0:{port}/api/conversations");
    eprintln!("   Database: {db_path}\n");

    let llm_config = LlmConfig {
        backend,
        api_key: secrecy::SecretString::from(api_key),
        model,
        base_url: std::env::var("ONBOARD_LLM_BASE_URL").ok(),
        timeout: config.turn_timeout,
    };
    let llm = create_provider(&llm_config)?;

    let store: Arc<dyn KnowledgeStore> = Arc::new(
        LibSqlBackend::new_local(std::path::Path::new(&db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {db_path}: {e}");
                std::process::exit(1);
            }),
    );

    let (orchestrator, queue_rx) = Orchestrator::new(
        AgentRegistry::default(),
        Arc::clone(&store),
        config.clone(),
    );
    let _worker_handle = spawn_orchestrator(Arc::clone(&orchestrator), queue_rx);

    let engine = ConversationEngine::new(llm, Arc::clone(&orchestrator), config);
    let _sweeper_handle = spawn_idle_sweeper(Arc::clone(&engine));

    let app = api_routes(ApiState {
        engine,
        orchestrator,
        store,
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!(port, "Onboarding server started");
    axum::serve(listener, app).await?;

    Ok(())
}
