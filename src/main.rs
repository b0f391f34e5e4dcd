//! Triage Intake - conversational symptom intake and urgency triage
//!
//! A Rust backend driving a slot-filling intake state machine that ends in
//! a deterministic triage level, safety-filtered advice and a report.

mod advice;
mod api;
mod config;
mod db;
mod followup;
mod llm;
mod model;
mod nlp;
mod report;
mod runtime;
mod safety;
mod session;
mod state_machine;
mod triage;
mod vision;

use advice::{LlmAdvisor, TemplateAdvisor};
use api::{create_router, AppState};
use config::{AdviceBackend, AppConfig};
use db::Database;
use llm::LlmService;
use nlp::KeywordExtractor;
use runtime::{AdviceGenerator, Collaborators, DatabaseStorage, ImageClassifier, RuntimeManager};
use safety::RedFlagFilter;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vision::{LlmImageClassifier, UnavailableImageClassifier};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "triage_intake=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env()?;

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    let llm = llm::build_service(&config.llm)?;
    match &llm {
        Some(service) => tracing::info!(model = %service.model_id(), "LLM service initialized"),
        None => tracing::warn!("No LLM configured. Set ANTHROPIC_API_KEY or LLM_GATEWAY for model-backed advice and images."),
    }

    let collaborators = build_collaborators(&config, llm);
    let runtime = Arc::new(RuntimeManager::new(
        Arc::new(DatabaseStorage::new(db.clone())),
        collaborators,
        config.image_step,
    ));
    let state = AppState::new(runtime, db);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        %addr,
        image_step = config.image_step,
        advice_backend = ?config.advice_backend,
        "Triage intake server listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_collaborators(config: &AppConfig, llm: Option<Arc<dyn LlmService>>) -> Collaborators {
    let advisor: Arc<dyn AdviceGenerator> = match (config.advice_backend, &llm) {
        (AdviceBackend::Llm, Some(service)) => {
            Arc::new(LlmAdvisor::new(Arc::clone(service), config.advice_timeout))
        }
        // Config rejects the llm backend without a service
        (AdviceBackend::Llm, None) | (AdviceBackend::Template, _) => Arc::new(TemplateAdvisor),
    };

    let vision: Arc<dyn ImageClassifier> = match llm {
        Some(service) => Arc::new(LlmImageClassifier::new(
            service,
            config.image_dir.clone(),
            config.advice_timeout,
        )),
        None => Arc::new(UnavailableImageClassifier),
    };

    Collaborators {
        extractor: Arc::new(KeywordExtractor::new()),
        advisor,
        safety: Arc::new(RedFlagFilter),
        vision,
    }
}
