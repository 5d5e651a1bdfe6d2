use avito_agent::api::{self, AppState};
use avito_agent::autoreply::{run_scheduler, AutoReplyOrchestrator};
use avito_agent::avito::AvitoClient;
use avito_agent::cache::ResponseCache;
use avito_agent::config::Settings;
use avito_agent::llm::OpenAiProvider;
use avito_agent::prompts::PromptStore;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_logging();

    info!("Starting Avito auto-reply backend...");

    let settings = init_settings();
    let prompts = init_prompt_store(&settings);
    let avito = init_avito(&settings).await;

    if let Some(orchestrator) = build_orchestrator(&settings, avito, prompts.clone()) {
        match settings.autoreply_interval_secs {
            Some(interval) => {
                info!(interval_secs = interval, "Auto-reply scheduler enabled");
                tokio::spawn(run_scheduler(orchestrator, interval));
            }
            None => info!("Auto-reply scheduler disabled (no interval configured)"),
        }
    }

    let state = AppState {
        settings: settings.clone(),
        prompts,
    };
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    info!(addr = %settings.bind_addr, "HTTP API listening");
    axum::serve(listener, api::router(state)).await?;

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_prompt_store(settings: &Settings) -> PromptStore {
    match PromptStore::new(&settings.prompt_dir) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to initialize prompt store: {}", e);
            std::process::exit(1);
        }
    }
}

async fn init_avito(settings: &Settings) -> Arc<AvitoClient> {
    let client = Arc::new(AvitoClient::new(
        settings.avito_base_url.clone(),
        settings.avito_client_id.clone(),
        settings.avito_client_secret.clone(),
    ));
    match client.get_user_data().await {
        Ok(user) => info!(user_id = user.id, name = %user.name, "Avito account resolved"),
        Err(e) => {
            error!("Failed to resolve Avito account: {}", e);
            std::process::exit(1);
        }
    }
    client
}

fn build_orchestrator(
    settings: &Settings,
    avito: Arc<AvitoClient>,
    prompts: PromptStore,
) -> Option<Arc<AutoReplyOrchestrator>> {
    let Some(api_key) = settings.openai_api_key.clone() else {
        warn!("OPENAI_API_KEY not set, auto-reply disabled");
        return None;
    };

    let llm = match OpenAiProvider::new(api_key, settings.proxy_url.as_deref()) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            error!("Failed to initialize completion provider: {}", e);
            std::process::exit(1);
        }
    };

    let cache = ResponseCache::new(Duration::from_secs(settings.cache_ttl_secs));
    Some(Arc::new(AutoReplyOrchestrator::new(
        avito,
        llm,
        cache,
        prompts,
        settings.completion_model.clone(),
        settings.autoreply_chat_types(),
    )))
}
