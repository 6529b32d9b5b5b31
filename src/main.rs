/// XBot Brain
///
/// The decision backend for the X.com automation bot. An external
/// browser-automation driver submits candidate posts over HTTP; this
/// service decides whether to reply, drafts a localized reply through the
/// generator, rotates the hourly region/language target, manages the
/// search-term pool, and tracks replied/scanned state to keep the bot from
/// repeating itself.

use anyhow::Result;
use std::sync::Arc;
use xbot_brain::{config, content, engine, http_server, llm, store, terms};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    pretty_env_logger::init();

    log::info!("Starting XBot Brain...");

    // Load configuration from environment
    let cfg = config::Config::from_env()?;

    // Validate the database connection
    cfg.validate().await?;

    let store = store::Store::connect(&cfg.database_url).await?;

    // Missing credentials degrade to the stub generator so the rest of
    // the pipeline still runs
    let generator: Arc<dyn llm::DraftGenerator> = if cfg.groq_api_key.is_some() {
        Arc::new(llm::GroqGenerator::new(&cfg)?)
    } else {
        Arc::new(llm::StubGenerator::new(&cfg.site_url))
    };

    let content_client = content::ContentClient::new(&cfg, store.clone())?;
    let term_pool = terms::TermPool::new(store.clone(), content_client, &cfg);
    let engine = Arc::new(engine::DecisionEngine::new(store, generator, term_pool, &cfg));

    http_server::start_server(engine, cfg.port).await
}
