use std::{net::TcpListener, sync::Arc, time::Duration};

use env_logger::Env;
use leadhound::{
    configuration::get_configuration,
    dal::lead_db::PgLeadStore,
    services::{
        DnsMxResolver, EnrichmentEngine, MapsCollector, PipelineOrchestrator, SearchChain,
        Sentinel,
    },
    startup::run,
};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().expect("Failed to read configuration.");

    let pool_options = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(15 * 60)) // 15 minutes
        .max_lifetime(None);

    let connection_pool = pool_options.connect_lazy_with(configuration.database.with_db());
    sqlx::migrate!("./migrations").run(&connection_pool).await?;

    let search = SearchChain::from_settings(
        &configuration.enrichment,
        &configuration.webdriver.user_agent,
    )?;
    let collector = MapsCollector::new(
        configuration.webdriver.clone(),
        configuration.collector.clone(),
    );
    let enricher = EnrichmentEngine::new(
        Arc::new(search),
        configuration.enrichment.clone(),
        configuration.webdriver.clone(),
    );
    let sentinel = Sentinel::new(DnsMxResolver::new(&configuration.verification)?);
    let store = PgLeadStore::new(connection_pool.clone());

    let orchestrator = Arc::new(PipelineOrchestrator::new(
        Arc::new(collector),
        Arc::new(enricher),
        Arc::new(sentinel),
        Arc::new(store),
    ));

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(address)?;
    log::info!("Listening on {}", listener.local_addr()?);

    run(listener, connection_pool, orchestrator)?.await?;
    Ok(())
}
