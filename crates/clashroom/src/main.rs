use clashroom::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ClashroomError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    let provider = config.rule_generator();
    tracing::info!(
        bind = %config.bind,
        rules = provider.name(),
        tick_ms = config.room.tick_interval.as_millis() as u64,
        max_participants = config.room.max_participants,
        "starting clashroom"
    );

    let server = ClashroomServerBuilder::from_config(&config)
        .build(provider)
        .await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}
