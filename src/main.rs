use cachegate::config::Config;
use cachegate::server;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cachegate=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    server::run(config).await?;

    Ok(())
}
