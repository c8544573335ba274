use form_relay::{Config, Supervisor};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load()?;
    let supervisor = Supervisor::start(&config).await?;
    supervisor.run_until_signal().await?;

    Ok(())
}
