use anyhow::Context;
use resp_server::server::RedisServer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let server = RedisServer::new(std::env::args()).context("invalid command line arguments")?;

    server.run().await.context("server stopped")?;

    Ok(())
}
