use anyhow::Context;
use tracing_subscriber::EnvFilter;

use server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let client = match std::env::var("STORE_PATH") {
        Ok(path) => {
            tracing::info!("opening table store at {path}");
            db::Client::open(&path).context("could not open the table store")?
        }
        Err(_) => {
            tracing::warn!("STORE_PATH is not set; using a volatile in-memory store");
            db::Client::in_memory()
        }
    };

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("could not bind {bind_addr}"))?;

    tracing::info!("scheduler listening on {bind_addr}");

    axum::serve(listener, server::app(AppState::new(client)))
        .await
        .context("server terminated")?;

    Ok(())
}
