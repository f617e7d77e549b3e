use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use judilibre_chat::auth::{PisteTokenProvider, TokenProvider};
use judilibre_chat::config::Config;
use judilibre_chat::pagination::PaginationDriver;
use judilibre_chat::search::JudilibreClient;

/// Run one Judilibre search with the configured pagination and print the normalized summaries
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if query.trim().is_empty() {
        bail!("usage: judilibre-search <keywords...>");
    }

    let config = Config::load();
    let tokens = PisteTokenProvider::new(
        config.judilibre.auth_url.clone(),
        config.judilibre.client_id.clone(),
        config.judilibre.client_secret.clone(),
        config.judilibre_timeout(),
    )?;
    let token = tokens
        .fetch_token()
        .await
        .context("Failed to obtain PISTE token")?;

    let client = JudilibreClient::new(
        config.judilibre.search_url.clone(),
        config.judilibre_timeout(),
    )?;
    let driver = PaginationDriver::new(
        config.search.pagination.clone(),
        config.search.include_record_number,
    );
    let summaries = driver
        .collect(&client, &token, &query)
        .await
        .with_context(|| format!("Search failed for {query:?}"))?;

    println!("{} result(s), policy {:?}", summaries.len(), driver.policy());
    for summary in summaries {
        println!("[{}] {}", summary.result_id, summary.summary);
    }
    Ok(())
}
