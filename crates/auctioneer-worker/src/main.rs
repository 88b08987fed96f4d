//! One-shot keyword bid worker binary.
//!
//! Reads a stored rule from a JSON file, runs it once and prints the run
//! outcome. Scheduling is left to the caller (cron, systemd timers, ...).

use anyhow::{anyhow, Context};
use tracing::{info, warn};

use auctioneer_gateway::DirectGateway;
use auctioneer_models::TaskId;
use auctioneer_worker::{init_tracing, load_rule, obtain_token, run_rule, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env();
    init_tracing(config.log_format);
    info!("Starting auctioneer-worker");
    config.validate()?;

    let rule = load_rule(&config.rule_path)
        .await
        .with_context(|| format!("failed to load rule file {}", config.rule_path.display()))?;

    let token = obtain_token(config.token_source()?, &config.gateway).await?;
    let gateway = DirectGateway::new(&config.gateway, token)?;

    match gateway.get_client_login().await {
        Ok(login) => info!(login = %login, account = rule.account(), "Authorized"),
        Err(e) => warn!(account = rule.account(), "Could not resolve client login: {}", e),
    }

    let outcome = run_rule(&gateway, &rule, TaskId::new()).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(())
}
