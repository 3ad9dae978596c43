//! Entry point: load config, connect, and print status updates for the given builds.

use std::collections::HashSet;

use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use zupfwatch::config::Config;
use zupfwatch::{create_client, BuildStatusUpdate, LifecycleEvent};

/// Follow zupfmanager builds until they complete or fail.
#[derive(Debug, Parser)]
#[command(name = "zupfwatch", version)]
struct Args {
    /// Live-update endpoint (overrides BUILD_WS_URL / API_BASE_URL).
    #[arg(long)]
    endpoint: Option<String>,

    /// Build ids to follow.
    #[arg(required = true)]
    build_ids: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = Config::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;
    if let Some(endpoint) = args.endpoint.as_deref() {
        config.endpoint = endpoint.to_string();
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let client = create_client(&config);
    let mut lifecycle = client.lifecycle();
    let (tx, mut updates) = mpsc::unbounded_channel::<BuildStatusUpdate>();

    let mut pending: HashSet<String> = HashSet::new();
    for build_id in &args.build_ids {
        let tx = tx.clone();
        client.subscribe(build_id.clone(), move |update| {
            let _ = tx.send(update);
        })?;
        pending.insert(build_id.clone());
    }
    tracing::info!(endpoint = %config.endpoint, builds = pending.len(), "watching builds");

    let outcome = loop {
        tokio::select! {
            Some(update) = updates.recv() => {
                println!("{}", serde_json::to_string(&update)?);
                if update.status.is_terminal() {
                    client.unsubscribe(&update.build_id);
                    pending.remove(&update.build_id);
                    if pending.is_empty() {
                        break Ok(());
                    }
                }
            }
            event = lifecycle.recv() => match event {
                Ok(LifecycleEvent::ReconnectsExhausted { attempts }) => {
                    break Err(anyhow::anyhow!(
                        "gave up after {} reconnection attempts",
                        attempts
                    ));
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    break Err(anyhow::anyhow!("live client stopped"));
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break Ok(());
            }
        }
    };

    client.disconnect();
    client.shutdown().await;
    outcome
}
