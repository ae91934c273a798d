mod config;
mod db;
mod models;
mod mqtt;
mod presentation;
mod processor;

use config::AppConfig;
use db::LocationStore;
use mqtt::MqttSubscriber;
use presentation::Dashboard;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting location tracker...");

    // Init DB
    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;
    db::migrate(&pool).await?;
    info!("Opened database {}", config.database_url);
    let store = LocationStore::new(pool);

    // Initial load happens on the UI context, before any delivery starts
    let mut dashboard = Dashboard::default();
    match store.read_all().await {
        Ok(records) => dashboard.load_stored(records),
        Err(e) => error!("Could not load stored locations: {:#}", e),
    }
    log_totals(&store, &dashboard).await;
    let shutdown_store = store.clone();

    // Start MQTT on its own delivery task
    let (ui_tx, ui_rx) = mpsc::channel(config.ui_channel_capacity);
    let subscriber = MqttSubscriber::new(&config);
    let client = subscriber.client();
    let mut delivery = tokio::spawn(subscriber.run(store, ui_tx));

    tokio::select! {
        _ = presentation::run(&mut dashboard, ui_rx) => {
            warn!(
                "Subscription ended ({}); showing {} locations until interrupted",
                dashboard.last_notice().unwrap_or("link closed"),
                dashboard.points().len()
            );
            tokio::signal::ctrl_c().await?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!(
                "Shutdown requested (link {})",
                if dashboard.is_connected() { "up" } else { "down" }
            );
        }
    }

    mqtt::shutdown(&client, &mut delivery).await;
    log_totals(&shutdown_store, &dashboard).await;

    Ok(())
}

async fn log_totals(store: &LocationStore, dashboard: &Dashboard) {
    match store.count().await {
        Ok(stored) => info!(
            "{} locations stored, {} speed samples shown",
            stored,
            dashboard.speed_samples().len()
        ),
        Err(e) => warn!("Could not count stored locations: {:#}", e),
    }
}
