use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use citykiosk::config::Config;
use citykiosk::engine::ConversationEngine;
use citykiosk::geo::{
    CityResolver, Coordinates, GeoProvider, GeocodeCache, GoogleProvider, NominatimProvider,
};
use citykiosk::store::{backup, CatalogStore};
use citykiosk::server;

/// Citykiosk — conversational catalog service.
///
/// Runs the conversation engine behind an HTTP event bridge. The chat
/// transport posts inbound events to /api/event and renders the responses.
///
/// Examples:
///   citykiosk
///   citykiosk --host 0.0.0.0 --port 9000
///   citykiosk --database sqlite:///tmp/catalog.db --no-geo-check
#[derive(Parser)]
#[command(name = "citykiosk", version, about, long_about = None)]
struct Cli {
    /// Bind address for the event bridge.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Bind port for the event bridge.
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Database URL override (defaults to DATABASE_URL or sqlite://bot_catalog.db).
    #[arg(long)]
    database: Option<String>,

    /// Skip the startup geocoding connectivity probe.
    #[arg(long)]
    no_geo_check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "citykiosk=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("loading configuration")?;

    // ── Store ───────────────────────────────────────────────────

    let database_url = cli.database.as_deref().unwrap_or(&config.database_url);
    let store = Arc::new(
        CatalogStore::connect(database_url)
            .await
            .with_context(|| format!("opening store at {database_url}"))?,
    );
    info!(url = database_url, "catalog store ready");

    // ── Resolver ────────────────────────────────────────────────

    let primary: Box<dyn GeoProvider> =
        Box::new(NominatimProvider::new().context("building primary geo provider")?);
    let secondary: Option<Box<dyn GeoProvider>> = match &config.google_api_key {
        Some(key) => Some(Box::new(
            GoogleProvider::new(key.clone()).context("building secondary geo provider")?,
        )),
        None => None,
    };
    if secondary.is_none() {
        info!("secondary geo provider disabled (no API key)");
    }
    let resolver = Arc::new(CityResolver::new(GeocodeCache::new(), primary, secondary));

    if !cli.no_geo_check {
        // connectivity probe; failure is not fatal
        let probe = Coordinates { lat: 55.7558, lon: 37.6176 };
        match resolver.reverse_resolve(probe).await {
            Some(city) => info!(city, "geocoding probe succeeded"),
            None => warn!("geocoding probe failed; city resolution may be degraded"),
        }
    }

    // ── Engine and background work ──────────────────────────────

    let engine = Arc::new(ConversationEngine::new(
        resolver,
        store.clone(),
        config.admin_id,
        config.backup_dir.clone(),
    ));

    backup::spawn(store, config.backup_dir.clone());

    // ── Serve ───────────────────────────────────────────────────

    server::start(&cli.host, cli.port, engine, config.transport_token)
        .await
        .context("running event bridge")?;
    Ok(())
}
