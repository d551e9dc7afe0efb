use anyhow::Context;
use denguemap::{
    AlertEvent, AlertHistory, AlertSubscriber, CoreBuilder, CoreConfig, FilePointerStore,
    FixedLocation, LocationProvider, LonLat, SharedLocation,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How often the cluster dataset is re-downloaded
const CLUSTER_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Writes every alert to the log
struct LogAlerts;

impl AlertSubscriber for LogAlerts {
    fn on_alert(&self, event: &AlertEvent) {
        log::warn!("{}", event);
    }
}

/// Headless dengue-alert daemon: preloads map tiles, then watches the saved
/// pointers and the current location until Ctrl-C.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    denguemap::init_logging();

    let config = match std::env::args().nth(1) {
        Some(path) => CoreConfig::from_json_file(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        None => CoreConfig::default(),
    };

    let data_dir = data_dir(&config);
    log::info!("data directory: {}", data_dir.display());

    let core = Arc::new(
        CoreBuilder::new()
            .with_config(config)
            .with_pointer_store(Arc::new(FilePointerStore::new(data_dir.join("pointers.json"))))
            .with_location(location_from_env())
            .with_subscriber(Arc::new(LogAlerts))
            .with_subscriber(Arc::new(AlertHistory::new(data_dir.join("alerts.json"))))
            .build()
            .context("failed to build core")?,
    );

    core.start().await;

    let tiles = core.load_map();
    let preload = tokio::task::spawn_blocking(move || {
        let (mut loaded, mut failed) = (0usize, 0usize);
        for result in tiles.iter() {
            match result.data {
                Ok(_) => loaded += 1,
                Err(e) => {
                    failed += 1;
                    log::debug!("tile {} failed: {}", result.key, e);
                }
            }
        }
        log::info!("tile preload done: {} loaded, {} failed", loaded, failed);
    });

    let refresher = {
        let core = Arc::clone(&core);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CLUSTER_REFRESH_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = core.refresh_clusters().await {
                    log::warn!("scheduled cluster refresh failed: {}", e);
                }
            }
        })
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    log::info!("shutting down");

    refresher.abort();
    core.shutdown();
    preload.abort();

    let stats = core.cache().stats();
    log::info!(
        "cache: {} hits, {} misses, {} writes, {} failed writes",
        stats.hits,
        stats.misses,
        stats.writes,
        stats.write_failures
    );
    Ok(())
}

/// `$DENGUEMAP_DATA_DIR`, or the parent of the tile cache root
fn data_dir(config: &CoreConfig) -> PathBuf {
    std::env::var_os("DENGUEMAP_DATA_DIR")
        .map(PathBuf::from)
        .or_else(|| config.cache.root.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `$DENGUEMAP_LOCATION` as `lon,lat`, or the fixed fallback location
fn location_from_env() -> Arc<dyn LocationProvider> {
    let Ok(raw) = std::env::var("DENGUEMAP_LOCATION") else {
        log::info!("DENGUEMAP_LOCATION not set, using fallback location");
        return Arc::new(FixedLocation::default());
    };

    let parsed = raw
        .split_once(',')
        .and_then(|(lon, lat)| Some((lon.trim().parse::<f64>().ok()?, lat.trim().parse::<f64>().ok()?)));

    let location = SharedLocation::new();
    match parsed {
        Some((lon, lat)) => location.set(LonLat::new(lon, lat)),
        None => log::warn!("could not parse DENGUEMAP_LOCATION={:?}, live alerts disabled", raw),
    }
    Arc::new(location)
}
