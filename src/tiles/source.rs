use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::time::Duration;

use crate::core::constants::MAPTILER_API_KEY_ENV;
use crate::core::geo::TileKey;
use crate::traits::TileFetcher;
use crate::{MapError, Result};

/// Shared async HTTP client. Building it once keeps TLS sessions and the
/// connection pool alive across the thousands of requests of a grid load.
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("denguemap/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(16)
        .build()
        .unwrap_or_else(|e| {
            log::warn!("falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
});

/// Anything that can produce tile URLs for a given key
pub trait TileSource: Send + Sync {
    fn url(&self, key: TileKey) -> String;
}

/// MapTiler raster styles
#[derive(Debug, Clone)]
pub struct MapTilerSource {
    api_key: String,
    style: String,
    format: String,
}

impl MapTilerSource {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            style: "dataviz".to_string(),
            format: "png".to_string(),
        }
    }

    /// Reads the key from `$MAPTILER_API_KEY`
    pub fn from_env() -> Result<Self> {
        std::env::var(MAPTILER_API_KEY_ENV)
            .map(Self::new)
            .map_err(|_| MapError::Config(format!("{} is not set", MAPTILER_API_KEY_ENV)))
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }
}

impl TileSource for MapTilerSource {
    fn url(&self, key: TileKey) -> String {
        format!(
            "https://api.maptiler.com/maps/{}/{}/{}/{}.{}?key={}",
            self.style, key.zoom, key.x, key.y, self.format, self.api_key
        )
    }
}

/// Default OpenStreetMap tile servers
pub struct OpenStreetMapSource {
    subdomains: Vec<&'static str>,
}

impl OpenStreetMapSource {
    pub fn new() -> Self {
        Self {
            subdomains: vec!["a", "b", "c"],
        }
    }
}

impl Default for OpenStreetMapSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TileSource for OpenStreetMapSource {
    fn url(&self, key: TileKey) -> String {
        if self.subdomains.is_empty() {
            return format!(
                "https://tile.openstreetmap.org/{}/{}/{}.png",
                key.zoom, key.x, key.y
            );
        }

        let idx = ((key.x as usize) + (key.y as usize)) % self.subdomains.len();
        format!(
            "https://{}.tile.openstreetmap.org/{}/{}/{}.png",
            self.subdomains[idx], key.zoom, key.x, key.y
        )
    }
}

/// [`TileFetcher`] that downloads from any [`TileSource`] over HTTP
pub struct HttpTileFetcher {
    source: Box<dyn TileSource>,
}

impl HttpTileFetcher {
    pub fn new(source: impl TileSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }
}

#[async_trait]
impl TileFetcher for HttpTileFetcher {
    async fn fetch_tile(&self, key: TileKey) -> Result<Vec<u8>> {
        let url = self.source.url(key);
        let response = HTTP_CLIENT
            .get(&url)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(MapError::Http {
                status: status.as_u16(),
                url: redact_key(&url),
            });
        }

        let data = response.bytes().await.map_err(network_error)?.to_vec();
        log::trace!("downloaded tile {} ({} bytes)", key, data.len());
        Ok(data)
    }
}

/// Transport errors carry the request URL, key included; drop it
pub(crate) fn network_error(e: reqwest::Error) -> MapError {
    MapError::Network(e.without_url())
}

/// Strip the query string so API keys never reach logs or errors
pub(crate) fn redact_key(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{}?<redacted>", base),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maptiler_url() {
        let source = MapTilerSource::new("abc123");
        assert_eq!(
            source.url(TileKey::new(25837, 16267, 15)),
            "https://api.maptiler.com/maps/dataviz/15/25837/16267.png?key=abc123"
        );

        let streets = MapTilerSource::new("k").with_style("streets-v2").with_format("jpg");
        assert!(streets.url(TileKey::new(1, 2, 3)).starts_with("https://api.maptiler.com/maps/streets-v2/3/1/2.jpg"));
    }

    #[test]
    fn test_osm_rotates_subdomains() {
        let source = OpenStreetMapSource::new();
        assert_eq!(
            source.url(TileKey::new(0, 0, 1)),
            "https://a.tile.openstreetmap.org/1/0/0.png"
        );
        assert_eq!(
            source.url(TileKey::new(1, 0, 1)),
            "https://b.tile.openstreetmap.org/1/1/0.png"
        );
    }

    #[test]
    fn test_redact_key() {
        assert_eq!(
            redact_key("https://h/1/2/3.png?key=secret"),
            "https://h/1/2/3.png?<redacted>"
        );
        assert_eq!(redact_key("https://h/1/2/3.png"), "https://h/1/2/3.png");
    }

    /// Nothing listens on port 1, so the request fails before any response
    struct UnreachableSource;

    impl TileSource for UnreachableSource {
        fn url(&self, key: TileKey) -> String {
            format!("http://127.0.0.1:1/{}/{}/{}.png?key=SUPERSECRETKEY", key.zoom, key.x, key.y)
        }
    }

    #[tokio::test]
    async fn test_transport_error_hides_key() {
        let fetcher = HttpTileFetcher::new(UnreachableSource);
        let err = fetcher.fetch_tile(TileKey::new(1, 2, 3)).await.unwrap_err();

        assert!(matches!(err, MapError::Network(_)));
        let message = err.to_string();
        assert!(!message.contains("SUPERSECRETKEY"), "key leaked: {}", message);
    }
}
