pub mod cache;
pub mod loader;
pub mod source;

// Re-exports for convenience
pub use cache::{CacheStats, TileCache};
pub use loader::{TileData, TileFetchCoordinator, TileOrigin, TileResult};
pub use source::{HttpTileFetcher, MapTilerSource, OpenStreetMapSource, TileSource};
