//! Configuration builders for integration tests

use std::path::Path;
use std::time::Duration;

use asset_scraper::Config;
use asset_scraper::config::EndpointConfig;

use super::MockPlatform;

/// Config pointed at `platform`, writing below `out`, with immediate retries
pub fn test_config(platform: &MockPlatform, out: &Path) -> Config {
    let mut config = Config::default();
    config.output.output_dir = Some(out.to_path_buf());
    config.network.max_concurrent_requests = 4;
    config.network.request_timeout = Duration::from_secs(10);
    config.network.endpoints = EndpointConfig {
        asset_delivery_url: platform.asset_delivery_url(),
        content_store_url: platform.content_store_url(),
    };
    config.retry.initial_delay = Duration::ZERO;
    config.retry.jitter = false;
    config
}
