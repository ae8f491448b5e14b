//! Mock asset platform speaking the two-phase redirect protocol

use std::time::Duration;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// `Last-Modified` served with every content response
pub const LAST_MODIFIED: &str = "Wed, 21 Oct 2015 07:28:00 GMT";

/// Seconds since the epoch of [`LAST_MODIFIED`]
pub const LAST_MODIFIED_EPOCH: u64 = 1_445_412_480;

const DELIVERY_PATH: &str = "/v1/asset/";
const CONTENT_STORE_PATH: &str = "/v1/content";

/// A loopback URL whose port refuses connections
pub fn unreachable_url(path: &str) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}{path}")
}

/// A wiremock server with helpers for mounting assets
pub struct MockPlatform {
    pub server: MockServer,
}

impl MockPlatform {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn asset_delivery_url(&self) -> String {
        format!("{}{DELIVERY_PATH}", self.server.uri())
    }

    pub fn content_store_url(&self) -> String {
        format!("{}{CONTENT_STORE_PATH}", self.server.uri())
    }

    fn delivery(id: i64, version: u32) -> wiremock::MockBuilder {
        Mock::given(method("GET"))
            .and(path(DELIVERY_PATH))
            .and(query_param("id", id.to_string()))
            .and(query_param("version", version.to_string()))
    }

    async fn mount_content(&self, cdn_path: &str, body: &[u8]) {
        Mock::given(method("GET"))
            .and(path(cdn_path))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Last-Modified", LAST_MODIFIED)
                    .set_body_bytes(body.to_vec()),
            )
            .mount(&self.server)
            .await;
    }

    /// Serve `body` for asset `id` at `version` through a redirect
    pub async fn asset(&self, id: i64, version: u32, body: &[u8]) {
        let cdn_path = format!("/cdn/{id}-v{version}");
        Self::delivery(id, version)
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}{cdn_path}", self.server.uri())),
            )
            .mount(&self.server)
            .await;
        self.mount_content(&cdn_path, body).await;
    }

    /// Serve `body` for a content hash through the content store
    pub async fn hash(&self, hash: &str, body: &[u8]) {
        let cdn_path = format!("/cdn/{hash}");
        Mock::given(method("GET"))
            .and(path(CONTENT_STORE_PATH))
            .and(query_param("hash", hash))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", cdn_path.as_str()))
            .mount(&self.server)
            .await;
        self.mount_content(&cdn_path, body).await;
    }

    /// Answer the version probe of `id` with `count`, using `status`
    pub async fn versions(&self, id: i64, count: u32, status: u16) {
        Self::delivery(id, 0)
            .respond_with(
                ResponseTemplate::new(status)
                    .insert_header("roblox-assetversionnumber", count.to_string()),
            )
            .mount(&self.server)
            .await;
    }

    /// Redirect asset `id` at `version` to `location`, expecting exactly `calls` requests
    pub async fn redirect(&self, id: i64, version: u32, location: &str, calls: u64) {
        Self::delivery(id, version)
            .respond_with(ResponseTemplate::new(302).insert_header("Location", location))
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Serve `body` at `cdn_path` only after `delay`
    pub async fn slow_content(&self, cdn_path: &str, body: &[u8], delay: Duration) {
        Mock::given(method("GET"))
            .and(path(cdn_path))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Last-Modified", LAST_MODIFIED)
                    .set_body_bytes(body.to_vec())
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer asset `id` at `version` with a bare `status`, expecting exactly `calls` requests
    pub async fn status(&self, id: i64, version: u32, status: u16, calls: u64) {
        Self::delivery(id, version)
            .respond_with(ResponseTemplate::new(status))
            .expect(calls)
            .mount(&self.server)
            .await;
    }
}
