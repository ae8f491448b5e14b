//! Content resolution — the two-phase redirect protocol.
//!
//! 1. Ask the asset delivery endpoint (`?id=&version=`) or the content store
//!    endpoint (`?hash=`) where the content lives. Redirects are not followed;
//!    the `Location` header of a 200/3xx response is the content URL.
//! 2. Download the content URL, keeping its `Last-Modified` header.
//!
//! [`AssetSource`] is the seam the fetch engine works against; [`HttpResolver`]
//! is the production implementation.

use crate::config::NetworkConfig;
use crate::error::{Error, Phase, ResolveError, Result};
use crate::types::{AssetRef, ResolvedAsset};
use reqwest::StatusCode;
use reqwest::header::{COOKIE, HeaderValue};
use url::Url;

/// Header carrying the resolved content URL
pub const LOCATION_HEADER: &str = "Location";

/// Header carrying the content timestamp
pub const LAST_MODIFIED_HEADER: &str = "Last-Modified";

/// Header carrying the number of versions of an asset
pub const VERSION_COUNT_HEADER: &str = "roblox-assetversionnumber";

/// Cookie name used to send the session token
pub const AUTH_COOKIE_NAME: &str = ".ROBLOSECURITY";

/// Abstraction over asset resolution, enabling testability.
#[async_trait::async_trait]
pub trait AssetSource: Send + Sync {
    /// Resolve `target` at `version` to its content
    async fn resolve(
        &self,
        target: &AssetRef,
        version: u32,
    ) -> std::result::Result<ResolvedAsset, ResolveError>;

    /// Discover how many versions asset `id` has
    ///
    /// A 403 is tolerated here: the latest version may be gone while the asset
    /// itself is still valid.
    async fn probe_version_count(&self, id: i64) -> std::result::Result<u32, ResolveError>;
}

/// Classify a phase-1 response status
///
/// OK and redirects succeed, 403 is [`ResolveError::NotAccessible`] unless
/// `allow_forbidden` is set, 409 is always [`ResolveError::Locked`], and any other
/// status is a (retryable) [`ResolveError::Status`].
pub fn classify_status(
    phase: Phase,
    status: StatusCode,
    allow_forbidden: bool,
) -> std::result::Result<(), ResolveError> {
    match status {
        StatusCode::FORBIDDEN if allow_forbidden => Ok(()),
        StatusCode::FORBIDDEN => Err(ResolveError::NotAccessible { phase }),
        StatusCode::CONFLICT => Err(ResolveError::Locked { phase }),
        s if s == StatusCode::OK || s.is_redirection() => Ok(()),
        s => Err(ResolveError::Status {
            phase,
            status: s.as_u16(),
        }),
    }
}

/// Content length in MiB, rounded to 6 decimal places
pub fn size_in_mb(len: usize) -> f64 {
    let mb = len as f64 / 1024.0 / 1024.0;
    (mb * 1_000_000.0).round() / 1_000_000.0
}

fn header_str<'a>(
    response: &'a reqwest::Response,
    phase: Phase,
    header: &'static str,
) -> std::result::Result<&'a str, ResolveError> {
    let value = response
        .headers()
        .get(header)
        .ok_or(ResolveError::MissingHeader { phase, header })?;
    value.to_str().map_err(|_| ResolveError::InvalidHeader {
        phase,
        header,
        value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
    })
}

/// Production [`AssetSource`] speaking HTTP to the remote platform.
#[derive(Clone)]
pub struct HttpResolver {
    client: reqwest::Client,
    asset_delivery: Url,
    content_store: Url,
    auth_cookie: Option<HeaderValue>,
}

impl HttpResolver {
    /// Build a resolver with one shared client for all requests
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        let parse = |value: &str, key: &str| {
            Url::parse(value).map_err(|e| Error::config(format!("invalid URL '{value}': {e}"), key))
        };
        let asset_delivery = parse(
            &config.endpoints.asset_delivery_url,
            "endpoints.asset_delivery_url",
        )?;
        let content_store = parse(
            &config.endpoints.content_store_url,
            "endpoints.content_store_url",
        )?;

        let auth_cookie = config
            .auth_token
            .as_deref()
            .map(|token| {
                let mut value = HeaderValue::from_str(&format!("{AUTH_COOKIE_NAME}={token}"))
                    .map_err(|_| {
                        Error::config("auth token contains invalid characters", "auth_token")
                    })?;
                value.set_sensitive(true);
                Ok::<_, Error>(value)
            })
            .transpose()?;

        Ok(Self {
            client,
            asset_delivery,
            content_store,
            auth_cookie,
        })
    }

    fn asset_delivery_url(&self, id: i64, version: u32) -> Url {
        let mut url = self.asset_delivery.clone();
        url.query_pairs_mut()
            .append_pair("id", &id.to_string())
            .append_pair("version", &version.to_string());
        url
    }

    fn content_store_url(&self, hash: &str) -> Url {
        let mut url = self.content_store.clone();
        url.query_pairs_mut().append_pair("hash", hash);
        url
    }

    /// Phase 1: request the metadata endpoint and check its status.
    async fn locate(
        &self,
        phase: Phase,
        url: Url,
        allow_forbidden: bool,
    ) -> std::result::Result<reqwest::Response, ResolveError> {
        let mut request = self.client.get(url);
        if let Some(cookie) = &self.auth_cookie {
            request = request.header(COOKIE, cookie.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|source| ResolveError::Request { phase, source })?;
        classify_status(phase, response.status(), allow_forbidden)?;
        Ok(response)
    }

    /// Resolve the `Location` header of a phase-1 response to an absolute URL.
    fn content_location(
        response: &reqwest::Response,
        phase: Phase,
    ) -> std::result::Result<Url, ResolveError> {
        let location = header_str(response, phase, LOCATION_HEADER)?;
        response
            .url()
            .join(location)
            .map_err(|_| ResolveError::InvalidHeader {
                phase,
                header: LOCATION_HEADER,
                value: location.to_string(),
            })
    }

    /// Phase 2: download the content URL.
    async fn fetch_content(
        &self,
        content_url: Url,
    ) -> std::result::Result<ResolvedAsset, ResolveError> {
        let phase = Phase::Content;
        let response = self
            .client
            .get(content_url.clone())
            .send()
            .await
            .map_err(|source| ResolveError::Request { phase, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status {
                phase,
                status: status.as_u16(),
            });
        }

        let last_modified = header_str(&response, phase, LAST_MODIFIED_HEADER)?.to_string();
        let content = response
            .bytes()
            .await
            .map_err(|source| ResolveError::Request { phase, source })?;

        Ok(ResolvedAsset {
            content_url: content_url.into(),
            last_modified,
            size_mb: size_in_mb(content.len()),
            content,
        })
    }
}

#[async_trait::async_trait]
impl AssetSource for HttpResolver {
    async fn resolve(
        &self,
        target: &AssetRef,
        version: u32,
    ) -> std::result::Result<ResolvedAsset, ResolveError> {
        let (phase, url) = match target {
            AssetRef::Id(id) => (Phase::AssetDelivery, self.asset_delivery_url(*id, version)),
            AssetRef::Hash(hash) => (Phase::ContentStore, self.content_store_url(hash)),
        };

        let response = self.locate(phase, url, false).await?;
        let content_url = Self::content_location(&response, phase)?;
        tracing::trace!(asset = %target, version, url = %content_url, "resolved content location");

        self.fetch_content(content_url).await
    }

    async fn probe_version_count(&self, id: i64) -> std::result::Result<u32, ResolveError> {
        let phase = Phase::Probe;
        let response = self
            .locate(phase, self.asset_delivery_url(id, 0), true)
            .await?;

        let raw = header_str(&response, phase, VERSION_COUNT_HEADER)?;
        raw.trim()
            .parse::<u32>()
            .map_err(|_| ResolveError::InvalidHeader {
                phase,
                header: VERSION_COUNT_HEADER,
                value: raw.to_string(),
            })
    }
}
