//! Spotify client for artist search.
//!
//! Uses the client-credentials flow: a single bearer credential is cached for
//! the whole process and refreshed once its reported lifetime (minus a safety
//! margin) has elapsed. Search results are never cached; every search
//! round-trips to the API.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::SpotifyConfig;
use crate::db::Artist;

/// Subtracted from the credential lifetime reported by the token endpoint, so
/// a request never rides a token about to expire mid-flight.
pub const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(300);

/// Maximum number of search results requested upstream.
const SEARCH_LIMIT: &str = "10";

#[derive(Debug, Error)]
pub enum SpotifyError {
    #[error("Failed to authenticate with Spotify")]
    Auth(#[source] reqwest::Error),
    #[error("Artist search on Spotify failed")]
    Search(#[source] reqwest::Error),
}

#[derive(Debug, Clone)]
struct CachedCredential {
    access_token: String,
    expires_at: Instant,
}

impl CachedCredential {
    fn new(access_token: String, expires_in_secs: u64) -> Self {
        let usable = Duration::from_secs(expires_in_secs)
            .saturating_sub(TOKEN_EXPIRY_MARGIN);
        Self {
            access_token,
            expires_at: Instant::now() + usable,
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    artists: Option<ArtistPage>,
}

#[derive(Debug, Deserialize)]
struct ArtistPage {
    items: Option<Vec<ArtistItem>>,
}

#[derive(Debug, Deserialize)]
struct ArtistItem {
    id: Option<String>,
    name: Option<String>,
    external_urls: Option<ExternalUrls>,
    images: Option<Vec<Image>>,
}

#[derive(Debug, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: String,
}

/// Spotify API client with a process-wide cached bearer credential.
pub struct SpotifyClient {
    http: reqwest::Client,
    config: SpotifyConfig,
    credential: Mutex<Option<CachedCredential>>,
}

impl SpotifyClient {
    pub fn new(config: SpotifyConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            credential: Mutex::new(None),
        }
    }

    /// Return the cached bearer token, refreshing it first if it is absent or
    /// past its usable lifetime.
    async fn access_token(&self) -> Result<String, SpotifyError> {
        let mut guard = self.credential.lock().await;

        if let Some(cred) = guard.as_ref() {
            if cred.is_fresh(Instant::now()) {
                return Ok(cred.access_token.clone());
            }
        }

        let cred = self.request_credential().await?;
        let token = cred.access_token.clone();
        *guard = Some(cred);
        Ok(token)
    }

    async fn request_credential(&self) -> Result<CachedCredential, SpotifyError> {
        let basic = BASE64.encode(format!(
            "{}:{}",
            self.config.client_id, self.config.client_secret
        ));

        let response = self
            .http
            .post(&self.config.token_url)
            .header("Authorization", format!("Basic {}", basic))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(SpotifyError::Auth)?
            .error_for_status()
            .map_err(SpotifyError::Auth)?;

        let body: TokenResponse = response.json().await.map_err(SpotifyError::Auth)?;

        tracing::debug!("Refreshed Spotify credential ({}s lifetime)", body.expires_in);
        Ok(CachedCredential::new(body.access_token, body.expires_in))
    }

    /// Search artists by name, at most 10 results in upstream relevance order.
    pub async fn search_artists(&self, query: &str) -> Result<Vec<Artist>, SpotifyError> {
        let token = self.access_token().await?;

        let response = self
            .http
            .get(format!("{}/search", self.config.api_url))
            .query(&[("q", query), ("type", "artist"), ("limit", SEARCH_LIMIT)])
            .bearer_auth(token)
            .send()
            .await
            .map_err(SpotifyError::Search)?
            .error_for_status()
            .map_err(SpotifyError::Search)?;

        let body: SearchResponse = response.json().await.map_err(SpotifyError::Search)?;
        Ok(map_artists(body))
    }
}

/// Map the upstream payload to embedded artists. A syntactically valid but
/// structurally unexpected payload degrades to no results instead of an
/// error, so search stays non-fatal to the surrounding flow.
fn map_artists(response: SearchResponse) -> Vec<Artist> {
    let items = match response.artists.and_then(|page| page.items) {
        Some(items) => items,
        None => {
            tracing::warn!("Malformed Spotify search payload, returning no results");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .map(|item| Artist {
            id: item.id,
            name: item.name.unwrap_or_else(|| "unknown".to_string()),
            href: item.external_urls.and_then(|urls| urls.spotify),
            image_url: item
                .images
                .and_then(|images| images.into_iter().next())
                .map(|image| image.url),
        })
        .collect()
}
