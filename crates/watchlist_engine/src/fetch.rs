use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;
use watchlist_core::{HistoryEntry, UserProfile, Username};

use crate::ranking::{SelectorExtractor, UsernameExtractor};
use crate::{RemoteError, RemoteFailure};

pub const DEFAULT_RANKING_URL: &str = "https://myanimelist.net/users.php";
pub const DEFAULT_API_BASE_URL: &str = "https://api.jikan.moe/v3";

/// Remote services a harvest pass reads from.
#[async_trait::async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Raw usernames from the ranking page, in page order. May contain empty entries.
    async fn list_usernames(&self) -> Result<Vec<String>, RemoteError>;

    async fn get_user(&self, username: &Username) -> Result<UserProfile, RemoteError>;

    async fn get_history(&self, profile: &UserProfile) -> Result<Vec<HistoryEntry>, RemoteError>;
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub ranking_url: String,
    pub api_base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            ranking_url: DEFAULT_RANKING_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
        }
    }
}

/// Ranking page over HTTP plus the Jikan-style profile/history API.
pub struct HttpRemoteFetcher {
    settings: FetchSettings,
    client: reqwest::Client,
    extractor: Box<dyn UsernameExtractor>,
}

impl HttpRemoteFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, RemoteError> {
        let extractor = SelectorExtractor::ranking_page().map_err(|err| {
            RemoteError::new(RemoteFailure::InvalidSelector, err.to_string())
        })?;
        Self::with_extractor(settings, Box::new(extractor))
    }

    pub fn with_extractor(
        settings: FetchSettings,
        extractor: Box<dyn UsernameExtractor>,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| RemoteError::new(RemoteFailure::Network, err.to_string()))?;
        Ok(Self {
            settings,
            client,
            extractor,
        })
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }

    /// `{api_base}/user/{username}/{tail...}` with the username percent-encoded.
    fn api_url(&self, username: &str, tail: &[&str]) -> Result<Url, RemoteError> {
        let mut url = Url::parse(&self.settings.api_base_url)
            .map_err(|err| RemoteError::new(RemoteFailure::InvalidUrl, err.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::new(RemoteFailure::InvalidUrl, "api base cannot be a base"))?
            .pop_if_empty()
            .push("user")
            .push(username)
            .extend(tail);
        Ok(url)
    }

    async fn get_bytes(&self, url: Url) -> Result<(Vec<u8>, Option<String>), RemoteError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(self.too_large(Some(content_len)));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(self.too_large(Some(next_len)));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok((bytes, content_type))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, RemoteError> {
        let (bytes, _) = self.get_bytes(url).await?;
        serde_json::from_slice(&bytes)
            .map_err(|err| RemoteError::new(RemoteFailure::Malformed, err.to_string()))
    }

    fn too_large(&self, actual: Option<u64>) -> RemoteError {
        RemoteError::new(
            RemoteFailure::TooLarge {
                max_bytes: self.settings.max_bytes,
                actual,
            },
            "response too large",
        )
    }
}

#[async_trait::async_trait]
impl RemoteFetcher for HttpRemoteFetcher {
    async fn list_usernames(&self) -> Result<Vec<String>, RemoteError> {
        let url = Url::parse(&self.settings.ranking_url)
            .map_err(|err| RemoteError::new(RemoteFailure::InvalidUrl, err.to_string()))?;
        let (bytes, content_type) = self.get_bytes(url).await?;

        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                return Err(RemoteError::new(
                    RemoteFailure::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "unsupported content type",
                ));
            }
        }

        let html = String::from_utf8_lossy(&bytes);
        Ok(self.extractor.extract(&html))
    }

    async fn get_user(&self, username: &Username) -> Result<UserProfile, RemoteError> {
        let url = self.api_url(username.as_str(), &[])?;
        let body: ProfileBody = self.get_json(url).await?;
        Ok(UserProfile {
            user_id: body.user_id,
            username: body.username.unwrap_or_else(|| username.to_string()),
        })
    }

    async fn get_history(&self, profile: &UserProfile) -> Result<Vec<HistoryEntry>, RemoteError> {
        let url = self.api_url(&profile.username, &["animelist", "all"])?;
        let body: HistoryBody = self.get_json(url).await?;
        Ok(body.anime.into_iter().map(HistoryEntry::from).collect())
    }
}

#[derive(Debug, Deserialize)]
struct ProfileBody {
    user_id: i64,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryBody {
    anime: Vec<HistoryItem>,
}

/// Counters may be absent or `null` (airing titles have no total); both read as 0.
#[derive(Debug, Deserialize)]
struct HistoryItem {
    mal_id: i64,
    title: String,
    #[serde(default)]
    score: Option<i64>,
    #[serde(default)]
    watched_episodes: Option<i64>,
    #[serde(default)]
    total_episodes: Option<i64>,
}

impl From<HistoryItem> for HistoryEntry {
    fn from(item: HistoryItem) -> Self {
        HistoryEntry {
            title_id: item.mal_id,
            title: item.title,
            score: item.score.unwrap_or(0),
            watched_episodes: item.watched_episodes.unwrap_or(0),
            total_episodes: item.total_episodes.unwrap_or(0),
        }
    }
}

fn map_status(status: StatusCode) -> RemoteError {
    match status {
        StatusCode::BAD_REQUEST => RemoteError::bad_request(),
        StatusCode::TOO_MANY_REQUESTS => RemoteError::too_many_requests(),
        other => RemoteError::new(RemoteFailure::HttpStatus(other.as_u16()), other.to_string()),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        return RemoteError::new(RemoteFailure::Timeout, err.to_string());
    }
    RemoteError::new(RemoteFailure::Network, err.to_string())
}
