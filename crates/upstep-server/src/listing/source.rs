//! Upstream listing sources.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use upstep_core::{FileInfo, ListingKey};

use crate::config::UpstreamConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream returned HTTP {status}")]
    Status { status: u16 },
    #[error("malformed listing response: {0}")]
    Malformed(String),
    #[error("upstream request failed: {0}")]
    Transport(String),
    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),
}

impl UpstreamError {
    /// Metric label for the failure.
    pub fn reason(&self) -> &'static str {
        match self {
            UpstreamError::Status { .. } => "status",
            UpstreamError::Malformed(_) => "malformed",
            UpstreamError::Transport(_) => "transport",
            UpstreamError::Timeout(_) => "timeout",
        }
    }
}

/// Something that can list the files under a key.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch(&self, key: &ListingKey) -> Result<Vec<FileInfo>, UpstreamError>;
}

#[derive(Debug, Deserialize)]
struct RemoteObject {
    name: String,
    #[serde(default)]
    url: Option<String>,
}

/// Either a bare array or `{"items": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListingBody {
    Bare(Vec<RemoteObject>),
    Wrapped { items: Vec<RemoteObject> },
}

impl ListingBody {
    fn into_objects(self) -> Vec<RemoteObject> {
        match self {
            ListingBody::Bare(items) | ListingBody::Wrapped { items } => items,
        }
    }
}

/// Lists files over HTTP: `GET {base_url}/{key}`.
#[derive(Debug, Clone)]
pub struct HttpListingSource {
    client: reqwest::Client,
    base_url: String,
    public_base_url: String,
}

impl HttpListingSource {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .map_err(|e| UpstreamError::Transport(format!("Failed to create HTTP client: {e}")))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        let public_base_url = config
            .public_base_url
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| base_url.clone());

        Ok(Self {
            client,
            base_url,
            public_base_url,
        })
    }

    fn to_file(&self, object: RemoteObject) -> Option<FileInfo> {
        if object.name.is_empty() || object.name.ends_with('/') {
            return None;
        }
        let filename = object
            .name
            .rsplit('/')
            .next()
            .unwrap_or(&object.name)
            .to_string();
        let url = object
            .url
            .unwrap_or_else(|| format!("{}/{}", self.public_base_url, object.name));
        Some(FileInfo::new(url, filename))
    }
}

#[async_trait]
impl ListingSource for HttpListingSource {
    async fn fetch(&self, key: &ListingKey) -> Result<Vec<FileInfo>, UpstreamError> {
        let url = format!("{}/{}", self.base_url, key);
        tracing::debug!(url = %url, "fetching listing from upstream");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        let parsed: ListingBody =
            serde_json::from_slice(&body).map_err(|e| UpstreamError::Malformed(e.to_string()))?;

        Ok(parsed
            .into_objects()
            .into_iter()
            .filter_map(|o| self.to_file(o))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(public: Option<&str>) -> HttpListingSource {
        HttpListingSource::new(&UpstreamConfig {
            base_url: "http://store.test/listings/".into(),
            public_base_url: public.map(str::to_string),
            connect_timeout_ms: 100,
        })
        .unwrap()
    }

    #[test]
    fn test_object_to_file() {
        let src = source(Some("https://cdn.test/"));
        let file = src
            .to_file(RemoteObject {
                name: "beginner/2_italian_game.pgn".into(),
                url: None,
            })
            .unwrap();
        assert_eq!(file.filename, "2_italian_game.pgn");
        assert_eq!(file.display_name, "2 italian game");
        assert_eq!(file.url, "https://cdn.test/beginner/2_italian_game.pgn");

        let explicit = src
            .to_file(RemoteObject {
                name: "a.pgn".into(),
                url: Some("https://signed.test/a".into()),
            })
            .unwrap();
        assert_eq!(explicit.url, "https://signed.test/a");
    }

    #[test]
    fn test_folders_are_skipped() {
        let src = source(None);
        assert!(
            src.to_file(RemoteObject {
                name: "beginner/".into(),
                url: None,
            })
            .is_none()
        );
    }

    #[test]
    fn test_public_url_defaults_to_base() {
        let src = source(None);
        let file = src
            .to_file(RemoteObject {
                name: "x.pgn".into(),
                url: None,
            })
            .unwrap();
        assert_eq!(file.url, "http://store.test/listings/x.pgn");
    }

    #[test]
    fn test_both_body_shapes() {
        let bare: ListingBody = serde_json::from_str(r#"[{"name":"a.pgn"}]"#).unwrap();
        assert_eq!(bare.into_objects().len(), 1);
        let wrapped: ListingBody =
            serde_json::from_str(r#"{"items":[{"name":"a.pgn"},{"name":"b.pgn"}]}"#).unwrap();
        assert_eq!(wrapped.into_objects().len(), 2);
        assert!(serde_json::from_str::<ListingBody>(r#"{"files":[]}"#).is_err());
    }
}
