//! GitHub-backed [`RemoteStore`]: the aggregate lives in a repository file
//! written through the contents API, the backup in a gist.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use arcade_config::GithubConfig;

use crate::error::SyncError;
use crate::remote::{RemoteDocument, RemoteStore};

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
const BACKUP_FILE_NAME: &str = "scores.json";
const BACKUP_DESCRIPTION: &str = "Arcade High Scores Backup";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Contents-API file entry.  `content` is base64 with embedded newlines;
/// files over 1 MB come back with `encoding: "none"` and no content.
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Deserialize)]
struct BlobResponse {
    content: String,
}

#[derive(Debug, Clone)]
pub struct GithubStore {
    client: reqwest::Client,
    settings: GithubConfig,
}

impl GithubStore {
    pub fn new(settings: GithubConfig) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("arcade-scores/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, settings })
    }

    pub fn contents_url(&self) -> String {
        let s = &self.settings;
        format!(
            "{}/repos/{}/{}/contents/{}",
            s.api_base_url.trim_end_matches('/'),
            s.repo_owner,
            s.repo_name,
            s.scores_path
        )
    }

    pub fn blob_url(&self, sha: &str) -> String {
        let s = &self.settings;
        format!(
            "{}/repos/{}/{}/git/blobs/{}",
            s.api_base_url.trim_end_matches('/'),
            s.repo_owner,
            s.repo_name,
            sha
        )
    }

    pub fn gist_url(&self) -> String {
        format!(
            "{}/gists/{}",
            self.settings.api_base_url.trim_end_matches('/'),
            self.settings.gist_id
        )
    }

    fn headers(&self) -> Result<HeaderMap, SyncError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", self.settings.token))
            .map_err(|_| SyncError::InvalidCredential)?;
        headers.insert(AUTHORIZATION, auth_value);
        Ok(headers)
    }

    /// Raw text of a blob, for files too large to be inlined in the
    /// contents response.  Addressed by `sha`, so it is the same version.
    async fn fetch_blob(&self, sha: &str) -> Result<String, SyncError> {
        let response = self
            .client
            .get(self.blob_url(sha))
            .headers(self.headers()?)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::api(status.as_u16(), excerpt(&text)));
        }
        let blob: BlobResponse = response.json().await?;
        decode_content(&blob.content)
    }
}

#[async_trait]
impl RemoteStore for GithubStore {
    /// Document and version marker come from one contents-API response, so
    /// the marker always describes the exact bytes that were read.  Only a
    /// 404 means "no document yet"; any other failure ends the attempt.
    async fn fetch(&self) -> Result<RemoteDocument, SyncError> {
        let response = self
            .client
            .get(self.contents_url())
            .query(&[("ref", self.settings.branch.as_str())])
            .headers(self.headers()?)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("no scores file in repository yet");
            return Ok(RemoteDocument::default());
        }
        if status != StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::api(status.as_u16(), excerpt(&text)));
        }

        let contents: ContentsResponse = response.json().await?;
        let text = if contents.encoding == "base64" {
            decode_content(&contents.content)?
        } else {
            self.fetch_blob(&contents.sha).await?
        };

        // An empty file still has a version; it is overwritten under that sha.
        let document = if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text)?)
        };
        Ok(RemoteDocument {
            document,
            version: Some(contents.sha),
        })
    }

    async fn write(&self, content: &str, version: Option<&str>) -> Result<(), SyncError> {
        let body = contents_put_body(
            &self.settings.commit_message,
            content,
            version,
            &self.settings.branch,
        );
        let response = self
            .client
            .put(self.contents_url())
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        classify_write_status(status, &text)
    }

    async fn write_backup(&self, content: &str) -> Result<(), SyncError> {
        let response = self
            .client
            .patch(self.gist_url())
            .headers(self.headers()?)
            .json(&gist_patch_body(content))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(SyncError::api(status.as_u16(), excerpt(&text)))
    }

    fn backup_configured(&self) -> bool {
        !self.settings.gist_id.trim().is_empty()
    }
}

/// Body of the contents-API update.  `sha` is only sent when a previous
/// version was observed; it is what lets the server detect lost updates.
pub fn contents_put_body(message: &str, content: &str, sha: Option<&str>, branch: &str) -> Value {
    let mut body = json!({
        "message": message,
        "content": STANDARD.encode(content.as_bytes()),
        "branch": branch,
    });
    if let Some(sha) = sha {
        body["sha"] = Value::String(sha.to_string());
    }
    body
}

pub fn gist_patch_body(content: &str) -> Value {
    json!({
        "description": BACKUP_DESCRIPTION,
        "files": {
            BACKUP_FILE_NAME: { "content": content }
        }
    })
}

/// 200/201 succeed, 409 is a version conflict, anything else is an API error.
pub fn classify_write_status(status: StatusCode, body: &str) -> Result<(), SyncError> {
    match status {
        StatusCode::OK | StatusCode::CREATED => Ok(()),
        StatusCode::CONFLICT => Err(SyncError::Conflict),
        other => Err(SyncError::api(other.as_u16(), excerpt(body))),
    }
}

/// Decode GitHub's line-wrapped base64 into UTF-8 text.
pub fn decode_content(encoded: &str) -> Result<String, SyncError> {
    let compact: String = encoded.split_whitespace().collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|err| SyncError::Content(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| SyncError::Content(err.to_string()))
}

fn excerpt(body: &str) -> String {
    const MAX: usize = 300;
    match body.char_indices().nth(MAX) {
        Some((i, _)) => format!("{}…", &body[..i]),
        None => body.to_string(),
    }
}
