use mastodon_async::scopes::Scopes;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use bon::Builder;
use mastodon_async::Language;
use mastodon_async::Registration;
use mastodon_async::data::Data;
use mastodon_async::helpers::cli as m_cli;
use tracing::{error, info};

use super::utils::trim_with_ellipsis;
use crate::traits::poster::Poster;

#[derive(Debug, Deserialize)]
struct MediaAttachment {
    id: String,
}

#[derive(Builder)]
pub struct MastodonPoster {
    #[builder(default)]
    pub client: Client,
    #[builder(into)]
    pub base_url: String,
    #[builder(into)]
    pub access_token: String,
    pub visibility: Option<String>,
    pub language: Option<String>,
    pub max_chars: Option<usize>,
}

impl MastodonPoster {
    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Uploads a local picture, returning the attachment id.
    pub async fn upload_media(&self, image: &Path) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let url = self.endpoint("/api/v2/media");
        let bytes = tokio::fs::read(image).await?;
        let file_name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.jpg".to_string());
        info!(url = %url, file = %file_name, size = bytes.len(), "mastodon: upload_media");
        let part = Part::bytes(bytes).file_name(file_name).mime_str(image_mime(image))?;
        let form = Form::new().part("file", part);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await?;
        let code = res.status();
        if !code.is_success() {
            let text = res.text().await.unwrap_or_default();
            error!(status = %code, body = %text, "mastodon: upload_media error");
            return Err(format!("Mastodon media error: {}", code).into());
        }
        let media: MediaAttachment = res.json().await?;
        Ok(media.id)
    }

    pub async fn post_status(
        &self,
        status: &str,
        media_id: Option<&str>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let url = self.endpoint("/api/v1/statuses");
        let mut body: Vec<(&str, String)> = vec![("status", status.to_string())];
        if let Some(v) = self.visibility.as_deref() {
            body.push(("visibility", v.to_string()));
        }
        if let Some(code) = self
            .language
            .as_deref()
            .and_then(Language::from_639_1)
            .and_then(|l| l.to_639_1())
        {
            body.push(("language", code.to_string()));
        }
        if let Some(id) = media_id {
            body.push(("media_ids[]", id.to_string()));
        }
        info!(url = %url, text_len = status.len(), visibility = ?self.visibility, with_media = media_id.is_some(), "mastodon: post_status");
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .form(&body)
            .send()
            .await?;
        let code = res.status();
        let text = res.text().await.unwrap_or_default();
        if code.is_success() {
            let created: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();
            info!(status = %code, id = created["id"].as_str().unwrap_or("?"), "mastodon: post_status ok");
            Ok(())
        } else {
            error!(status = %code, body = %text, "mastodon: post_status error");
            Err(format!("Mastodon error: {}", code).into())
        }
    }
}

/// MIME type sent with an uploaded picture, from its file extension.
fn image_mime(image: &Path) -> &'static str {
    let ext = image
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

#[async_trait]
impl Poster for MastodonPoster {
    fn name(&self) -> &str {
        "mastodon"
    }

    async fn post(&self, text: &str, image: Option<&Path>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let cut = if let Some(maxc) = self.max_chars {
            trim_with_ellipsis(text, maxc)
        } else {
            text.to_string()
        };
        let media_id = match image {
            Some(p) => Some(self.upload_media(p).await?),
            None => None,
        };
        self.post_status(&cut, media_id.as_deref()).await
    }
}

/// Interactive registration via mastodon-async; the resulting credentials are
/// persisted to `token_path` and the token returned.
pub async fn ensure_mastodon_token(
    base_url: &str,
    token_path: &Path,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    if let Some(token) = load_token_from_secrets(token_path)? {
        return Ok(token);
    }

    let registration = Registration::new(base_url)
        .client_name("feedposter")
        .scopes(Scopes::all())
        .build()
        .await?;
    let mastodon = m_cli::authenticate(registration).await?;

    let data = mastodon.data.clone();
    let serialized = serde_yaml::to_string(&data)?;
    if let Some(parent) = token_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(token_path, serialized)?;
    Ok(data.token.into_owned())
}

/// Token from a previously saved credentials file, if any. Never prompts.
pub fn load_token_from_secrets(
    token_path: &Path,
) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
    if token_path.exists() {
        let data = fs::read_to_string(token_path)?;
        let data: Data = serde_yaml::from_str(&data)?;
        if !data.token.is_empty() {
            return Ok(Some(data.token.into_owned()));
        }
    }
    Ok(None)
}
