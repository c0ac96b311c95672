use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::bon;
use chrono::Local;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use scraper::{Html, Selector};
use tracing::{info, warn};
use url::Url;

use crate::models::types::Article;

pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Finds and downloads a picture for an article.
///
/// Feed-embedded media wins over anything scraped from the article page; the page
/// is only fetched when the feed carries no image at all. Failures never escape:
/// a missing picture just means a text-only post.
pub struct ImageResolver {
    client: Client,
    images_dir: PathBuf,
}

#[bon]
impl ImageResolver {
    #[builder]
    pub fn new(
        #[builder(into)] images_dir: PathBuf,
        #[builder(default = Duration::from_secs(10))] timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, images_dir })
    }
}

impl ImageResolver {
    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub async fn fetch_image(&self, article: &Article) -> Option<PathBuf> {
        match self.try_fetch_image(article).await {
            Ok(Some(path)) => {
                info!(path = %path.display(), "downloaded image");
                Some(path)
            }
            Ok(None) => {
                info!(link = %article.link, "no valid image found for this article");
                None
            }
            Err(e) => {
                warn!(link = %article.link, error = %e, "image extraction failed");
                None
            }
        }
    }

    async fn try_fetch_image(&self, article: &Article) -> Result<Option<PathBuf>, Box<dyn std::error::Error + Send + Sync>> {
        let img_url = match candidate_from_feed(article) {
            Some(u) => Some(u),
            None => self.candidate_from_page(&article.link).await?,
        };
        let Some(img_url) = img_url else { return Ok(None) };

        info!(url = %img_url, "image: download");
        let res = self
            .client
            .get(&img_url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?
            .error_for_status()?;
        let ext = image_extension(res.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()));
        let bytes = res.bytes().await?;

        tokio::fs::create_dir_all(&self.images_dir).await?;
        let path = self.images_dir.join(image_file_name(ext));
        tokio::fs::write(&path, &bytes).await?;
        Ok(Some(path))
    }

    async fn candidate_from_page(&self, link: &str) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        if link.is_empty() {
            return Ok(None);
        }
        info!(link = %link, "image: scraping article page");
        let html = self
            .client
            .get(link)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?
            .text()
            .await?;
        Ok(candidate_from_html(&html, Url::parse(link).ok().as_ref()))
    }
}

/// Feed-embedded image url: media content, then media thumbnail, then the
/// first link whose declared type mentions `image`.
pub fn candidate_from_feed(article: &Article) -> Option<String> {
    article
        .media_content
        .first()
        .or_else(|| article.media_thumbnail.first())
        .cloned()
        .or_else(|| article.links.iter().find(|l| l.is_image()).map(|l| l.href.clone()))
        .filter(|u| !u.trim().is_empty())
}

/// `og:image` (resolved against `base` when relative), else the first absolute
/// `<img src>` that does not look like site chrome.
pub fn candidate_from_html(html: &str, base: Option<&Url>) -> Option<String> {
    let document = Html::parse_document(html);

    let og = Selector::parse(r#"meta[property="og:image"]"#).ok()?;
    if let Some(content) = document
        .select(&og)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|c| !c.is_empty())
    {
        return match base {
            Some(b) => b.join(content).ok().map(|u| u.to_string()).or_else(|| Some(content.to_string())),
            None => Some(content.to_string()),
        };
    }

    let img = Selector::parse("img").ok()?;
    document
        .select(&img)
        .filter_map(|el| el.value().attr("src"))
        .find(|src| src.starts_with("http") && !src.contains("logo") && !src.contains("icon"))
        .map(str::to_string)
}

/// File extension for a downloaded picture, from its `Content-Type`.
/// Unknown or missing types are saved as `jpg`.
pub fn image_extension(content_type: Option<&str>) -> &'static str {
    let mime = content_type
        .and_then(|c| c.split(';').next())
        .map(|c| c.trim().to_ascii_lowercase())
        .unwrap_or_default();
    match mime.as_str() {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

fn image_file_name(ext: &str) -> String {
    format!("image_{}.{}", Local::now().format("%Y-%m-%d_%H-%M-%S"), ext)
}
