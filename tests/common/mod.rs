#![allow(dead_code)]

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use feedposter::models::Article;
use feedposter::services::feed::FeedClient;
use feedposter::services::generator::ContentGenerator;
use feedposter::services::images::ImageResolver;
use feedposter::services::keywords::KeywordSet;
use feedposter::services::pipeline::Pipeline;
use feedposter::services::publisher::Publisher;
use feedposter::traits::poster::Poster;
use feedposter::traits::text_generator::TextGenerator;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// One RSS item as test input.
pub struct Item<'a> {
    pub title: &'a str,
    pub link: String,
    pub media: Option<String>,
}

impl<'a> Item<'a> {
    pub fn new(title: &'a str, link: impl Into<String>) -> Self {
        Self { title, link: link.into(), media: None }
    }

    pub fn with_media(mut self, url: impl Into<String>) -> Self {
        self.media = Some(url.into());
        self
    }
}

pub fn rss(items: &[Item]) -> String {
    let mut body = String::new();
    for it in items {
        body.push_str("<item>");
        body.push_str(&format!("<title>{}</title>", it.title));
        body.push_str(&format!("<description>About {}</description>", it.title));
        body.push_str(&format!("<link>{}</link>", it.link));
        if let Some(m) = &it.media {
            body.push_str(&format!("<media:content url=\"{}\" medium=\"image\"/>", m));
        }
        body.push_str("</item>");
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/"><channel><title>Test</title>{}</channel></rss>"#,
        body
    )
}

pub async fn mount_feed(server: &MockServer, route: &str, xml: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(xml).insert_header("content-type", "application/rss+xml"))
        .mount(server)
        .await;
}

pub async fn mount_page(server: &MockServer, route: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(html.to_string()).insert_header("content-type", "text/html"))
        .mount(server)
        .await;
}

pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0xFF, 0xD9];

pub async fn mount_image(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(JPEG_BYTES.to_vec()).insert_header("content-type", "image/jpeg"))
        .mount(server)
        .await;
}

/// Generator fake: fixed reply (or error) and a call counter.
pub struct FakeGenerator {
    pub reply: Result<String, String>,
    pub calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self { reply: Ok(text.to_string()), calls: AtomicUsize::new(0) })
    }

    pub fn failing(msg: &str) -> Arc<Self> {
        Arc::new(Self { reply: Err(msg.to_string()), calls: AtomicUsize::new(0) })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map_err(|e| e.into())
    }
}

/// Poster fake recording `(text, image)` per call. Fails every call when
/// `fail_with` is set, otherwise only the first `fail_first` calls.
#[derive(Default)]
pub struct RecordingPoster {
    pub calls: Mutex<Vec<(String, Option<PathBuf>)>>,
    pub fail_with: Option<String>,
    pub fail_first: usize,
}

impl RecordingPoster {
    pub fn calls(&self) -> Vec<(String, Option<PathBuf>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Poster for RecordingPoster {
    fn name(&self) -> &str {
        "recording"
    }

    async fn post(&self, text: &str, image: Option<&Path>) -> Result<(), Box<dyn Error + Send + Sync>> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((text.to_string(), image.map(Path::to_path_buf)));
            calls.len()
        };
        match &self.fail_with {
            Some(msg) => Err(msg.clone().into()),
            None if n <= self.fail_first => Err(format!("rate limited (call {})", n).into()),
            None => Ok(()),
        }
    }
}

pub fn feed_client(sources: Vec<String>, keywords: &[&str], seed: u64) -> FeedClient {
    FeedClient::builder()
        .sources(sources)
        .keywords(Arc::new(KeywordSet::new(keywords.iter().copied())))
        .timeout(Duration::from_secs(5))
        .seed(seed)
        .build()
        .unwrap()
}

pub fn image_resolver(dir: &Path) -> ImageResolver {
    ImageResolver::builder()
        .images_dir(dir.join("images"))
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap()
}

pub fn pipeline(
    sources: Vec<String>,
    images_dir: &Path,
    generator: Arc<FakeGenerator>,
    poster: Arc<RecordingPoster>,
    dry_run: bool,
) -> Pipeline {
    let generator: Arc<dyn TextGenerator> = generator;
    let poster: Arc<dyn Poster> = poster;
    Pipeline::builder()
        .feed(feed_client(sources, &[], 1))
        .images(image_resolver(images_dir))
        .generator(ContentGenerator::builder().generator(generator).template("Write a short post.").build())
        .publisher(Publisher::new(Some(poster)))
        .dry_run(dry_run)
        .build()
}

pub fn article_with_link(link: String) -> Article {
    Article::builder().title("Climate summit begins").summary("Leaders gather.").link(link).build()
}

/// In-memory sink for log lines emitted on the current thread.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.contents().matches(needle).count()
    }
}

pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buf = LogBuffer::default();
    let writer = buf.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buf, guard)
}
