use std::sync::{Arc, Mutex};
use std::time::Duration;

use bon::bon;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use reqwest::Client;
use roxmltree::{Document, Node};
use scraper::Html;
use tracing::{debug, info, warn};

use crate::models::types::{Article, ArticleLink};
use crate::services::keywords::KeywordSet;

const MEDIA_RSS_NS: &str = "search.yahoo.com/mrss";

/// Polls the configured feeds and picks the first relevant entry.
///
/// Sources are visited in an order drawn from an owned random source so that the
/// first feed in the list is not always favoured. Seeding it makes the order
/// reproducible.
pub struct FeedClient {
    client: Client,
    sources: Vec<String>,
    keywords: Arc<KeywordSet>,
    rng: Mutex<StdRng>,
}

#[bon]
impl FeedClient {
    #[builder]
    pub fn new(
        sources: Vec<String>,
        keywords: Arc<KeywordSet>,
        timeout: Duration,
        seed: Option<u64>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let client = Client::builder().timeout(timeout).build()?;
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Ok(Self { client, sources, keywords, rng: Mutex::new(rng) })
    }
}

impl FeedClient {
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Next visiting order of the sources.
    pub fn shuffled_sources(&self) -> Vec<String> {
        let mut order = self.sources.clone();
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        order.shuffle(&mut *rng);
        order
    }

    /// Walks the sources in shuffled order and returns the first entry whose
    /// title passes the keyword filter. Unreachable or malformed feeds are
    /// skipped like empty ones.
    pub async fn fetch_latest_article(&self) -> Option<Article> {
        for url in self.shuffled_sources() {
            info!(url = %url, "feed: fetch");
            let entries = match self.fetch_entries(&url).await {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(url = %url, error = %e, "feed: source skipped");
                    continue;
                }
            };
            if entries.is_empty() {
                debug!(url = %url, "feed: no entries");
                continue;
            }
            if let Some(article) = entries.into_iter().find(|a| self.keywords.is_relevant(&a.title)) {
                info!(url = %url, title = %article.title, "feed: relevant article found");
                return Some(article);
            }
            debug!(url = %url, "feed: no relevant entries");
        }
        warn!(sources = self.sources.len(), "no relevant news found in any source");
        None
    }

    pub async fn fetch_entries(&self, url: &str) -> Result<Vec<Article>, Box<dyn std::error::Error + Send + Sync>> {
        let res = self.client.get(url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(format!("feed http error: {}", status).into());
        }
        let xml = res.text().await?;
        Ok(parse_feed(&xml)?)
    }
}

/// Parses RSS 2.0, RSS 1.0 and Atom documents into articles, in document order.
/// Entries without a title are dropped.
pub fn parse_feed(xml: &str) -> Result<Vec<Article>, roxmltree::Error> {
    let doc = Document::parse(xml)?;
    let mut items: Vec<Article> = Vec::new();
    for entry in doc
        .descendants()
        .filter(|n| n.is_element() && matches!(n.tag_name().name(), "item" | "entry"))
    {
        let Some(title) = plain_text(entry, &["title"]) else { continue };
        let summary = plain_text(entry, &["description", "summary", "content"])
            .map(|s| strip_html(&s))
            .unwrap_or_default();

        let mut link = plain_text(entry, &["link"]).unwrap_or_default();
        let mut links: Vec<ArticleLink> = Vec::new();
        for l in entry.children().filter(|n| n.is_element() && !is_media(*n)) {
            match l.tag_name().name() {
                "link" => {
                    if let Some(href) = l.attribute("href") {
                        let rel = l.attribute("rel").unwrap_or("alternate");
                        if link.is_empty() && rel == "alternate" {
                            link = href.to_string();
                        }
                        links.push(ArticleLink::new(href, l.attribute("type")));
                    }
                }
                "enclosure" => {
                    if let Some(href) = l.attribute("url") {
                        links.push(ArticleLink::new(href, l.attribute("type")));
                    }
                }
                _ => {}
            }
        }

        items.push(Article {
            title,
            summary,
            link,
            media_content: media_urls(entry, "content"),
            media_thumbnail: media_urls(entry, "thumbnail"),
            links,
        });
    }
    Ok(items)
}

fn is_media(n: Node) -> bool {
    n.tag_name().namespace().is_some_and(|ns| ns.contains(MEDIA_RSS_NS))
}

/// Trimmed text of the first non-media child named one of `names`.
fn plain_text(entry: Node, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        entry
            .children()
            .find(|n| n.is_element() && n.tag_name().name() == *name && !is_media(*n))
            .and_then(|n| n.text())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// `media:content` / `media:thumbnail` urls, including ones nested in `media:group`.
fn media_urls(entry: Node, name: &str) -> Vec<String> {
    entry
        .descendants()
        .filter(|n| n.is_element() && is_media(*n) && n.tag_name().name() == name)
        .filter_map(|n| n.attribute("url"))
        .map(str::to_string)
        .collect()
}

fn strip_html(s: &str) -> String {
    if !s.contains('<') {
        return s.to_string();
    }
    let fragment = Html::parse_fragment(s);
    let text: String = fragment.root_element().text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>World</title>
    <item>
      <title>Local elections results</title>
      <description><![CDATA[<p>Counting <b>finished</b> overnight.</p>]]></description>
      <link>https://news.example/elections</link>
      <media:thumbnail url="https://img.example/thumb.jpg" width="240"/>
    </item>
    <item>
      <title>Climate summit begins</title>
      <description>Leaders gather.</description>
      <link>https://news.example/climate</link>
      <media:group>
        <media:content url="https://img.example/a.jpg" medium="image"/>
        <media:content url="https://img.example/b.jpg" medium="image"/>
      </media:group>
      <enclosure url="https://img.example/enc.png" type="image/png" length="10"/>
    </item>
    <item>
      <description>No title here</description>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Blog</title>
  <entry>
    <title>Rust 2024 ships</title>
    <link rel="alternate" type="text/html" href="https://blog.example/rust-2024"/>
    <link rel="enclosure" type="image/jpeg" href="https://blog.example/cover.jpg"/>
    <summary>Editions are here.</summary>
  </entry>
</feed>"#;

    #[test]
    fn parses_rss_items_with_media() {
        let items = parse_feed(RSS).unwrap();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].title, "Local elections results");
        assert_eq!(items[0].summary, "Counting finished overnight.");
        assert_eq!(items[0].link, "https://news.example/elections");
        assert!(items[0].media_content.is_empty());
        assert_eq!(items[0].media_thumbnail, vec!["https://img.example/thumb.jpg".to_string()]);

        assert_eq!(
            items[1].media_content,
            vec!["https://img.example/a.jpg".to_string(), "https://img.example/b.jpg".to_string()]
        );
        assert_eq!(items[1].links, vec![ArticleLink::new("https://img.example/enc.png", Some("image/png"))]);
    }

    #[test]
    fn parses_atom_entries() {
        let items = parse_feed(ATOM).unwrap();
        assert_eq!(items.len(), 1);
        let a = &items[0];
        assert_eq!(a.title, "Rust 2024 ships");
        assert_eq!(a.link, "https://blog.example/rust-2024");
        assert_eq!(a.summary, "Editions are here.");
        assert_eq!(a.links.len(), 2);
        assert!(a.links[1].is_image());
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_feed("<rss><channel><item>").is_err());
        assert!(parse_feed("not xml at all").is_err());
    }

    #[test]
    fn empty_channel_has_no_entries() {
        let items = parse_feed("<rss version=\"2.0\"><channel><title>x</title></channel></rss>").unwrap();
        assert!(items.is_empty());
    }

    fn client(seed: u64) -> FeedClient {
        FeedClient::builder()
            .sources(vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()])
            .keywords(Arc::new(KeywordSet::default()))
            .timeout(Duration::from_secs(1))
            .seed(seed)
            .build()
            .unwrap()
    }

    #[test]
    fn seeded_order_is_reproducible() {
        let a = client(7);
        let b = client(7);
        let first = a.shuffled_sources();
        assert_eq!(first, b.shuffled_sources());
        assert_eq!(a.shuffled_sources(), b.shuffled_sources());

        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["a", "b", "c", "d"]);
    }
}
