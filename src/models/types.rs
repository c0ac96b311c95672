use bon::Builder;
use derive_more::{AsRef, Display, From, Into};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum_macros::Display as StrumDisplay;

/// One feed entry: what the pipeline picks, writes about and illustrates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder, Serialize, Deserialize)]
pub struct Article {
    #[builder(into)]
    pub title: String,
    #[builder(into, default)]
    pub summary: String,
    #[builder(into, default)]
    pub link: String,
    /// `media:content` urls in feed order
    #[builder(default)]
    pub media_content: Vec<String>,
    /// `media:thumbnail` urls in feed order
    #[builder(default)]
    pub media_thumbnail: Vec<String>,
    #[builder(default)]
    pub links: Vec<ArticleLink>,
}

/// A typed link attached to an entry (RSS `enclosure`, Atom `link`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleLink {
    pub href: String,
    pub kind: Option<String>,
}

impl ArticleLink {
    pub fn new(href: impl Into<String>, kind: Option<&str>) -> Self {
        Self { href: href.into(), kind: kind.map(str::to_string) }
    }

    pub fn is_image(&self) -> bool {
        self.kind.as_deref().is_some_and(|k| k.contains("image"))
    }
}

/// Generated status text, already trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, From, Into, Display, AsRef)]
pub struct PostText(String);

impl PostText {
    /// Returns `None` for blank input.
    pub fn non_empty(text: &str) -> Option<Self> {
        let t = text.trim();
        if t.is_empty() { None } else { Some(Self(t.to_string())) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of a single publish attempt.
#[derive(Debug, Clone, PartialEq, Eq, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum PublishOutcome {
    /// Nothing to post: generation produced no text.
    Empty,
    /// Dry-run: the rendered preview, nothing sent.
    Previewed(String),
    /// Sent through the named poster.
    Posted { poster: String, with_image: bool },
}

/// What one scheduler firing ended with.
#[derive(Debug, Clone, PartialEq, Eq, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum TickOutcome {
    NoArticle,
    NoText,
    Published { outcome: PublishOutcome, image: Option<PathBuf> },
}
