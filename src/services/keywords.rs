use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Lowercased relevance terms. Empty means every article is relevant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordSet {
    terms: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for t in terms {
            let t = t.as_ref().trim().to_lowercase();
            if !t.is_empty() && !out.contains(&t) {
                out.push(t);
            }
        }
        Self { terms: out }
    }

    /// One term per line, blank lines skipped. A missing or unreadable file
    /// yields an empty set.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => {
                let set = Self::new(content.lines());
                info!(path = %path.display(), count = set.len(), "keywords loaded");
                set
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "keywords file not available, all news will be considered relevant");
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn is_relevant(&self, title: &str) -> bool {
        is_relevant(title, self)
    }
}

/// Case-insensitive substring test of `title` against every keyword.
pub fn is_relevant(title: &str, keywords: &KeywordSet) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let title = title.to_lowercase();
    keywords.terms.iter().any(|k| title.contains(k.as_str()))
}
