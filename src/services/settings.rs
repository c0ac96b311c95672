use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

pub const DEFAULT_PROMPT: &str =
    "Write a short, engaging tweet (under 250 characters) based on the article title and summary.";
pub const DEFAULT_POSTS_PER_DAY: i64 = 3;
pub const MAX_POSTS_PER_DAY: u32 = 24;

pub const DEFAULT_SOURCES: [&str; 3] = [
    "https://feeds.bbci.co.uk/news/rss.xml",
    "https://www.reutersagency.com/feed/?best-topics=technology",
    "https://rss.nytimes.com/services/xml/rss/nyt/World.xml",
];

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub custom_prompt: String,
    pub posts_per_day: i64,
    pub base_hour: u32,
    pub poll_interval_secs: u64,
    pub dry_run: bool,
    pub sources: Vec<String>,
    pub keywords_path: String,
    pub images_dir: String,
    pub request_timeout_secs: u64,
    pub feed_seed: Option<u64>,
    pub llm: LlmConfig,
    pub mastodon: MastodonConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            custom_prompt: DEFAULT_PROMPT.to_string(),
            posts_per_day: DEFAULT_POSTS_PER_DAY,
            base_hour: 9,
            poll_interval_secs: 60,
            dry_run: true,
            sources: DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
            keywords_path: "keywords.txt".to_string(),
            images_dir: "images".to_string(),
            request_timeout_secs: 30,
            feed_seed: None,
            llm: LlmConfig::default(),
            mastodon: MastodonConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,           // "Gemini" | "OpenAI" | "Groq" | ...
    pub model: Option<String>,      // provider default when empty
    pub base_url: Option<String>,
    pub proxy: Option<String>,
    pub api_key: Option<String>,    // <PROVIDER>_API_KEY env var wins
    pub request_timeout_secs: Option<u64>,
    pub log_prompt_preview_chars: Option<usize>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "Gemini".to_string(),
            model: Some("gemini-2.5-flash".to_string()),
            base_url: None,
            proxy: None,
            api_key: None,
            request_timeout_secs: None,
            log_prompt_preview_chars: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MastodonConfig {
    pub base_url: String,             // https://mastodon.social
    pub access_token: Option<String>, // MASTODON_ACCESS_TOKEN env var wins
    pub login_cli: bool,              // interactive login when no token is found
    pub secrets_path: String,
    pub visibility: Option<String>,   // public | unlisted | private | direct
    pub language: Option<String>,     // e.g. en, de
    pub max_chars: Option<usize>,
}

impl Default for MastodonConfig {
    fn default() -> Self {
        Self {
            base_url: "https://mastodon.social".to_string(),
            access_token: None,
            login_cli: false,
            secrets_path: "./secrets/mastodon.yaml".to_string(),
            visibility: Some("public".to_string()),
            language: Some("en".to_string()),
            max_chars: Some(500),
        }
    }
}

impl AppConfig {
    /// Posts per day actually scheduled: non-positive values fall back to 3,
    /// values above 24 are clamped since hourly slots would collide.
    pub fn effective_posts_per_day(&self) -> u32 {
        if self.posts_per_day <= 0 {
            warn!(posts_per_day = self.posts_per_day, "invalid posts_per_day, defaulting to {}", DEFAULT_POSTS_PER_DAY);
            return DEFAULT_POSTS_PER_DAY as u32;
        }
        if self.posts_per_day > MAX_POSTS_PER_DAY as i64 {
            warn!(posts_per_day = self.posts_per_day, "posts_per_day too large, clamping to {}", MAX_POSTS_PER_DAY);
            return MAX_POSTS_PER_DAY;
        }
        self.posts_per_day as u32
    }
}

/// Strict loader: any I/O or parse error is returned.
pub fn read_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, Box<dyn std::error::Error + Send + Sync>> {
    let content = fs::read_to_string(path)?;
    let cfg: AppConfig = serde_yaml::from_str(&content)?;
    Ok(cfg)
}

/// Loads the config, absorbing every failure into [`AppConfig::default`].
///
/// JSON documents are valid YAML, so a `config.json` in the old layout loads too.
pub fn load_config<P: AsRef<Path>>(path: P) -> AppConfig {
    let path = path.as_ref();
    match read_config(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_tmp(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn missing_file_gives_defaults() {
        let cfg = load_config("/definitely/not/here/config.yaml");
        assert_eq!(cfg.custom_prompt, DEFAULT_PROMPT);
        assert_eq!(cfg.effective_posts_per_day(), 3);
        assert_eq!(cfg.sources.len(), 3);
        assert!(cfg.dry_run);
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let f = write_tmp("custom_prompt: [unclosed\nposts_per_day: {");
        let cfg = load_config(f.path());
        assert_eq!(cfg.custom_prompt, DEFAULT_PROMPT);
        assert_eq!(cfg.posts_per_day, 3);
    }

    #[test]
    fn reads_legacy_json_layout() {
        let f = write_tmp(r#"{"custom_prompt": "Be brief.", "posts_per_day": 4}"#);
        let cfg = load_config(f.path());
        assert_eq!(cfg.custom_prompt, "Be brief.");
        assert_eq!(cfg.effective_posts_per_day(), 4);
        // untouched keys keep their defaults
        assert_eq!(cfg.base_hour, 9);
        assert_eq!(cfg.images_dir, "images");
    }

    #[test]
    fn reads_yaml_with_nested_sections() {
        let f = write_tmp(
            "posts_per_day: 2\ndry_run: false\nsources:\n  - http://localhost/feed.xml\nllm:\n  provider: OpenAI\nmastodon:\n  base_url: https://example.social\n  max_chars: 300\n",
        );
        let cfg = load_config(f.path());
        assert!(!cfg.dry_run);
        assert_eq!(cfg.sources, vec!["http://localhost/feed.xml".to_string()]);
        assert_eq!(cfg.llm.provider, "OpenAI");
        assert_eq!(cfg.mastodon.base_url, "https://example.social");
        assert_eq!(cfg.mastodon.max_chars, Some(300));
        assert_eq!(cfg.mastodon.visibility.as_deref(), Some("public"));
    }

    #[test]
    fn non_positive_posts_per_day_falls_back_to_three() {
        for v in [0, -1, -24] {
            let cfg = AppConfig { posts_per_day: v, ..AppConfig::default() };
            assert_eq!(cfg.effective_posts_per_day(), 3);
        }
    }

    #[test]
    fn posts_per_day_is_clamped_to_hourly() {
        let cfg = AppConfig { posts_per_day: 100, ..AppConfig::default() };
        assert_eq!(cfg.effective_posts_per_day(), 24);
    }
}
