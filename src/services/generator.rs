use std::sync::Arc;

use bon::Builder;
use tera::{Context, Tera};
use tracing::{debug, info, warn};

use crate::models::types::{Article, PostText};
use crate::traits::text_generator::TextGenerator;

const TEMPLATE_NAME: &str = "custom_prompt";

/// Turns an article into status text through a [`TextGenerator`].
///
/// The configured template is rendered as a Tera template (`title`, `summary`
/// and `link` are in scope) and the article block is appended after it.
#[derive(Builder)]
pub struct ContentGenerator {
    generator: Arc<dyn TextGenerator>,
    #[builder(into)]
    template: String,
    preview_chars: Option<usize>,
}

impl ContentGenerator {
    pub fn build_prompt(&self, article: &Article) -> String {
        let mut ctx = Context::new();
        ctx.insert("title", &article.title);
        ctx.insert("summary", &article.summary);
        ctx.insert("link", &article.link);

        let mut tera = Tera::default();
        let head = match tera
            .add_raw_template(TEMPLATE_NAME, &self.template)
            .and_then(|_| tera.render(TEMPLATE_NAME, &ctx))
        {
            Ok(s) => s,
            Err(e) => {
                warn!("prompt template render failed, using it verbatim: {}", e);
                self.template.clone()
            }
        };

        let prompt = format!(
            "{}\n\nTitle: {}\nSummary: {}\n",
            head.trim(),
            article.title,
            article.summary
        );
        let preview: String = prompt.chars().take(self.preview_chars.unwrap_or(200)).collect();
        debug!(prompt_len = prompt.len(), prompt_preview = %preview, "generate: prompt built");
        prompt
    }

    /// `Ok(None)` when the service answers with nothing but whitespace.
    pub async fn generate_text(&self, article: &Article) -> Result<Option<PostText>, Box<dyn std::error::Error + Send + Sync>> {
        info!(title_len = article.title.len(), summary_len = article.summary.len(), "generate: start");
        let prompt = self.build_prompt(article);
        let text = self.generator.generate(&prompt).await?;
        let post = PostText::non_empty(&text);
        info!(generated_len = post.as_ref().map_or(0, |p| p.as_str().len()), "generate: done");
        Ok(post)
    }
}
