use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use bon::Builder;
use tracing::{error, info, warn};

use crate::models::types::TickOutcome;
use crate::models::Article;
use crate::services::feed::FeedClient;
use crate::services::generator::ContentGenerator;
use crate::services::images::ImageResolver;
use crate::services::publisher::Publisher;

/// One scheduler firing: pick an article, write about it, illustrate it, post it.
#[derive(Builder)]
pub struct Pipeline {
    feed: FeedClient,
    images: ImageResolver,
    generator: ContentGenerator,
    publisher: Publisher,
    #[builder(default = true)]
    dry_run: bool,
}

impl Pipeline {
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Feed lookup with exactly one extra attempt when nothing relevant was found.
    async fn fetch_article(&self) -> Option<Article> {
        let fetch = || async {
            self.feed
                .fetch_latest_article()
                .await
                .ok_or_else(|| anyhow::anyhow!("no relevant article"))
        };
        fetch
            .retry(ConstantBuilder::default().with_delay(Duration::ZERO).with_max_times(1))
            .sleep(tokio::time::sleep)
            .notify(|_: &anyhow::Error, _| warn!("no relevant news found, retrying with a new source order"))
            .await
            .ok()
    }

    /// Generation and publish problems are reported through the result; image
    /// problems never are.
    pub async fn run_tick(&self) -> Result<TickOutcome, Box<dyn std::error::Error + Send + Sync>> {
        info!(dry_run = self.dry_run, "tick: start");
        let Some(article) = self.fetch_article().await else {
            warn!("still no article found after retry");
            return Ok(TickOutcome::NoArticle);
        };

        let text = match self.generator.generate_text(&article).await {
            Ok(t) => t,
            Err(e) => {
                error!(title = %article.title, error = %e, "text generation failed");
                None
            }
        };
        let Some(text) = text else {
            self.publisher.publish(None, None, self.dry_run).await?;
            return Ok(TickOutcome::NoText);
        };

        let image = self.images.fetch_image(&article).await;
        let outcome = self.publisher.publish(Some(&text), image.as_deref(), self.dry_run).await?;
        info!(outcome = %outcome, title = %article.title, "tick: done");
        Ok(TickOutcome::Published { outcome, image })
    }
}
