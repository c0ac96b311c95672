use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::models::types::{PostText, PublishOutcome};
use crate::traits::poster::Poster;

/// Final step of a tick: post through the configured [`Poster`], or print a
/// preview in dry-run mode.
pub struct Publisher {
    poster: Option<Arc<dyn Poster>>,
}

impl Publisher {
    pub fn new(poster: Option<Arc<dyn Poster>>) -> Self {
        Self { poster }
    }

    pub async fn publish(
        &self,
        text: Option<&PostText>,
        image: Option<&Path>,
        dry_run: bool,
    ) -> Result<PublishOutcome, Box<dyn Error + Send + Sync>> {
        let Some(text) = text.filter(|t| !t.is_empty()) else {
            warn!("empty content, nothing posted");
            return Ok(PublishOutcome::Empty);
        };

        if dry_run {
            let preview = render_preview(text.as_str(), image);
            println!("{}", preview);
            info!(text_len = text.as_str().len(), with_image = image.is_some(), "dry run: preview printed");
            return Ok(PublishOutcome::Previewed(preview));
        }

        let poster = self.poster.as_ref().ok_or("no poster configured for live publishing")?;
        match poster.post(text.as_str(), image).await {
            Ok(()) => {
                info!(poster = poster.name(), with_image = image.is_some(), "post published");
                Ok(PublishOutcome::Posted { poster: poster.name().to_string(), with_image: image.is_some() })
            }
            Err(e) => {
                error!(poster = poster.name(), error = %e, "post failed");
                Err(e)
            }
        }
    }
}

fn render_preview(text: &str, image: Option<&Path>) -> String {
    let mut out = format!("\nTEST MODE - post preview:\n{}", text);
    if let Some(p) = image {
        out.push_str(&format!("\nImage saved locally: {}", p.display()));
    }
    out
}
