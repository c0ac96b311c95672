use async_trait::async_trait;
use std::error::Error;
use std::path::Path;

/// Capability to publish a status on the social account.
#[async_trait]
pub trait Poster: Send + Sync {
    fn name(&self) -> &str;
    async fn post(&self, text: &str, image: Option<&Path>) -> Result<(), Box<dyn Error + Send + Sync>>;
}
