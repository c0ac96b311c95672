use async_trait::async_trait;

/// Defines the interface for a generative-text backend (Gemini, OpenAI, Groq, ...).
///
/// Consumers depend on this trait instead of a concrete client so that tests can
/// substitute a fake which never touches the network.
///
/// Any implementation must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Sends a single composed prompt and returns the raw generated text.
    async fn generate(&self, prompt: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}
