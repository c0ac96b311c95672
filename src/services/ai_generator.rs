use crate::services::settings::LlmConfig;
use crate::traits::text_generator::TextGenerator;
use async_trait::async_trait;

use ai_lib::ConnectionOptions;
use ai_lib::prelude::*;
use std::str::FromStr;
use strum_macros::EnumString;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, EnumString)]
#[strum(ascii_case_insensitive)]
enum ProviderName {
    Gemini,
    OpenAI,
    Groq,
    Anthropic,
    Mistral,
    DeepSeek,
    Ollama,
    OpenRouter,
    XaiGrok,
    Cohere,
    Perplexity,
}

fn map_provider(p: ProviderName) -> Provider {
    match p {
        ProviderName::Gemini => Provider::Gemini,
        ProviderName::OpenAI => Provider::OpenAI,
        ProviderName::Groq => Provider::Groq,
        ProviderName::Anthropic => Provider::Anthropic,
        ProviderName::Mistral => Provider::Mistral,
        ProviderName::DeepSeek => Provider::DeepSeek,
        ProviderName::Ollama => Provider::Ollama,
        ProviderName::OpenRouter => Provider::OpenRouter,
        ProviderName::XaiGrok => Provider::XaiGrok,
        ProviderName::Cohere => Provider::Cohere,
        ProviderName::Perplexity => Provider::Perplexity,
    }
}

/// Generative-text backend over ai-lib. The client is built on first use so a
/// dry run without credentials can still start.
pub struct AiLibGenerator {
    config: LlmConfig,
    engine: Mutex<Option<AiClient>>,
}

impl AiLibGenerator {
    pub fn from_config(llm: &LlmConfig) -> Self {
        Self { config: llm.clone(), engine: Mutex::new(None) }
    }

    fn api_key(&self) -> Option<String> {
        std::env::var(format!("{}_API_KEY", self.config.provider.to_uppercase()))
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.config.api_key.clone())
    }

    async fn ensure_engine(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut guard = self.engine.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let prov = ProviderName::from_str(&self.config.provider)
            .map(map_provider)
            .unwrap_or(Provider::Gemini);

        info!(
            provider = %self.config.provider,
            base_url = %self.config.base_url.as_deref().unwrap_or("None"),
            proxy = %self.config.proxy.as_deref().unwrap_or("None"),
            timeout = %self.config.request_timeout_secs.map_or("None".to_string(), |t| t.to_string()),
            "ai_lib: client init"
        );

        let client = AiClient::with_options(
            prov,
            ConnectionOptions {
                base_url: self.config.base_url.clone(),
                proxy: self.config.proxy.clone(),
                api_key: self.api_key(),
                timeout: self.config.request_timeout_secs.map(std::time::Duration::from_secs),
                disable_proxy: false,
            },
        )?;
        *guard = Some(client);
        Ok(())
    }
}

#[async_trait]
impl TextGenerator for AiLibGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        self.ensure_engine().await?;
        let guard = self.engine.lock().await;
        let client = guard.as_ref().ok_or("ai_lib client not initialized")?;

        let model_name = match self.config.model.as_deref().map(str::trim) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => client.default_chat_model().to_string(),
        };
        let preview_len = self.config.log_prompt_preview_chars.unwrap_or(200);
        let prompt_preview: String = prompt.chars().take(preview_len).collect();
        info!(
            model = %model_name,
            prompt_len = prompt.len(),
            prompt_preview = %prompt_preview,
            "ai_lib: chat request"
        );

        let req = ChatCompletionRequest::new(
            model_name.clone(),
            vec![Message {
                role: Role::User,
                content: Content::new_text(prompt.to_string()),
                function_call: None,
            }],
        );
        let resp = client.chat_completion(req).await?;
        let text = resp
            .choices
            .first()
            .map(|c| c.message.content.as_text())
            .unwrap_or_default();
        let response_preview: String = text.chars().take(preview_len).collect();
        info!(
            model = %model_name,
            response_len = text.len(),
            response_preview = %response_preview,
            "ai_lib: chat response"
        );
        Ok(text)
    }
}
