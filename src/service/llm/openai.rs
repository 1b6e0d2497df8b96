//! OpenAI chat completions backend.

use std::{sync::Arc, time::Duration};

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat},
};
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::base::{
    config::{Config, LlmProvider, LlmSettings},
    types::Res,
};

use super::{GenericLlmClient, LlmClient, LlmRequest, with_timeout};

// Extra methods on `LlmClient` applied by the openai implementation.

impl LlmClient {
    pub fn openai(settings: &LlmSettings, config: &Config) -> Self {
        let client = OpenAiLlmClient::new(&settings.api_key, &settings.model, &config.openai_base_url, Duration::from_secs(config.llm_timeout_secs));
        Self { inner: Arc::new(client) }
    }
}

// Specific implementations.

/// OpenAI LLM client implementation.
#[derive(Clone)]
pub struct OpenAiLlmClient {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAiLlmClient {
    /// Create a new OpenAI LLM client.
    #[instrument(name = "OpenAiLlmClient::new", skip(api_key))]
    pub fn new(api_key: &str, model: &str, base_url: &str, timeout: Duration) -> Self {
        let cfg = OpenAIConfig::new().with_api_key(api_key).with_api_base(base_url.trim_end_matches('/'));

        Self {
            client: Client::with_config(cfg),
            model: model.to_string(),
            timeout,
        }
    }

    /// JSON mode is only requested from models known to honor it.
    fn supports_json_mode(&self) -> bool {
        self.model.contains("gpt-4")
    }

    async fn complete(&self, request: &LlmRequest) -> Res<String> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();

        if let Some(system) = &request.system {
            messages.push(ChatCompletionRequestSystemMessageArgs::default().content(system.as_str()).build()?.into());
        }

        messages.push(ChatCompletionRequestUserMessageArgs::default().content(request.prompt.as_str()).build()?.into());

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.as_str()).messages(messages);

        if let Some(temperature) = request.temperature {
            args.temperature(temperature);
        }

        if let Some(max_tokens) = request.max_output_tokens {
            args.max_completion_tokens(max_tokens);
        }

        if request.json && self.supports_json_mode() {
            args.response_format(ResponseFormat::JsonObject);
        }

        let response = self.client.chat().create(args.build()?).await?;

        if let Some(usage) = &response.usage {
            debug!("OpenAI usage: {} prompt / {} completion tokens", usage.prompt_tokens, usage.completion_tokens);
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| anyhow::anyhow!("OpenAI returned no content"))
    }
}

#[async_trait]
impl GenericLlmClient for OpenAiLlmClient {
    fn provider(&self) -> LlmProvider {
        LlmProvider::OpenAi
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(name = "OpenAiLlmClient::generate", skip_all, fields(model = %self.model))]
    async fn generate(&self, request: &LlmRequest) -> Res<String> {
        with_timeout(LlmProvider::OpenAi, self.timeout, self.complete(request)).await
    }
}

// Tests.
