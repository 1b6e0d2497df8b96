//! Google Gemini `generateContent` backend.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use tracing::{debug, instrument};

use crate::base::{
    config::{Config, LlmProvider, LlmSettings},
    types::Res,
};

use super::{GenericLlmClient, LlmClient, LlmRequest, with_timeout};

// Extra methods on `LlmClient` applied by the gemini implementation.

impl LlmClient {
    pub fn gemini(settings: &LlmSettings, config: &Config) -> Res<Self> {
        let client = GeminiLlmClient::new(&settings.api_key, &settings.model, &config.gemini_base_url, Duration::from_secs(config.llm_timeout_secs))?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Wire types.

#[skip_serializing_none]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    system_instruction: Option<Content<'a>>,
    generation_config: Option<GenerationConfig>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
struct Content<'a> {
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl<'a> GenerateContentRequest<'a> {
    fn from_request(request: &'a LlmRequest) -> Self {
        let generation_config = GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_output_tokens,
            response_mime_type: request.json.then_some("application/json"),
        };

        let has_config = generation_config.temperature.is_some() || generation_config.max_output_tokens.is_some() || generation_config.response_mime_type.is_some();

        Self {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: &request.prompt }],
            }],
            system_instruction: request.system.as_deref().map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
            generation_config: has_config.then_some(generation_config),
        }
    }
}

impl GenerateContentResponse {
    fn into_text(self) -> Res<String> {
        let mut finish_reason = None;
        let mut text = String::new();

        if let Some(candidate) = self.candidates.into_iter().next() {
            finish_reason = candidate.finish_reason;

            for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
                if let Some(part_text) = part.text {
                    text.push_str(&part_text);
                }
            }
        }

        if !text.trim().is_empty() {
            return Ok(text.trim().to_string());
        }

        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(anyhow::anyhow!("Gemini blocked the prompt: {reason}"));
        }

        Err(anyhow::anyhow!("Gemini returned no content (finish reason: {})", finish_reason.as_deref().unwrap_or("unknown")))
    }
}

// Specific implementations.

/// Gemini LLM client implementation.
pub struct GeminiLlmClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiLlmClient {
    /// Create a new Gemini LLM client.
    #[instrument(name = "GeminiLlmClient::new", skip(api_key))]
    pub fn new(api_key: &str, model: &str, base_url: &str, timeout: Duration) -> Res<Self> {
        let http = reqwest::Client::builder().user_agent(concat!("helios/", env!("CARGO_PKG_VERSION"))).build()?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    async fn generate_content(&self, request: &LlmRequest) -> Res<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = GenerateContentRequest::from_request(request);

        let response = self.http.post(&url).header("x-goog-api-key", &self.api_key).json(&body).send().await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(anyhow::anyhow!("Gemini API request failed with {status}: {text}"));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)?;
        debug!("Gemini returned {} candidates", parsed.candidates.len());

        parsed.into_text()
    }
}

#[async_trait]
impl GenericLlmClient for GeminiLlmClient {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(name = "GeminiLlmClient::generate", skip_all, fields(model = %self.model))]
    async fn generate(&self, request: &LlmRequest) -> Res<String> {
        with_timeout(LlmProvider::Gemini, self.timeout, self.generate_content(request)).await
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, header, method, path},
    };

    use super::*;

    #[test]
    fn test_request_omits_unset_fields() {
        let request = LlmRequest {
            prompt: "Hello".to_string(),
            ..Default::default()
        };

        let value = serde_json::to_value(GenerateContentRequest::from_request(&request)).unwrap();

        assert_eq!(value, json!({ "contents": [{ "role": "user", "parts": [{ "text": "Hello" }] }] }));
    }

    #[test]
    fn test_blocked_prompt_is_an_error() {
        let response: GenerateContentResponse = serde_json::from_value(json!({ "promptFeedback": { "blockReason": "SAFETY" } })).unwrap();

        assert_eq!(response.into_text().unwrap_err().to_string(), "Gemini blocked the prompt: SAFETY");
    }

    #[tokio::test]
    async fn test_generate_posts_generate_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "g-key"))
            .and(body_json(json!({
                "contents": [{ "role": "user", "parts": [{ "text": "Summarize." }] }],
                "systemInstruction": { "parts": [{ "text": "Be brief." }] },
                "generationConfig": { "temperature": 0.5, "maxOutputTokens": 500 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "Project is " }, { "text": "on track.\n" }] },
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiLlmClient::new("g-key", "gemini-2.0-flash", &format!("{}/v1beta", server.uri()), Duration::from_secs(5)).unwrap();
        let request = LlmRequest {
            system: Some("Be brief.".to_string()),
            prompt: "Summarize.".to_string(),
            temperature: Some(0.5),
            max_output_tokens: Some(500),
            json: false,
        };

        assert_eq!(client.generate(&request).await.unwrap(), "Project is on track.");
    }

    #[tokio::test]
    async fn test_generate_surfaces_http_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let client = GeminiLlmClient::new("bad", "gemini-2.0-flash", &server.uri(), Duration::from_secs(5)).unwrap();
        let err = client
            .generate(&LlmRequest {
                prompt: "hi".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err()
            .to_string();

        assert!(err.contains("400"));
        assert!(err.contains("API key not valid"));
    }
}
