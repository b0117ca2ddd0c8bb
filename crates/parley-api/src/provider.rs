//! [`AnswerGenerator`] backed by a chat-completions endpoint.

use crate::client::ApiClient;
use crate::prompt::{DEFAULT_SYSTEM_PROMPT, build_system_message};
use crate::retry::RetryConfig;
use parley_types::{
    AnswerFuture, AnswerGenerator, AnswerRequest, ApiError, CompletionRequest, WireMessage,
};

/// Answers queries with a single non-streaming completion.
///
/// Wraps [`ApiClient`]; retry logic stays in the client.
#[derive(Clone)]
pub struct CompletionsAnswerer {
    client: ApiClient,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
    system_prompt: String,
}

impl CompletionsAnswerer {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            client: ApiClient::new(api_key, base_url)?,
            model: model.into(),
            max_tokens: 500,
            temperature: Some(0.4),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        })
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.client = self.client.with_retry_config(config);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The wire request for one answer.
    pub fn build_request(&self, request: &AnswerRequest) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                WireMessage::system(build_system_message(
                    &self.system_prompt,
                    &request.chat_history,
                )),
                WireMessage::user(&request.query),
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
        }
    }
}

impl AnswerGenerator for CompletionsAnswerer {
    fn answer<'a>(&'a self, request: &'a AnswerRequest) -> AnswerFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .create_completion(&self.build_request(request))
                .await?;
            if let Some(usage) = &response.usage {
                tracing::debug!(
                    model = %self.model,
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "Completion received"
                );
            }
            response
                .first_text()
                .map(|text| text.trim().to_string())
                .ok_or_else(|| ApiError::InvalidResponse("response contained no choices".into()))
        })
    }

    fn name(&self) -> &str {
        "chat-completions"
    }
}
