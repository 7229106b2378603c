//! Language model access.
//!
//! Everything above this module talks to the model through [`LlmBackend`]:
//! a list of chat messages in, raw text out. Retry is not applied here;
//! callers wrap calls in the policy that fits their statefulness.

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ComicError;
use crate::persona::Language;
use crate::prompts;
use crate::resilience::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    /// Speaker name attached to user messages in multi-party chats.
    pub name: Option<String>,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            name: None,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            name: None,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            name: None,
            content: content.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    /// A single user prompt.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::new(vec![ChatMessage::user(text)])
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// "Generate a completion."
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ComicError>;

    /// Model identifier, for logs and the config endpoint.
    fn model(&self) -> &str;
}

/// Any OpenAI-compatible chat completion endpoint.
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiBackend {
    pub fn new(
        api_base: Option<&str>,
        api_key: &str,
        model: impl Into<String>,
    ) -> Result<Self, ComicError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ComicError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = api_base {
            config = config.with_api_base(base);
        }

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client),
            model: model.into(),
        })
    }
}

fn to_openai_message(message: &ChatMessage) -> ChatCompletionRequestMessage {
    match message.role {
        ChatRole::System => ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
            content: message.content.clone().into(),
            name: None,
        }),
        ChatRole::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: message.content.clone().into(),
            name: message.name.clone(),
        }),
        ChatRole::Assistant => {
            ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content: Some(message.content.clone().into()),
                name: None,
                tool_calls: None,
                refusal: None,
                audio: None,
                function_call: None,
            })
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ComicError> {
        let messages: Vec<ChatCompletionRequestMessage> =
            request.messages.iter().map(to_openai_message).collect();

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(messages);
        if let Some(temperature) = request.temperature {
            args.temperature(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            args.max_completion_tokens(max_tokens);
        }
        let chat_request = args.build()?;

        debug!(model = %self.model, messages = request.messages.len(), "Requesting completion");
        let response = self.client.chat().create(chat_request).await?;

        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Ask the model for well-known anecdotes about `topic`, one sentence per
/// line. Any failure yields an empty context.
pub async fn generate_topic_context(
    llm: &dyn LlmBackend,
    policy: &RetryPolicy,
    topic: &str,
    lang: Language,
    temperature: f32,
    max_tokens: u32,
) -> String {
    let topic = topic.trim();
    if topic.is_empty() {
        return String::new();
    }

    let request = CompletionRequest::prompt(prompts::topic_context_prompt(topic, lang))
        .temperature(temperature)
        .max_tokens(max_tokens);

    match policy
        .run("topic_context", || llm.complete(request.clone()))
        .await
    {
        Ok(text) if !text.trim().is_empty() => format!("\n{}\n", split_sentences(text.trim())),
        Ok(_) => String::new(),
        Err(e) => {
            warn!(topic, error = %e, "Error generating topic context");
            String::new()
        }
    }
}

/// Break after every ". " unless the period ends a number ("1. ").
fn split_sentences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '.' && chars.peek() == Some(&' ') && !prev.is_some_and(|p| p.is_ascii_digit()) {
            out.push_str(".\n");
            chars.next();
        } else {
            out.push(c);
        }
        prev = Some(c);
    }

    out
}
