use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolChoiceOption,
        ChatCompletionToolType, CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        FunctionObjectArgs,
    },
};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::error::{AssistantError, Result};
use crate::models::{ChatRequest, ChatResponse, Choice, Role, ToolCall, ToolChoice};

/// Lazy, finite sequence of text increments from a streaming completion
pub type TextStream = BoxStream<'static, Result<String>>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// One-shot completion, used for structured tool calls
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse>;

    /// Streaming completion yielding text increments as they arrive
    async fn chat_stream(&self, req: &ChatRequest) -> Result<TextStream>;
}

pub struct OpenAiTransport {
    client: Client<OpenAIConfig>,
}

impl OpenAiTransport {
    pub fn new(api_key: &str, base_url: Option<&str>) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key.to_string());
        if let Some(base) = base_url {
            config = config.with_api_base(base.to_string());
        }
        Self {
            client: Client::with_config(config),
        }
    }
}

fn provider_error(e: OpenAIError) -> AssistantError {
    AssistantError::Internal(format!("OpenAI request could not be built: {e}"))
}

/// Translate the provider-independent request into the SDK request
fn to_openai_request(req: &ChatRequest, stream: bool) -> Result<CreateChatCompletionRequest> {
    let messages = req
        .messages
        .iter()
        .map(|m| -> std::result::Result<ChatCompletionRequestMessage, OpenAIError> {
            Ok(match m.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(m.content.clone())
                    .build()?
                    .into(),
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(m.content.clone())
                    .build()?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(m.content.clone())
                    .build()?
                    .into(),
            })
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(provider_error)?;

    let mut args = CreateChatCompletionRequestArgs::default();
    args.model(req.model.clone()).messages(messages);
    if let Some(temperature) = req.temperature {
        args.temperature(temperature);
    }
    if stream {
        args.stream(true);
    }

    if !req.tools.is_empty() {
        let tools = req
            .tools
            .iter()
            .map(|t| -> std::result::Result<ChatCompletionTool, OpenAIError> {
                ChatCompletionToolArgs::default()
                    .r#type(ChatCompletionToolType::Function)
                    .function(
                        FunctionObjectArgs::default()
                            .name(t.name.clone())
                            .description(t.description.clone())
                            .parameters(t.parameters.clone())
                            .build()?,
                    )
                    .build()
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(provider_error)?;
        args.tools(tools);
    }

    match req.tool_choice {
        Some(ToolChoice::Required) => {
            args.tool_choice(ChatCompletionToolChoiceOption::Required);
        }
        Some(ToolChoice::None) => {
            args.tool_choice(ChatCompletionToolChoiceOption::None);
        }
        None => {}
    }

    args.build().map_err(provider_error)
}

#[async_trait]
impl Transport for OpenAiTransport {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let request = to_openai_request(req, false)?;
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AssistantError::Internal(format!("OpenAI API error: {e}")))?;

        let choices = response
            .choices
            .into_iter()
            .map(|choice| Choice {
                content: choice.message.content,
                tool_calls: choice
                    .message
                    .tool_calls
                    .unwrap_or_default()
                    .into_iter()
                    .map(|call| ToolCall {
                        name: call.function.name,
                        arguments: call.function.arguments,
                    })
                    .collect(),
            })
            .collect();
        Ok(ChatResponse { choices })
    }

    async fn chat_stream(&self, req: &ChatRequest) -> Result<TextStream> {
        let request = to_openai_request(req, true)?;
        let stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| AssistantError::Synthesis(format!("Failed to open stream: {e}")))?;

        let text = stream.filter_map(|item| async move {
            match item {
                Ok(chunk) => {
                    let delta: String = chunk
                        .choices
                        .into_iter()
                        .filter_map(|c| c.delta.content)
                        .collect();
                    // Role-only and finish chunks carry no text
                    (!delta.is_empty()).then_some(Ok(delta))
                }
                Err(e) => Some(Err(AssistantError::Synthesis(format!("Stream error: {e}")))),
            }
        });
        Ok(text.boxed())
    }
}
