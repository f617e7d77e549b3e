use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AssistantError, Result};
use crate::models::{ChatMessage, ChatRequest, ChatResponse, ExtractedQuery, ToolChoice, ToolDefinition};
use crate::transport::Transport;

pub const QUERY_TOOL_NAME: &str = "get_user_query";

const USER_REQUEST_PLACEHOLDER: &str = ":USER_REQUEST:";

const EXTRACTION_PROMPT: &str = "Voici une question d'un utilisateur concernant la jurisprudence en France:
:USER_REQUEST:
Extrait le ou les mots clés nécessaire à la requête de l'API Judilibre. Soit le plus synthétique dans les mots clés et essaie de minimiser le nombre de mots.";

#[async_trait]
pub trait QueryExtractor: Send + Sync {
    async fn extract(&self, question: &str) -> Result<ExtractedQuery>;
}

/// Extracts search keywords through a forced `get_user_query` tool call
pub struct ToolCallExtractor {
    tx: Arc<dyn Transport>,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl ToolCallExtractor {
    pub fn new(tx: Arc<dyn Transport>, model: String, temperature: f32, timeout: Duration) -> Self {
        Self {
            tx,
            model,
            temperature,
            timeout,
        }
    }

    fn request(&self, question: &str) -> Result<ChatRequest> {
        Ok(ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(
                EXTRACTION_PROMPT.replace(USER_REQUEST_PLACEHOLDER, question),
            )],
            temperature: Some(self.temperature),
            tools: vec![query_tool()?],
            tool_choice: Some(ToolChoice::Required),
        })
    }
}

/// Tool schema derived from `ExtractedQuery`
pub fn query_tool() -> Result<ToolDefinition> {
    let schema = schemars::schema_for!(ExtractedQuery);
    let mut parameters = serde_json::to_value(&schema)?;
    // Function parameters are a bare object schema
    if let Some(obj) = parameters.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    Ok(ToolDefinition {
        name: QUERY_TOOL_NAME.to_string(),
        description: "Récupère le ou les mots-clés à envoyer à l'API Judilibre".to_string(),
        parameters,
    })
}

/// Pull the keyword query out of the model's tool call
fn parse_tool_response(response: &ChatResponse) -> Result<ExtractedQuery> {
    let choice = response.choices.first().ok_or_else(|| {
        AssistantError::Extraction("model returned no choices".to_string())
    })?;

    let call = choice
        .tool_calls
        .iter()
        .find(|c| c.name == QUERY_TOOL_NAME)
        .ok_or_else(|| {
            AssistantError::Extraction(format!(
                "model returned no {QUERY_TOOL_NAME} call ({} tool calls)",
                choice.tool_calls.len()
            ))
        })?;

    let extracted: ExtractedQuery = serde_json::from_str(&call.arguments).map_err(|e| {
        AssistantError::Extraction(format!(
            "invalid tool arguments: {e}. Raw: {}",
            call.arguments
        ))
    })?;

    if extracted.query.trim().is_empty() {
        return Err(AssistantError::Extraction(
            "model returned an empty query".to_string(),
        ));
    }
    Ok(extracted)
}

#[async_trait]
impl QueryExtractor for ToolCallExtractor {
    async fn extract(&self, question: &str) -> Result<ExtractedQuery> {
        tracing::info!("Extracting Judilibre keywords for question: {}", question);

        let request = self.request(question)?;
        let response = tokio::time::timeout(self.timeout, self.tx.chat(&request))
            .await
            .map_err(|_| {
                AssistantError::Extraction(format!(
                    "model call timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| AssistantError::Extraction(e.to_string()))?;

        let extracted = parse_tool_response(&response)?;
        tracing::info!("Extracted query: {}", extracted.query);
        Ok(extracted)
    }
}
