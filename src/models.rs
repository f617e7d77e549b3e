use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Flexible string deserializer: Judilibre sends `number` as a string, older fixtures as an int
fn deserialize_flexible_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlexibleString {
        String(String),
        Int(i64),
        Float(f64),
    }

    let value = Option::<FlexibleString>::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        FlexibleString::String(s) => s,
        FlexibleString::Int(i) => i.to_string(),
        FlexibleString::Float(f) => f.to_string(),
    }))
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

// Chat message format shared by both model call shapes
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Declared callable tool offered to the model
#[derive(Debug, Serialize, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model must answer with a tool call, never free text
    Required,
    None,
}

// Model request, independent of the provider SDK
#[derive(Debug, Serialize, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    /// Raw JSON arguments as returned by the model
    pub arguments: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Choice {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
}

/// Arguments of the `get_user_query` tool; the model's structured answer
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, schemars::JsonSchema)]
pub struct ExtractedQuery {
    #[schemars(description = "Variable indiquant le ou les mots-clés à envoyer à l'API Judilibre.")]
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Highlights {
    #[serde(default)]
    pub text: Vec<String>,
}

/// One decision returned by the Judilibre search endpoint
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct SearchResultRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_string")]
    pub number: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub highlights: Option<Highlights>,
}

/// One element of `results`
///
/// A record whose fields have unexpected types is kept raw so that only that record is
/// skipped, not the whole page.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ResultEntry {
    Record(SearchResultRecord),
    Malformed(serde_json::Value),
}

impl ResultEntry {
    pub fn as_record(&self) -> Option<&SearchResultRecord> {
        match self {
            Self::Record(record) => Some(record),
            Self::Malformed(_) => None,
        }
    }
}

impl From<SearchResultRecord> for ResultEntry {
    fn from(record: SearchResultRecord) -> Self {
        Self::Record(record)
    }
}

/// One page of the Judilibre search response
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub results: Vec<ResultEntry>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub next_page: Option<String>,
}

impl SearchPage {
    pub fn has_next(&self) -> bool {
        self.next_page.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Parameters of one search call
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PageRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// Where a record's summary text came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummarySource {
    Direct(String),
    Highlighted(String),
}

impl SummarySource {
    pub fn text(&self) -> &str {
        match self {
            Self::Direct(t) | Self::Highlighted(t) => t,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct NormalizedSummary {
    /// Position within its page; not unique across pages
    pub result_id: usize,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub page: u32,
    pub page_size: Option<u32>,
    pub has_next: bool,
}

/// One entry of the session transcript
#[derive(Debug, Serialize, Clone)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
