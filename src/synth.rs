use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use crate::error::{AssistantError, Result};
use crate::models::{ChatMessage, ChatRequest, NormalizedSummary};
use crate::transport::{TextStream, Transport};

const PERSONA: &str = "Tu es un robot avocat très sérieux. Tu utilises un ton précis et clair.";

const CLUSTER_DIRECTIVE: &str = "Regroupe ces textes en trois catégories majeures et explique ton choix par une phrase à la fin de chaque groupe. Ne renvoie que ton analyse.";

const ANSWER_DIRECTIVE: &str = "Réponds directement à la question en citant les extraits pertinents des documents. Ne renvoie que ta réponse.";

const NO_DOCUMENTS_DIRECTIVE: &str = "Aucun document n'a été trouvé pour cette question. Indique-le clairement à l'utilisateur et invite-le à reformuler sa question.";

/// What the model is asked to do with the retrieved documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisMode {
    /// Three thematic groups, one justification sentence each
    Cluster,
    /// Direct answer citing relevant excerpts
    Answer,
}

/// Single grounding prompt: persona, question, documents, directive
pub fn build_prompt(question: &str, summaries: &[NormalizedSummary], mode: SynthesisMode) -> String {
    let mut prompt = String::new();
    prompt.push_str(PERSONA);
    prompt.push_str("\nVoici la question de l'utilisateur :\n");
    prompt.push_str(question);
    prompt.push('\n');

    if summaries.is_empty() {
        prompt.push_str(NO_DOCUMENTS_DIRECTIVE);
        return prompt;
    }

    let documents = summaries
        .iter()
        .map(|s| s.summary.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    prompt.push_str("Voici une liste de documents :\n");
    prompt.push_str(&documents);
    prompt.push_str("\n. ");
    prompt.push_str(match mode {
        SynthesisMode::Cluster => CLUSTER_DIRECTIVE,
        SynthesisMode::Answer => ANSWER_DIRECTIVE,
    });
    prompt
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Streaming,
    Completed,
    Failed,
}

/// Streamed answer: yields each increment as it arrives and keeps the full text
///
/// Not restartable. Dropping it before completion abandons the answer.
pub struct AnswerStream {
    inner: TextStream,
    text: String,
    state: StreamState,
}

impl AnswerStream {
    pub fn new(inner: TextStream) -> Self {
        Self {
            inner,
            text: String::new(),
            state: StreamState::Streaming,
        }
    }

    /// Text delivered so far
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == StreamState::Completed
    }

    /// Drain the remaining increments and return the whole answer
    pub async fn collect_text(mut self) -> Result<String> {
        while let Some(chunk) = self.next().await {
            chunk?;
        }
        Ok(self.text)
    }
}

impl Stream for AnswerStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.state != StreamState::Streaming {
            return Poll::Ready(None);
        }
        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.text.push_str(&chunk);
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::error!("Answer stream failed after {} bytes: {}", this.text.len(), e);
                this.state = StreamState::Failed;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.state = StreamState::Completed;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Limit the wait between two increments
fn with_idle_timeout(inner: TextStream, idle: Duration) -> TextStream {
    stream::unfold(Some(inner), move |state| async move {
        let mut inner = state?;
        match tokio::time::timeout(idle, inner.next()).await {
            Ok(Some(item)) => Some((item, Some(inner))),
            Ok(None) => None,
            Err(_) => Some((
                Err(AssistantError::Synthesis(format!(
                    "no increment received for {}s",
                    idle.as_secs()
                ))),
                None,
            )),
        }
    })
    .boxed()
}

pub struct AnswerSynthesizer {
    tx: Arc<dyn Transport>,
    model: String,
    mode: SynthesisMode,
    temperature: Option<f32>,
    timeout: Duration,
}

impl AnswerSynthesizer {
    pub fn new(
        tx: Arc<dyn Transport>,
        model: String,
        mode: SynthesisMode,
        temperature: Option<f32>,
        timeout: Duration,
    ) -> Self {
        Self {
            tx,
            model,
            mode,
            temperature,
            timeout,
        }
    }

    pub fn mode(&self) -> SynthesisMode {
        self.mode
    }

    pub async fn stream(
        &self,
        question: &str,
        summaries: &[NormalizedSummary],
    ) -> Result<AnswerStream> {
        tracing::info!(
            "Synthesizing {:?} answer from {} documents",
            self.mode,
            summaries.len()
        );

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(build_prompt(question, summaries, self.mode))],
            temperature: self.temperature,
            tools: vec![],
            tool_choice: None,
        };

        let inner = tokio::time::timeout(self.timeout, self.tx.chat_stream(&request))
            .await
            .map_err(|_| {
                AssistantError::Synthesis(format!(
                    "stream did not open within {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| match e {
                AssistantError::Synthesis(_) => e,
                other => AssistantError::Synthesis(other.to_string()),
            })?;

        Ok(AnswerStream::new(with_idle_timeout(inner, self.timeout)))
    }
}
