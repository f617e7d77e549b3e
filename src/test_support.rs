use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{AssistantError, Result};
use crate::models::{ChatRequest, ChatResponse};
use crate::transport::{TextStream, Transport};

/// Transport fake replaying scripted responses and recording requests
pub struct ScriptedTransport {
    chat_responses: Mutex<VecDeque<ChatResponse>>,
    stream_chunks: Mutex<Option<(Vec<String>, bool)>>,
    chat_requests: Mutex<Vec<ChatRequest>>,
    stream_requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTransport {
    pub fn new(chat: Vec<ChatResponse>, stream: Option<(Vec<&str>, bool)>) -> Self {
        Self {
            chat_responses: Mutex::new(chat.into()),
            stream_chunks: Mutex::new(
                stream.map(|(chunks, fail)| (chunks.into_iter().map(str::to_string).collect(), fail)),
            ),
            chat_requests: Mutex::new(Vec::new()),
            stream_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_chat(chat: Vec<ChatResponse>) -> Self {
        Self::new(chat, None)
    }

    pub fn with_stream(chunks: Vec<&str>) -> Self {
        Self::new(vec![], Some((chunks, false)))
    }

    /// Yields `chunks`, then a stream error
    pub fn with_failing_stream(chunks: Vec<&str>) -> Self {
        Self::new(vec![], Some((chunks, true)))
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.chat_requests
            .lock()
            .expect("Mock transport mutex should not be poisoned")
            .clone()
    }

    pub fn stream_requests(&self) -> Vec<ChatRequest> {
        self.stream_requests
            .lock()
            .expect("Mock transport mutex should not be poisoned")
            .clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        self.chat_requests
            .lock()
            .expect("Mock transport mutex should not be poisoned")
            .push(req.clone());
        self.chat_responses
            .lock()
            .expect("Mock transport mutex should not be poisoned")
            .pop_front()
            .ok_or_else(|| AssistantError::Internal("No more mock responses".to_string()))
    }

    async fn chat_stream(&self, req: &ChatRequest) -> Result<TextStream> {
        self.stream_requests
            .lock()
            .expect("Mock transport mutex should not be poisoned")
            .push(req.clone());
        let (chunks, fail) = self
            .stream_chunks
            .lock()
            .expect("Mock transport mutex should not be poisoned")
            .take()
            .ok_or_else(|| AssistantError::Internal("No mock stream scripted".to_string()))?;

        let mut items: Vec<Result<String>> = chunks.into_iter().map(Ok).collect();
        if fail {
            items.push(Err(AssistantError::Synthesis(
                "connection reset".to_string(),
            )));
        }
        Ok(futures::stream::iter(items).boxed())
    }
}
