use chrono::Utc;
use uuid::Uuid;

use crate::models::{Role, Turn};
use crate::synth::AnswerStream;

/// Per-session context: the conversation transcript
///
/// Created at session start and dropped at session end, never shared between sessions.
/// Holds no credentials; each turn acquires its own bearer token.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    transcript: Vec<Turn>,
}

impl Session {
    pub fn new() -> Self {
        let id = Uuid::new_v4();
        tracing::info!("Session {} started", id);
        Self {
            id,
            transcript: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn push_user(&mut self, content: &str) {
        self.push(Role::User, content.to_string());
    }

    /// Append the assistant turn if the stream ran to completion
    ///
    /// Failed or abandoned answers are not recorded. Returns whether a turn was appended.
    pub fn commit_answer(&mut self, answer: &AnswerStream) -> bool {
        if !answer.is_complete() {
            tracing::warn!(
                "Session {}: answer not completed ({:?}), nothing recorded",
                self.id,
                answer.state()
            );
            return false;
        }
        self.push(Role::Assistant, answer.text().to_string());
        true
    }

    fn push(&mut self, role: Role, content: String) {
        self.transcript.push(Turn {
            role,
            content,
            created_at: Utc::now(),
        });
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        tracing::debug!(
            "Session {} ended with {} turns",
            self.id,
            self.transcript.len()
        );
    }
}
