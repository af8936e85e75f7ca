pub mod ai_helper;
pub mod chunker;
pub mod stepper;

#[cfg(test)]
pub(crate) mod fakes;

use async_trait::async_trait;
use thiserror::Error;

use crate::transcript::TranscriptError;

/// One timed caption entry as returned by the transcript service.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TranscriptFragment {
    pub text: String,
    pub start_offset: f64,
    pub duration: f64,
}

impl TranscriptFragment {
    pub fn new(text: impl Into<String>, start_offset: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start_offset,
            duration,
        }
    }
}

/// A merged block of fragment text, used as the context of one question.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Chunk {
    pub text: String,
}

impl Chunk {
    pub fn new(text: String) -> Self {
        Self { text }
    }
}

/// What was asked, what the user said and what the evaluator thought of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QuizResult {
    pub question: String,
    pub answer: String,
    pub verdict: String,
}

impl QuizResult {
    /// Verdicts are free text; anything starting with "correct" counts.
    pub fn is_correct(&self) -> bool {
        self.verdict
            .trim_start()
            .to_lowercase()
            .starts_with("correct")
    }
}

/// Model-backed question generation and answer evaluation.
#[async_trait]
pub trait Tutor: Send + Sync {
    async fn generate_question(&self, context: &str) -> Result<String, QuizError>;

    async fn evaluate_answer(
        &self,
        context: &str,
        question: &str,
        answer: &str,
    ) -> Result<String, QuizError>;
}

/// Source of timed caption fragments for a video.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch_transcript(
        &self,
        video_id: &str,
    ) -> Result<Vec<TranscriptFragment>, TranscriptError>;
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error(transparent)]
    Transcript(#[from] TranscriptError),
    #[error("model request failed: {0}")]
    Model(#[from] chatgpt::err::Error),
    #[error("video link is empty")]
    EmptyLink,
    #[error("quiz is {found}, expected {expected}")]
    UnexpectedPhase {
        expected: &'static str,
        found: String,
    },
    #[error("answer for question {got} arrived while question {expected} is pending")]
    StaleAnswer { expected: usize, got: usize },
}
