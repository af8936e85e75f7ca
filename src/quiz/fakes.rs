use std::sync::Mutex;

use async_trait::async_trait;

use crate::quiz::{QuizError, TranscriptFragment, TranscriptSource, Tutor};
use crate::transcript::TranscriptError;

fn backend_error() -> QuizError {
    chatgpt::err::Error::BackendError {
        message: "rate limited".to_string(),
        error_type: "requests".to_string(),
    }
    .into()
}

#[derive(Default)]
pub struct FakeTutor {
    pub verdict: String,
    pub fail_questions: bool,
    pub fail_evaluations: bool,
    pub questions: Mutex<Vec<String>>,
    pub evaluations: Mutex<Vec<(String, String, String)>>,
}

impl FakeTutor {
    pub fn with_verdict(verdict: &str) -> Self {
        Self {
            verdict: verdict.to_string(),
            ..Self::default()
        }
    }

    pub fn question_requests(&self) -> usize {
        self.questions.lock().unwrap().len()
    }

    pub fn evaluation_requests(&self) -> usize {
        self.evaluations.lock().unwrap().len()
    }
}

#[async_trait]
impl Tutor for FakeTutor {
    async fn generate_question(&self, context: &str) -> Result<String, QuizError> {
        if self.fail_questions {
            return Err(backend_error());
        }
        let mut questions = self.questions.lock().unwrap();
        questions.push(context.to_string());
        Ok(format!("  Question {} about {}?\n", questions.len(), context))
    }

    async fn evaluate_answer(
        &self,
        context: &str,
        question: &str,
        answer: &str,
    ) -> Result<String, QuizError> {
        if self.fail_evaluations {
            return Err(backend_error());
        }
        self.evaluations.lock().unwrap().push((
            context.to_string(),
            question.to_string(),
            answer.to_string(),
        ));
        Ok(self.verdict.clone())
    }
}

pub struct FakeTranscripts {
    fragments: Option<Vec<TranscriptFragment>>,
    pub requested: Mutex<Vec<String>>,
}

impl FakeTranscripts {
    pub fn new(texts: &[&str]) -> Self {
        Self {
            fragments: Some(
                texts
                    .iter()
                    .map(|text| TranscriptFragment::new(*text, 0.0, 1.0))
                    .collect(),
            ),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            fragments: None,
            requested: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TranscriptSource for FakeTranscripts {
    async fn fetch_transcript(
        &self,
        video_id: &str,
    ) -> Result<Vec<TranscriptFragment>, TranscriptError> {
        self.requested.lock().unwrap().push(video_id.to_string());
        self.fragments
            .clone()
            .ok_or_else(|| TranscriptError::CaptionsUnavailable {
                video_id: video_id.to_string(),
            })
    }
}
