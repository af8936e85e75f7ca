use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info, warn};

use crate::quiz::chunker::chunk_transcript;
use crate::quiz::{Chunk, QuizError, QuizResult, Tutor, TranscriptSource};
use crate::transcript::extract_video_id;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Phase {
    AwaitingLink,
    AwaitingChunks,
    PresentingQuestion(usize),
    AwaitingAnswer { index: usize, question: String },
    Scoring(usize),
    Finished,
    /// An external request failed; the session has to be started over.
    Aborted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::AwaitingLink => write!(f, "awaiting a link"),
            Phase::AwaitingChunks => write!(f, "awaiting chunks"),
            Phase::PresentingQuestion(i) => write!(f, "presenting question {}", i),
            Phase::AwaitingAnswer { index, .. } => write!(f, "awaiting answer {}", index),
            Phase::Scoring(i) => write!(f, "scoring answer {}", i),
            Phase::Finished => write!(f, "finished"),
            Phase::Aborted => write!(f, "aborted"),
        }
    }
}

/// Outcome of asking the session for its next question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Question { index: usize, text: String },
    Finished,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct QuizState {
    pub cursor: usize,
    pub chunks: Vec<Chunk>,
    pub results: BTreeMap<usize, QuizResult>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuizSummary {
    pub answered: usize,
    pub correct: usize,
}

/// One user's walk through the chunks of one video.
///
/// Every transition goes through `&mut self`, so a session is only ever driven
/// by the chat that owns it. The cursor only moves forward, by one, after an
/// answer has been scored.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QuizSession {
    link: Option<String>,
    state: QuizState,
    phase: Phase,
}

impl Default for QuizSession {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizSession {
    pub fn new() -> Self {
        Self {
            link: None,
            state: QuizState::default(),
            phase: Phase::AwaitingLink,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    #[cfg(test)]
    pub fn cursor(&self) -> usize {
        self.state.cursor
    }

    #[cfg(test)]
    pub fn chunks(&self) -> &[Chunk] {
        &self.state.chunks
    }

    #[cfg(test)]
    pub fn results(&self) -> &BTreeMap<usize, QuizResult> {
        &self.state.results
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    pub fn summary(&self) -> QuizSummary {
        QuizSummary {
            answered: self.state.results.len(),
            correct: self
                .state
                .results
                .values()
                .filter(|r| r.is_correct())
                .count(),
        }
    }

    pub fn submit_link(&mut self, link: &str) -> Result<(), QuizError> {
        self.expect_phase(Phase::AwaitingLink, "awaiting a link")?;

        let link = link.trim();
        if link.is_empty() {
            return Err(QuizError::EmptyLink);
        }

        info!("Quiz link received: {}", link);
        self.link = Some(link.to_string());
        self.phase = Phase::AwaitingChunks;
        Ok(())
    }

    /// Fetches and chunks the transcript. Returns the number of chunks.
    pub async fn load_chunks(
        &mut self,
        transcripts: &dyn TranscriptSource,
        max_len: usize,
    ) -> Result<usize, QuizError> {
        self.expect_phase(Phase::AwaitingChunks, "awaiting chunks")?;
        let link = self.link.clone().ok_or(QuizError::EmptyLink)?;

        let video_id = extract_video_id(&link);
        let fragments = match transcripts.fetch_transcript(video_id).await {
            Ok(fragments) => fragments,
            Err(err) => return self.abort(err.into()),
        };

        self.state.chunks = chunk_transcript(&fragments, max_len);
        self.state.cursor = 0;
        self.phase = Phase::PresentingQuestion(0);
        info!(
            "Video {} split into {} chunks",
            video_id,
            self.state.chunks.len()
        );

        Ok(self.state.chunks.len())
    }

    /// Generates the question for the cursor, unless one is already pending.
    pub async fn present_question(&mut self, tutor: &dyn Tutor) -> Result<Step, QuizError> {
        let index = match &self.phase {
            Phase::AwaitingAnswer { index, question } => {
                return Ok(Step::Question {
                    index: *index,
                    text: question.clone(),
                });
            }
            Phase::Finished => return Ok(Step::Finished),
            Phase::PresentingQuestion(index) => *index,
            other => {
                return Err(QuizError::UnexpectedPhase {
                    expected: "presenting a question",
                    found: other.to_string(),
                })
            }
        };

        let Some(chunk) = self.state.chunks.get(index) else {
            info!("Quiz finished after {} questions", index);
            self.phase = Phase::Finished;
            return Ok(Step::Finished);
        };
        let context = chunk.text.clone();

        let question = match tutor.generate_question(&context).await {
            Ok(question) => question.trim().to_string(),
            Err(err) => return self.abort(err),
        };
        debug!(
            "Current index = {}\nContext = {}\nQuestion = {}",
            index, context, question
        );

        self.phase = Phase::AwaitingAnswer {
            index,
            question: question.clone(),
        };
        Ok(Step::Question {
            index,
            text: question,
        })
    }

    /// Scores the answer to the pending question and moves the cursor on,
    /// whatever the verdict says.
    pub async fn submit_answer(
        &mut self,
        index: usize,
        answer: &str,
        tutor: &dyn Tutor,
    ) -> Result<QuizResult, QuizError> {
        let question = match &self.phase {
            Phase::AwaitingAnswer {
                index: pending,
                question,
            } => {
                if *pending != index {
                    warn!("Ignoring answer for question {}, {} is pending", index, pending);
                    return Err(QuizError::StaleAnswer {
                        expected: *pending,
                        got: index,
                    });
                }
                question.clone()
            }
            other => {
                return Err(QuizError::UnexpectedPhase {
                    expected: "awaiting an answer",
                    found: other.to_string(),
                })
            }
        };

        self.phase = Phase::Scoring(index);
        let context = self.state.chunks[index].text.clone();

        let verdict = match tutor.evaluate_answer(&context, &question, answer).await {
            Ok(verdict) => verdict.trim().to_string(),
            Err(err) => return self.abort(err),
        };

        let result = QuizResult {
            question,
            answer: answer.to_string(),
            verdict,
        };
        debug!("Result for question {}: {:?}", index, result);

        self.state.results.insert(index, result.clone());
        self.state.cursor = index + 1;
        self.phase = Phase::PresentingQuestion(self.state.cursor);

        Ok(result)
    }

    /// Scores the pending answer, then presents the next question.
    pub async fn answer_and_continue(
        &mut self,
        answer: &str,
        tutor: &dyn Tutor,
    ) -> Result<(QuizResult, Step), QuizError> {
        let index = match &self.phase {
            Phase::AwaitingAnswer { index, .. } => *index,
            other => {
                return Err(QuizError::UnexpectedPhase {
                    expected: "awaiting an answer",
                    found: other.to_string(),
                })
            }
        };

        let result = self.submit_answer(index, answer, tutor).await?;
        let step = self.present_question(tutor).await?;
        Ok((result, step))
    }

    fn expect_phase(&self, expected: Phase, name: &'static str) -> Result<(), QuizError> {
        if self.phase != expected {
            return Err(QuizError::UnexpectedPhase {
                expected: name,
                found: self.phase.to_string(),
            });
        }
        Ok(())
    }

    fn abort<T>(&mut self, err: QuizError) -> Result<T, QuizError> {
        warn!("Quiz step failed while {}: {}", self.phase, err);
        self.phase = Phase::Aborted;
        Err(err)
    }
}
