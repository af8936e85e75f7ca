use async_trait::async_trait;
use log::{debug, error, info};
use teloxide::{dispatching::dialogue::InMemStorage, prelude::*, types::ChatAction};

use crate::quiz::{
    stepper::{QuizSession, Step},
    QuizError, TranscriptSource, Tutor,
};

pub type QuizDialogue = Dialogue<State, InMemStorage<State>>;
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
pub type HandlerResult = Result<(), HandlerError>;

#[derive(Clone, Default)]
pub enum State {
    #[default]
    Start,
    ReceiveLink,
    Quiz {
        session: QuizSession,
    },
}

pub const LINK_PROMPT: &str = "Enter YouTube video link";

/// The side of a quiz conversation the bot talks to: outgoing messages and
/// the dialogue state stored for the chat.
#[async_trait]
pub trait ChatSurface: Send + Sync {
    fn id(&self) -> i64;

    async fn say(&self, text: String) -> HandlerResult;

    /// Best effort, failures are only logged.
    async fn typing(&self);

    async fn save(&self, state: State) -> HandlerResult;

    async fn reset(&self) -> HandlerResult;
}

pub struct TelegramChat {
    bot: Bot,
    dialogue: QuizDialogue,
}

impl TelegramChat {
    pub fn new(bot: Bot, dialogue: QuizDialogue) -> Self {
        Self { bot, dialogue }
    }
}

#[async_trait]
impl ChatSurface for TelegramChat {
    fn id(&self) -> i64 {
        self.dialogue.chat_id().0
    }

    async fn say(&self, text: String) -> HandlerResult {
        self.bot.send_message(self.dialogue.chat_id(), text).await?;
        Ok(())
    }

    async fn typing(&self) {
        if let Err(err) = self
            .bot
            .send_chat_action(self.dialogue.chat_id(), ChatAction::Typing)
            .await
        {
            debug!("Typing indicator for chat {} failed: {}", self.id(), err);
        }
    }

    async fn save(&self, state: State) -> HandlerResult {
        self.dialogue.update(state).await?;
        Ok(())
    }

    async fn reset(&self) -> HandlerResult {
        self.dialogue.exit().await?;
        Ok(())
    }
}

/// Starts a session for `link`: loads the transcript and asks the first question.
pub async fn begin_quiz(
    chat: &dyn ChatSurface,
    transcripts: &dyn TranscriptSource,
    tutor: &dyn Tutor,
    chunk_size: usize,
    link: &str,
) -> HandlerResult {
    let mut session = QuizSession::new();
    match session.submit_link(link) {
        Ok(()) => {}
        Err(QuizError::EmptyLink) => return chat.say(LINK_PROMPT.to_string()).await,
        Err(err) => return fail(chat, err).await,
    }

    chat.say(format!("Test on video: {}", link.trim())).await?;
    chat.typing().await;

    if let Err(err) = session.load_chunks(transcripts, chunk_size).await {
        return fail(chat, err).await;
    }

    let step = match session.present_question(tutor).await {
        Ok(step) => step,
        Err(err) => return fail(chat, err).await,
    };

    chat.save(state_after(&step, &session)).await?;
    announce(chat, &session, step).await
}

/// Scores the answer, then asks the next question or closes the quiz.
pub async fn answer_question(
    chat: &dyn ChatSurface,
    tutor: &dyn Tutor,
    mut session: QuizSession,
    answer: &str,
) -> HandlerResult {
    chat.typing().await;

    let (result, step) = match session.answer_and_continue(answer, tutor).await {
        Ok(outcome) => outcome,
        Err(err) => return fail(chat, err).await,
    };

    // Stored before anything is sent: a failed send must not replay the answer
    chat.save(state_after(&step, &session)).await?;

    chat.say(format!("Your answer: {}\n\n{}", result.answer, result.verdict))
        .await?;
    announce(chat, &session, step).await
}

fn state_after(step: &Step, session: &QuizSession) -> State {
    match step {
        Step::Question { .. } => State::Quiz {
            session: session.clone(),
        },
        Step::Finished => State::ReceiveLink,
    }
}

async fn announce(chat: &dyn ChatSurface, session: &QuizSession, step: Step) -> HandlerResult {
    match step {
        Step::Question { index, text } => {
            debug!("Chat {} gets question {}", chat.id(), index);
            chat.say(text).await
        }
        Step::Finished => {
            let summary = session.summary();
            info!(
                "Chat {} finished quiz on {:?}: {}/{} correct",
                chat.id(),
                session.link(),
                summary.correct,
                summary.answered
            );
            let quiz_score = format!(
                "The quiz is over! {} of your {} answers were correct.\nSend another link to take a new quiz.",
                summary.correct, summary.answered
            );
            chat.say(quiz_score).await
        }
    }
}

/// Drops the session and tells the user; they have to start over.
async fn fail(chat: &dyn ChatSurface, err: QuizError) -> HandlerResult {
    error!("Quiz session in chat {} failed: {}", chat.id(), err);

    chat.reset().await?;
    chat.say(format!(
        "Sorry, something went wrong: {}\nSend /start to begin again.",
        err
    ))
    .await
}
