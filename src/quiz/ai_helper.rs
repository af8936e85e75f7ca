use async_trait::async_trait;
use chatgpt::prelude::*;
use chatgpt::types::CompletionResponse;
use log::debug;

use crate::quiz::{QuizError, Tutor};

pub struct QuizHelper {
    chat_gpt: ChatGPT,
}

impl QuizHelper {
    pub fn new(chat_gpt: ChatGPT) -> Self {
        Self { chat_gpt }
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let response: CompletionResponse = self.chat_gpt.send_message(prompt).await?;
        let content = response.message().clone().content;

        debug!("Completion: {:?}", content);

        Ok(content.trim().to_string())
    }
}

fn question_prompt(context: &str) -> String {
    format!("You are a video tutor. Your job is to check how closely a student followed a video.
    Read this excerpt of the video's transcript: \"{}\".
    Ask exactly one highly specific question about it that can be answered with a single word; answers of several words are not acceptable.
    Pick the most significant question possible and reply with the question only.", context)
}

fn evaluation_prompt(context: &str, question: &str, answer: &str) -> String {
    format!("You are a video tutor. A student was given this excerpt of a video's transcript: \"{}\"
    and asked the question: \"{}\".
    The student answered: \"{}\".
    Decide whether the answer is valid within the excerpt. Your reply must start with either 'correct' or 'wrong'.", context, question, answer)
}

#[async_trait]
impl Tutor for QuizHelper {
    async fn generate_question(&self, context: &str) -> std::result::Result<String, QuizError> {
        debug!("Generating question for context of {} chars", context.chars().count());
        Ok(self.complete(&question_prompt(context)).await?)
    }

    async fn evaluate_answer(
        &self,
        context: &str,
        question: &str,
        answer: &str,
    ) -> std::result::Result<String, QuizError> {
        debug!("Evaluating answer {:?} to question {:?}", answer, question);
        Ok(self
            .complete(&evaluation_prompt(context, question, answer))
            .await?)
    }
}
