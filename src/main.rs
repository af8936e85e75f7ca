mod chat;
mod config;
mod quiz;
mod transcript;

use std::sync::Arc;

use chat::{
    ChatSurface, HandlerError, HandlerResult, QuizDialogue, State, TelegramChat, LINK_PROMPT,
};
use chatgpt::{client::ChatGPT, config::ChatGPTEngine};
use dotenv::dotenv;
use log::{info, warn};
use quiz::{ai_helper::QuizHelper, stepper::QuizSession, TranscriptSource, Tutor};
use teloxide::{
    dispatching::{dialogue::InMemStorage, HandlerExt, UpdateHandler},
    prelude::*,
    utils::command::BotCommands,
};
use transcript::YoutubeTranscripts;

use crate::config::Config;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
enum Command {
    #[command(description = "start a new quiz")]
    Start,
    #[command(description = "abandon the current quiz")]
    Cancel,
    #[command(description = "show this text")]
    Help,
}

#[tokio::main]
async fn main() -> Result<(), HandlerError> {
    let dotenv_result = dotenv();

    pretty_env_logger::init();
    if let Err(err) = dotenv_result {
        warn!("No .env file loaded: {}", err);
    }
    info!("Starting video tutor bot...");

    let config = Arc::new(Config::from_env()?);
    info!(
        "Chunk size {}, transcript language '{}'",
        config.chunk_size, config.transcript_language
    );

    let bot = Bot::from_env();
    bot.set_my_commands(Command::bot_commands()).await?;

    let gpt = {
        let mut gpt = ChatGPT::new(config.chatgpt_api_key.clone())?;

        gpt.config.engine = ChatGPTEngine::Gpt35Turbo;
        gpt.config.temperature = 0.0;
        gpt.config.timeout = config.chatgpt_timeout;

        gpt
    };

    let tutor: Arc<dyn Tutor> = Arc::new(QuizHelper::new(gpt));
    let transcripts: Arc<dyn TranscriptSource> =
        Arc::new(YoutubeTranscripts::new(config.transcript_language.clone()));

    Dispatcher::builder(bot, schema(config, transcripts, tutor))
        .dependencies(dptree::deps![InMemStorage::<State>::new()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn schema(
    config: Arc<Config>,
    transcripts: Arc<dyn TranscriptSource>,
    tutor: Arc<dyn Tutor>,
) -> UpdateHandler<HandlerError> {
    let tutor_for_answers = tutor.clone();

    Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<State>, State>()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::case![State::Start].endpoint(start))
        .branch(dptree::case![State::ReceiveLink].endpoint(
            move |bot: Bot, dialogue: QuizDialogue, msg: Message| {
                receive_link(
                    config.clone(),
                    transcripts.clone(),
                    tutor.clone(),
                    bot,
                    dialogue,
                    msg,
                )
            },
        ))
        .branch(dptree::case![State::Quiz { session }].endpoint(
            move |bot: Bot, dialogue: QuizDialogue, session: QuizSession, msg: Message| {
                receive_answer(tutor_for_answers.clone(), bot, dialogue, session, msg)
            },
        ))
}

async fn handle_command(
    bot: Bot,
    dialogue: QuizDialogue,
    cmd: Command,
    msg: Message,
) -> HandlerResult {
    match cmd {
        Command::Start => start(bot, dialogue, msg).await,
        Command::Cancel => {
            dialogue.exit().await?;
            bot.send_message(msg.chat.id, "Quiz cancelled. Send /start to begin again.")
                .await?;
            Ok(())
        }
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
            Ok(())
        }
    }
}

const GREETING_TEXT: &str = "Hi! I am your video tutor. Send me a YouTube link and I will quiz you on it, one question per part of the video. Every answer is a single word.";
async fn start(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT).await?;
    bot.send_message(msg.chat.id, LINK_PROMPT).await?;

    dialogue.update(State::ReceiveLink).await?;
    Ok(())
}

async fn receive_link(
    config: Arc<Config>,
    transcripts: Arc<dyn TranscriptSource>,
    tutor: Arc<dyn Tutor>,
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
) -> HandlerResult {
    let chat = TelegramChat::new(bot, dialogue);
    let Some(link) = msg.text() else {
        return chat
            .say("Please send the video link as text".to_string())
            .await;
    };

    chat::begin_quiz(
        &chat,
        transcripts.as_ref(),
        tutor.as_ref(),
        config.chunk_size,
        link,
    )
    .await
}

async fn receive_answer(
    tutor: Arc<dyn Tutor>,
    bot: Bot,
    dialogue: QuizDialogue,
    session: QuizSession,
    msg: Message,
) -> HandlerResult {
    let chat = TelegramChat::new(bot, dialogue);
    let Some(answer) = msg.text() else {
        return chat.say("Type your answer".to_string()).await;
    };

    chat::answer_question(&chat, tutor.as_ref(), session, answer).await
}
