//! Terminal console for the command dispatcher.
//!
//! Reads lines from stdin and feeds them to a dispatcher session driving a
//! simulated vehicle. Plain text is dispatched as an utterance; lines starting
//! with `:` are console commands.

use anyhow::{Context, Result, bail};
use async_openai::config::OpenAIConfig;
use cardash_core::{
    ActionRegistry, CommandDispatcher, DispatchOutcome, DispatcherConfig, Provider, SessionError,
    SimulatedVehicle, audio,
    reasoning::OpenAICompatibleClient,
    session,
    speech::{self, SpeechToText, WhisperClient},
};
use clap::Parser;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "cardash")]
#[command(about = "Type or speak commands to a simulated vehicle")]
#[command(version)]
struct Args {
    /// Backend used for reasoning and transcription
    #[arg(long, env = "REASONING_PROVIDER", default_value = "openai")]
    provider: Provider,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    #[arg(long, env = "CHAT_MODEL", default_value = "gpt-3.5-turbo-1106")]
    chat_model: String,

    #[arg(long, env = "TRANSCRIPTION_MODEL", default_value = "whisper-1")]
    transcription_model: String,

    #[arg(long, env = "TRANSCRIPTION_LANGUAGE", default_value = "en")]
    transcription_language: String,

    /// Seconds to wait for the reasoning service
    #[arg(long, env = "REASONING_TIMEOUT_SECS", default_value_t = 30,
          value_parser = clap::value_parser!(u64).range(1..))]
    reasoning_timeout_secs: u64,

    /// Keep only this many recent exchanges in the conversation
    #[arg(long, env = "HISTORY_WINDOW", value_parser = clap::value_parser!(u64).range(1..))]
    history_window: Option<u64>,

    /// Directory containing system_prompt.md
    #[arg(long, env = "PROMPTS_PATH", default_value = "./prompts")]
    prompts_path: PathBuf,
}

impl Args {
    fn api_key(&self) -> Option<&str> {
        match self.provider {
            Provider::OpenAI => self.openai_api_key.as_deref(),
            Provider::Gemini => self.gemini_api_key.as_deref(),
        }
    }
}

/// One line of console input.
#[derive(Debug, PartialEq, Eq)]
enum ConsoleCommand {
    Say(String),
    Voice(PathBuf),
    State,
    Quit,
}

impl ConsoleCommand {
    /// Returns `None` for blank lines.
    fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(rest) = line.strip_prefix(':') else {
            return Ok(Some(ConsoleCommand::Say(line.to_string())));
        };
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match (name, arg) {
            ("voice", "") => bail!("usage: :voice <file.wav>"),
            ("voice", path) => Ok(Some(ConsoleCommand::Voice(PathBuf::from(path)))),
            ("state", _) => Ok(Some(ConsoleCommand::State)),
            ("quit" | "q" | "exit", _) => Ok(Some(ConsoleCommand::Quit)),
            (other, _) => bail!("unknown command ':{}' (try :voice, :state, :quit)", other),
        }
    }
}

/// Reads a recorded WAV file from disk.
fn load_wav(path: &Path) -> Result<Vec<u8>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if !audio::looks_like_wav(&bytes) {
        bail!("{} is not a WAV file", path.display());
    }
    Ok(bytes)
}

fn print_outcome(result: Result<Option<DispatchOutcome>, SessionError>) {
    match result {
        Ok(Some(outcome)) => {
            for action in &outcome.executed {
                println!("  [{:?}] {}", action.status, action.action);
            }
            match outcome.display_message {
                Some(message) => println!("> {}", message),
                None => println!("> (no response)"),
            }
        }
        Ok(None) => {}
        Err(e) => eprintln!("error: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let prompt_path = args.prompts_path.join("system_prompt.md");
    let system_prompt = std::fs::read_to_string(&prompt_path)
        .with_context(|| format!("Failed to read {}", prompt_path.display()))?;

    let api_key = args.api_key().with_context(|| {
        format!("No API key configured for provider {}", args.provider)
    })?;
    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(args.provider.api_base());

    let speech: Arc<dyn SpeechToText> = Arc::new(WhisperClient::new(
        openai_config.clone(),
        args.transcription_model.clone(),
        args.transcription_language.clone(),
    ));
    let dispatcher_config = DispatcherConfig {
        timeout: Duration::from_secs(args.reasoning_timeout_secs),
        history_window: args.history_window.map(|n| n as usize),
        ..DispatcherConfig::new(args.chat_model.clone(), system_prompt)
    };
    let dispatcher = CommandDispatcher::new(
        dispatcher_config,
        ActionRegistry::new(SimulatedVehicle::default()),
        Arc::new(OpenAICompatibleClient::new(openai_config)),
    );
    let (session, session_task) = session::spawn(dispatcher);
    info!(provider = ?args.provider, model = %args.chat_model, "Console session started");

    println!("Type a command for the car, or :voice <file.wav>, :state, :quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match ConsoleCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };
        match command {
            ConsoleCommand::Say(text) => print_outcome(session.submit(text).await),
            ConsoleCommand::Voice(path) => {
                let wav = match load_wav(&path) {
                    Ok(wav) => wav,
                    Err(e) => {
                        eprintln!("{:#}", e);
                        continue;
                    }
                };
                match speech::recognize(speech.as_ref(), wav).await {
                    Ok(Some(text)) => {
                        println!("heard: {}", text);
                        print_outcome(session.submit(text).await);
                    }
                    Ok(None) => println!("> (no speech detected)"),
                    Err(e) => eprintln!("error: {}", e),
                }
            }
            ConsoleCommand::State => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&session.snapshot().vehicle)?
                );
            }
            ConsoleCommand::Quit => break,
        }
    }

    drop(session);
    session_task.await.context("Dispatcher session panicked")?;
    Ok(())
}
