//! Parley CLI: a campus assistant that remembers each conversation.

use anyhow::{Context, Result};
use clap::Parser;
use parley_api::CompletionsAnswerer;
use parley_config::{CheckpointBackend, CliOverrides, ParleyConfig};
use parley_core::ChatService;
use parley_memory::{
    CheckpointMirror, FileMirror, MemoryManager, MemorySaver, NoopMirror, Reclaimer,
    VersionedMirror,
};
use parley_types::ParleyError;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "parley", version, about = "A campus assistant with conversation memory")]
struct Cli {
    /// Send a single question and print the answer (non-interactive)
    #[arg(short, long)]
    print: Option<String>,

    /// Session id to start in (created if unknown)
    #[arg(long)]
    session: Option<String>,

    /// Model to use
    #[arg(long)]
    model: Option<String>,

    /// Maximum tokens in each answer
    #[arg(long)]
    max_tokens: Option<u32>,

    /// API key (overrides GROQ_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Maximum number of live sessions
    #[arg(long)]
    max_sessions: Option<usize>,

    /// Minutes of inactivity before a session is reclaimed
    #[arg(long)]
    expiry_minutes: Option<u64>,

    /// Number of trailing messages handed to the model as history
    #[arg(long)]
    history_length: Option<usize>,

    /// Enable verbose/debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = ParleyConfig::load(CliOverrides {
        api_key: cli.api_key,
        model: cli.model,
        max_tokens: cli.max_tokens,
        expiry_minutes: cli.expiry_minutes,
        max_sessions: cli.max_sessions,
        max_history_length: cli.history_length,
    })
    .context("Failed to load configuration")?;

    let chat = build_chat_service(&config)?;

    if let Some(question) = cli.print {
        let reply = chat
            .ask(cli.session.as_deref(), &question, &CancellationToken::new())
            .await?;
        println!("{}", reply.answer);
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let reclaimer = Reclaimer::spawn(chat.memory().clone(), shutdown.clone());

    let result = repl(&chat, &config, cli.session).await;

    shutdown.cancel();
    if let Err(e) = reclaimer.await {
        tracing::warn!("Session reclaimer exited abnormally: {e}");
    }
    result
}

fn build_chat_service(config: &ParleyConfig) -> Result<ChatService> {
    let mirror = build_mirror(config)?;
    let memory = MemoryManager::new(config.memory.clone(), mirror)
        .context("Invalid memory configuration")?;

    let mut answerer =
        CompletionsAnswerer::new(&config.api_key, &config.api_base_url, &config.model)
            .context("Failed to create API client")?
            .with_max_tokens(config.max_tokens)
            .with_temperature(config.temperature);
    if let Some(prompt) = &config.system_prompt {
        answerer = answerer.with_system_prompt(prompt);
    }

    Ok(ChatService::new(Arc::new(memory), Arc::new(answerer)))
}

fn build_mirror(config: &ParleyConfig) -> Result<Arc<dyn CheckpointMirror>> {
    Ok(match config.checkpoint {
        CheckpointBackend::None => Arc::new(NoopMirror),
        CheckpointBackend::Memory => Arc::new(VersionedMirror::new(MemorySaver::new())),
        CheckpointBackend::File => Arc::new(
            FileMirror::new(&config.checkpoint_dir).with_context(|| {
                format!(
                    "Failed to open checkpoint directory {}",
                    config.checkpoint_dir.display()
                )
            })?,
        ),
    })
}

async fn repl(chat: &ChatService, config: &ParleyConfig, session: Option<String>) -> Result<()> {
    let memory = chat.memory();
    let mut session_id = memory.get_or_create(session.as_deref());
    let stdin = io::stdin();
    let turn = Arc::new(ActiveTurn::default());
    let interrupts = spawn_interrupt_listener(turn.clone());

    eprintln!(
        "parley v{} (model: {}, session: {})",
        env!("CARGO_PKG_VERSION"),
        config.model,
        short(&session_id)
    );
    eprintln!("Ask a question. Type /help for commands, Ctrl+D to exit.\n");

    loop {
        eprint!("> ");
        io::stderr().flush()?;

        let mut input = String::new();
        let bytes_read = stdin.lock().read_line(&mut input)?;
        if bytes_read == 0 {
            eprintln!();
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(handled) = handle_slash_command(input, chat, &mut session_id) {
            match handled {
                SlashResult::Continue => continue,
                SlashResult::Break => break,
                SlashResult::Unknown => {
                    eprintln!("Unknown command: {input}. Type /help for available commands.");
                    continue;
                }
            }
        }

        let cancel = turn.begin();
        let result = chat.ask(Some(session_id.as_str()), input, &cancel).await;
        turn.finish();

        match result {
            Ok(reply) => {
                // The session may have been reclaimed and recreated under the same id
                session_id = reply.session_id;
                println!("{}\n", reply.answer);
            }
            Err(ParleyError::Cancelled) => eprintln!("\n(cancelled)\n"),
            Err(e) => eprintln!("\nError: {e}\n"),
        }
    }

    interrupts.abort();
    Ok(())
}

/// Cancellation slot for the answer currently being generated.
///
/// Installing a SIGINT handler replaces the default one for the rest of the
/// process, so a single listener routes Ctrl+C either to the active turn or,
/// between turns, to process exit.
#[derive(Default)]
struct ActiveTurn {
    current: Mutex<Option<CancellationToken>>,
}

impl ActiveTurn {
    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.slot() = Some(token.clone());
        token
    }

    fn finish(&self) {
        self.slot().take();
    }

    /// Cancel the active turn. Returns false when no turn is running.
    fn interrupt(&self) -> bool {
        match self.slot().take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn spawn_interrupt_listener(turn: Arc<ActiveTurn>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !turn.interrupt() {
                eprintln!();
                std::process::exit(130);
            }
        }
    })
}

enum SlashResult {
    Continue,
    Break,
    Unknown,
}

fn handle_slash_command(
    input: &str,
    chat: &ChatService,
    session_id: &mut String,
) -> Option<SlashResult> {
    if !input.starts_with('/') {
        return None;
    }

    let memory = chat.memory();
    let (command, arg) = match input.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (input, ""),
    };

    let result = match command {
        "/quit" | "/exit" => SlashResult::Break,
        "/help" => {
            print_help();
            SlashResult::Continue
        }
        "/new" => {
            *session_id = memory.create_session(None);
            eprintln!("Started session {}", short(session_id));
            SlashResult::Continue
        }
        "/session" => {
            if arg.is_empty() {
                eprintln!("Current session: {session_id}");
            } else {
                let existed = memory.contains(arg);
                *session_id = memory.get_or_create(Some(arg));
                if existed {
                    eprintln!("Switched to session {}", short(session_id));
                } else {
                    eprintln!("Started session {}", short(session_id));
                }
            }
            SlashResult::Continue
        }
        "/history" => {
            let history = memory.history_as_text(session_id);
            if history.is_empty() {
                eprintln!("No messages in this session yet.");
            } else {
                eprintln!("{history}");
            }
            SlashResult::Continue
        }
        "/clear" => {
            memory.clear(session_id);
            *session_id = memory.create_session(None);
            eprintln!("Conversation cleared. New session {}", short(session_id));
            SlashResult::Continue
        }
        "/stats" => {
            print_stats(chat, session_id);
            SlashResult::Continue
        }
        _ => SlashResult::Unknown,
    };
    Some(result)
}

fn print_stats(chat: &ChatService, current: &str) {
    let stats = chat.memory().stats();
    let config = chat.memory().config();
    eprintln!(
        "{} active session(s) (capacity {}, expiry {}m, answers by {})",
        stats.active_sessions,
        config.max_sessions,
        config.expiry.as_secs() / 60,
        chat.answerer_name()
    );
    for s in &stats.sessions {
        let marker = if s.id == current { "*" } else { " " };
        eprintln!(
            " {marker}{:<8} {:>9}  {:>3} msgs  {}",
            s.short_id(),
            s.idle(),
            s.message_count,
            if s.preview.is_empty() {
                "(empty)"
            } else {
                &s.preview
            }
        );
    }
}

fn short(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

fn print_help() {
    eprintln!("Available commands:");
    eprintln!("  /help          Show this help");
    eprintln!("  /new           Start a fresh session");
    eprintln!("  /session <id>  Switch to (or create) a session");
    eprintln!("  /history       Show the history the assistant sees");
    eprintln!("  /clear         Forget this session and start a new one");
    eprintln!("  /stats         List active sessions");
    eprintln!("  /quit          Exit");
    eprintln!();
    eprintln!("Press Ctrl+C while waiting to cancel an answer, or at the prompt to exit.");
}
