//! deepquant - conversational client for the research backend
//!
//! Subcommands:
//! - `chat`: send a prompt and stream the agents' responses
//! - `replay`: play a recorded session through the same pipeline
//! - `reports`: list, show and delete stored reports
//!
//! Uses XDG Base Directory specification for file locations:
//! - Logs: $XDG_STATE_HOME/deepquant/deepquant.log (~/.local/state/deepquant/deepquant.log)
//! - Config: $XDG_CONFIG_HOME/deepquant/config.toml (~/.config/deepquant/config.toml)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use deepquant_core::{
    ApiClient, Config, Conversation, InterruptOption, Message, Pacing, ReplayLog, ReplaySession,
    Role, Store,
};

#[derive(Parser)]
#[command(name = "deepquant")]
#[command(about = "Conversational client for the deep research backend")]
#[command(version)]
struct Args {
    /// Print tool calls and results as well as message text
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a prompt and stream the response
    Chat {
        /// Prompt text (empty resumes the thread without a user message)
        #[arg(default_value = "")]
        prompt: String,

        /// Feedback value answering the previous interrupt
        #[arg(long)]
        feedback: Option<String>,

        /// Continue an existing thread
        #[arg(long)]
        thread: Option<String>,
    },

    /// Replay a recorded session file
    Replay {
        /// Recorded event stream (SSE text)
        file: PathBuf,

        /// Start in fast-forward
        #[arg(long)]
        fast_forward: bool,
    },

    /// Manage stored reports
    Reports {
        #[command(subcommand)]
        action: ReportsAction,
    },
}

#[derive(Subcommand)]
enum ReportsAction {
    /// List reports for the configured user
    List,

    /// Show a thread's report and history
    Show {
        /// Thread id
        thread: String,
    },

    /// Delete a report and its chat history
    Delete {
        /// Report id
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard =
        deepquant_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("deepquant starting");

    match args.command {
        Command::Chat {
            prompt,
            feedback,
            thread,
        } => run_chat(&config, &prompt, feedback, thread, args.verbose).await,
        Command::Replay { file, fast_forward } => {
            run_replay(&config, &file, fast_forward, args.verbose).await
        }
        Command::Reports { action } => run_reports(&config, action).await,
    }
}

// ============================================
// Chat
// ============================================

async fn run_chat(
    config: &Config,
    prompt: &str,
    feedback: Option<String>,
    thread: Option<String>,
    verbose: bool,
) -> Result<()> {
    let conversation = Conversation::connect(config).context("failed to create API client")?;

    if let Some(value) = feedback {
        conversation.select_feedback(InterruptOption {
            text: value.clone(),
            value,
        });
    }

    install_cancel_handler(&conversation)?;

    let result = conversation.send(prompt, thread, None).await;
    print_conversation(conversation.store(), verbose);

    let summary = result.context("chat turn failed")?;
    tracing::info!(
        outcome = ?summary.outcome,
        events = summary.events,
        "Chat turn complete"
    );

    if let Some(options) = pending_interrupt(conversation.store()) {
        println!();
        println!("The assistant is waiting for feedback. Answer with --feedback <VALUE>:");
        for option in options {
            println!("  {:<16} {}", option.value, option.text);
        }
    }
    Ok(())
}

fn install_cancel_handler(conversation: &Conversation) -> Result<()> {
    let conversation = conversation.clone();
    ctrlc::set_handler(move || {
        if let Err(e) = conversation.cancel() {
            tracing::debug!(error = %e, "Nothing to cancel");
        }
    })
    .context("failed to install Ctrl-C handler")
}

/// Options of the last message, if it stopped on an interrupt.
fn pending_interrupt(store: &Store) -> Option<Vec<InterruptOption>> {
    store
        .messages()
        .pop()
        .filter(|m| !m.options.is_empty())
        .map(|m| m.options)
}

// ============================================
// Replay
// ============================================

async fn run_replay(
    config: &Config,
    file: &std::path::Path,
    fast_forward: bool,
    verbose: bool,
) -> Result<()> {
    let log = ReplayLog::load(file, &config.replay)
        .with_context(|| format!("failed to load replay file {}", file.display()))?;
    if log.is_empty() {
        bail!("replay file {} contains no events", file.display());
    }

    let pacing = if fast_forward {
        Pacing::FastForward
    } else {
        Pacing::Normal
    };
    tracing::info!(
        path = %file.display(),
        events = log.len(),
        pacing = ?pacing,
        "Starting replay"
    );

    let session = Arc::new(ReplaySession::new(log, &config.replay).with_pacing(pacing));
    let conversation = Conversation::replay(session.clone(), config.chat.clone());
    install_cancel_handler(&conversation)?;

    let result = conversation.send("", None, None).await;
    print_conversation(conversation.store(), verbose);
    result.context("replay failed")?;

    println!();
    println!("Replayed {} event(s)", session.delivered());
    Ok(())
}

// ============================================
// Reports
// ============================================

async fn run_reports(config: &Config, action: ReportsAction) -> Result<()> {
    let client = ApiClient::new(&config.api).context("failed to create API client")?;

    match action {
        ReportsAction::List => {
            let reports = client.list_reports().await.context("failed to list reports")?;
            if reports.is_empty() {
                println!("No reports");
                return Ok(());
            }
            for report in reports {
                let created = report
                    .created_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<8} {:<16} {:<38} {}",
                    report.id,
                    created,
                    report.thread_id.as_deref().unwrap_or("-"),
                    report.title
                );
            }
        }
        ReportsAction::Show { thread } => {
            let history = client
                .fetch_thread(&thread)
                .await
                .with_context(|| format!("failed to fetch thread {}", thread))?;
            println!("# {}", history.title);
            println!();
            for message in &history.messages {
                println!("[{}] {}", message.role, message.content);
            }
            println!();
            println!("{}", history.content);
        }
        ReportsAction::Delete { id } => {
            client
                .delete_report(&id)
                .await
                .with_context(|| format!("failed to delete report {}", id))?;
            println!("Deleted report {}", id);
        }
    }
    Ok(())
}

// ============================================
// Output
// ============================================

fn print_conversation(store: &Store, verbose: bool) {
    for message in store.messages() {
        print_message(&message, verbose);
    }

    for notice in store.notices() {
        eprintln!("{:?}: {}", notice.level, notice.text);
    }

    let research_ids = store.read(|state| state.research.research_ids().to_vec());
    for research_id in research_ids {
        if let Some(report) = store.report_text(&research_id) {
            println!();
            println!("=== Report ({}) ===", research_id);
            println!("{}", report);
        }
    }
}

fn print_message(message: &Message, verbose: bool) {
    let speaker = match message.role {
        Role::User => "you",
        _ => message.agent.as_str(),
    };
    if !message.content.is_empty() {
        println!("[{}] {}", speaker, message.content);
    }
    if !verbose {
        return;
    }
    for call in &message.tool_calls {
        println!("  -> {}({})", call.name, call.args);
        if let Some(result) = message.tool_result(&call.id) {
            println!("  <- {}", result.content);
        }
    }
    if let Some(reason) = &message.finish_reason {
        println!("  ({})", reason.as_str());
    }
}
