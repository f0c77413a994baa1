//! A command line client for asking Dust agents.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use chrono::Local;
use clap::{Parser, Subcommand};
use dust_ask::core::protocol::{Credentials, DEFAULT_AGENT_ID};
use dust_ask::core::{Answer, AskError};
use dust_ask::{
    API_KEY_VAR, AnswerPrinter, Printed, Session, SessionBuilder, Settings,
    WORKSPACE_VAR,
};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::select;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";

#[derive(Debug, Parser)]
#[command(
    name = "dust-ask",
    version,
    about = "Ask Dust agents from the terminal"
)]
struct Cli {
    /// Where credentials, history and the agent cache are kept.
    #[arg(long, global = true, env = "DUST_ASK_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Overrides the API base URL.
    #[arg(long, global = true, env = "DUST_BASE_URL", hide = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Saves the credentials of a workspace.
    Login {
        /// The workspace API key.
        #[arg(long)]
        api_key: String,
        /// The workspace id.
        #[arg(long)]
        workspace: String,
    },
    /// Asks a question and streams the answer.
    Ask {
        /// The agent to ask.
        #[arg(short, long, default_value = DEFAULT_AGENT_ID)]
        agent: String,
        /// Gives up after this many seconds.
        #[arg(long, default_value_t = 120)]
        timeout: u64,
        /// The question.
        #[arg(required = true, trailing_var_arg = true)]
        question: Vec<String>,
    },
    /// Lists the active agents of the workspace.
    Agents,
    /// Shows or edits past questions.
    History {
        /// Removes the entries of a conversation.
        #[arg(long, conflicts_with = "clear")]
        remove: Option<String>,
        /// Removes every entry.
        #[arg(long)]
        clear: bool,
    },
}

enum AskEvent {
    Conversation(String),
    Answer(String),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = match cli.config_dir {
        Some(dir) => Settings::in_dir(dir),
        None => Settings::locate()
            .context("no config directory, pass --config-dir")?,
    };

    match cli.command {
        Command::Login { api_key, workspace } => {
            login(&settings, Credentials::new(api_key, workspace)).await
        }
        Command::History { remove, clear } => {
            history(&settings, remove, clear).await
        }
        Command::Ask {
            agent,
            timeout,
            question,
        } => {
            let session = open_session(settings, cli.base_url).await?;
            let question = question.join(" ");
            ask(&session, &question, &agent, Duration::from_secs(timeout)).await
        }
        Command::Agents => {
            let session = open_session(settings, cli.base_url).await?;
            agents(&session).await
        }
    }
}

async fn open_session(
    settings: Settings,
    base_url: Option<String>,
) -> Result<Session> {
    let Some(credentials) = settings.credentials().await? else {
        eprintln!(
            "{} You must configure your Dust API key and workspace id first.",
            "!".bright_yellow().bold()
        );
        eprintln!(
            "  Run `dust-ask login --api-key <KEY> --workspace <ID>`, or set \
             {API_KEY_VAR} and {WORKSPACE_VAR}."
        );
        bail!("missing credentials");
    };

    let mut builder = SessionBuilder::with_credentials(credentials, settings);
    if let Some(base_url) = base_url {
        builder = builder.with_base_url(base_url);
    }
    Ok(builder.build())
}

async fn login(settings: &Settings, credentials: Credentials) -> Result<()> {
    if !credentials.is_complete() {
        bail!("both the API key and the workspace id are required");
    }
    settings.save_credentials(&credentials).await?;
    println!(
        "{} Saved credentials for workspace {}",
        "✓".bright_green(),
        credentials.workspace_id().bold()
    );
    Ok(())
}

async fn ask(
    session: &Session,
    question: &str,
    agent: &str,
    timeout: Duration,
) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let question = session
        .question(question, agent)
        .await
        .on_conversation({
            let event_tx = event_tx.clone();
            move |id| {
                event_tx.send(AskEvent::Conversation(id.to_owned())).ok();
            }
        })
        .on_answer(move |text| {
            event_tx.send(AskEvent::Answer(text.to_owned())).ok();
        });

    let client = session.client().clone();
    let task: JoinHandle<Result<Answer, AskError>> =
        tokio::spawn(async move { question.ask(&client).await });

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")?
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(progress_style);
    progress_bar.set_message(format!("🤔 Asking {agent}..."));
    progress_bar.enable_steady_tick(Duration::from_millis(100));

    let deadline = sleep(timeout);
    tokio::pin!(deadline);

    let mut printer = AnswerPrinter::new();
    let mut conversation_id = None;
    loop {
        let event = select! {
            event = event_rx.recv() => {
                // The callbacks are dropped once the question is done.
                let Some(event) = event else {
                    break;
                };
                event
            },
            _ = &mut deadline => {
                task.abort();
                progress_bar.finish_and_clear();
                println!();
                eprintln!(
                    "{} No answer after {} seconds.",
                    "✗".bright_red(),
                    timeout.as_secs()
                );
                bail!("timed out");
            }
        };

        match event {
            AskEvent::Conversation(id) => {
                debug!("asking in conversation {id}");
                conversation_id = Some(id);
            }
            AskEvent::Answer(text) => {
                // Finish the progress bar before printing anything else.
                if !progress_bar.is_finished() {
                    progress_bar.finish_and_clear();
                    print!("{}🤖 ", BAR_CHAR.bright_cyan());
                }
                match printer.update(&text) {
                    Printed::Nothing => {}
                    Printed::Append(suffix) => print!("{suffix}"),
                    Printed::Replace(text) => {
                        print!("\n{}🤖 {text}", BAR_CHAR.bright_cyan());
                    }
                }
                std::io::stdout().flush()?;
            }
        }
    }
    progress_bar.finish_and_clear();
    if !printer.shown().is_empty() {
        println!();
    }

    match task.await? {
        Ok(answer) => {
            println!(
                "\n{} Continue on Dust: {}",
                "→".bright_green(),
                session.continue_url(&answer.conversation_id).underline()
            );
            Ok(())
        }
        Err(err) => {
            eprintln!("{} {err}", "✗".bright_red());
            let conversation_id =
                err.conversation_id().or(conversation_id.as_deref());
            if let Some(id) = conversation_id {
                eprintln!("  See {}", session.continue_url(id).underline());
            }
            bail!("no answer");
        }
    }
}

async fn agents(session: &Session) -> Result<()> {
    let list = session.agents().await?;
    if let Some(err) = &list.stale {
        eprintln!(
            "{} Showing cached agents, the live list is unavailable: {err}",
            "!".bright_yellow().bold()
        );
    }
    if list.agents.is_empty() {
        println!("No active agents.");
        return Ok(());
    }
    for agent in list.agents.values() {
        println!(
            "{}{} {}",
            BAR_CHAR.bright_cyan(),
            agent.name.bright_white().bold(),
            format!("({})", agent.id).dimmed()
        );
        if !agent.description.is_empty() {
            println!("{}  {}", BAR_CHAR.bright_cyan(), agent.description);
        }
    }
    Ok(())
}

async fn history(
    settings: &Settings,
    remove: Option<String>,
    clear: bool,
) -> Result<()> {
    let store = settings.history();
    if clear {
        store.clear().await?;
        println!("{} Cleared history", "✓".bright_green());
        return Ok(());
    }
    if let Some(id) = remove {
        if store.remove(&id).await? {
            println!("{} Removed {id}", "✓".bright_green());
        } else {
            println!("Nothing recorded for {id}");
        }
        return Ok(());
    }

    let entries = store.load().await?;
    if entries.is_empty() {
        println!("No history yet.");
        return Ok(());
    }
    for entry in entries {
        let date = entry.date.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        println!(
            "{}{} {} {}",
            BAR_CHAR.bright_cyan(),
            date.to_string().dimmed(),
            entry.agent.bright_white(),
            format!("({})", entry.conversation_id).dimmed()
        );
        println!("{}❓ {}", BAR_CHAR.bright_cyan(), entry.question.bold());
        println!("{}🤖 {}", BAR_CHAR.bright_cyan(), entry.answer);
        println!();
    }
    Ok(())
}
