//! deskchat - chat with locally installed models from the terminal

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deskchat::render::{self, Transcript};
use deskchat::{ChatApp, Config, HttpBackend};

#[derive(Debug, Parser)]
#[command(name = "deskchat", version, about = "Chat with local AI models")]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "DESKCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Backend base URL, overriding the configuration
    #[arg(long)]
    backend_url: Option<String>,

    /// Chat socket URL, overriding the configuration
    #[arg(long)]
    ws_url: Option<String>,
}

enum Command<'a> {
    Send(&'a str),
    Models,
    Model(&'a str),
    History,
    Open(&'a str),
    Show(&'a str),
    Help,
    Quit,
    Exit,
    Unknown(&'a str),
}

fn parse_command(line: &str) -> Command<'_> {
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Send(line);
    };
    let (name, arg) = rest.split_once(' ').unwrap_or((rest, ""));
    match name {
        "models" => Command::Models,
        "model" => Command::Model(arg.trim()),
        "history" => Command::History,
        "open" => Command::Open(arg.trim()),
        "show" => Command::Show(arg.trim()),
        "help" => Command::Help,
        "quit" => Command::Quit,
        "exit" => Command::Exit,
        _ => Command::Unknown(name),
    }
}

const HELP: &str = "Commands:
  /models          list installed models
  /model <name>    choose the model to chat with
  /history         list saved conversations
  /open <id>       load a saved conversation
  /show <id>       preview a saved conversation without loading it
  /quit            leave deskchat
  /exit            close the desktop session and leave";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deskchat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = cli.backend_url {
        config.backend_url = url;
    }
    if let Some(url) = cli.ws_url {
        config.ws_url = Some(url);
    }
    config.validate()?;

    tracing::info!(backend = %config.backend_url, socket = %config.socket_url(), "starting deskchat");

    let backend = Arc::new(HttpBackend::new(config.backend_url.clone()));
    let mut app = ChatApp::new(config, backend);
    app.load().await;

    let mut stdout = io::stdout();
    let mut transcript = Transcript::new();
    transcript.sync(&app.state().turns, &mut stdout)?;
    print_banner(&app, &mut transcript, &mut stdout)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(&mut app, &line, &mut transcript, &mut stdout).await? {
                    break;
                }
            }
            Some(event) = app.next_event() => {
                app.handle_event(event);
            }
        }
        transcript.sync(&app.state().turns, &mut stdout)?;
    }

    // Let an in-flight save finish before leaving
    if app.state().active.is_none() {
        app.settle().await;
    }
    writeln!(stdout)?;
    Ok(())
}

/// Returns `false` when the user asked to leave
async fn handle_line<W: Write>(
    app: &mut ChatApp,
    line: &str,
    transcript: &mut Transcript,
    out: &mut W,
) -> io::Result<bool> {
    match parse_command(line.trim_end()) {
        Command::Send(text) => {
            let _ = app.send(text);
        }
        Command::Models => {
            let state = app.state();
            if state.models.is_empty() {
                transcript.note("No models available.", out)?;
            }
            for model in &state.models {
                let marker = if state.selected_model.as_deref() == Some(model.as_str()) {
                    "*"
                } else {
                    " "
                };
                transcript.note(&format!("{} {}", marker, model), out)?;
            }
        }
        Command::Model(name) => {
            if app.select_model(name) {
                transcript.note(&format!("Using model: {}", name), out)?;
            } else {
                transcript.note(&format!("Unknown model: {}", name), out)?;
            }
        }
        Command::History => {
            let history = app.history();
            if history.is_empty() {
                transcript.note("No saved conversations.", out)?;
            }
            for conversation in history {
                transcript.note(&render::history_line(conversation), out)?;
            }
        }
        Command::Open(id) => match id.parse::<i64>() {
            Ok(id) if app.select_conversation(id) => {
                transcript.redraw(&app.state().turns, out)?;
            }
            _ => transcript.note(&format!("No conversation with id {}", id), out)?,
        },
        Command::Show(id) => match id.parse::<i64>().ok().and_then(|id| app.conversation(id)) {
            Some(conversation) => {
                transcript.note(&render::conversation_preview(conversation), out)?;
            }
            None => transcript.note(&format!("No conversation with id {}", id), out)?,
        },
        Command::Help => transcript.note(HELP, out)?,
        Command::Quit => return Ok(false),
        Command::Exit => {
            let _ = app.exit().await;
            return Ok(false);
        }
        Command::Unknown(name) => {
            transcript.note(&format!("Unknown command /{} (try /help)", name), out)?;
        }
    }
    Ok(true)
}

fn print_banner<W: Write>(app: &ChatApp, transcript: &mut Transcript, out: &mut W) -> io::Result<()> {
    let state = app.state();
    if !state.first_message {
        return Ok(());
    }
    if let Some(banner) = render::status_banner(
        state.status,
        state.selected_model.as_deref(),
        &app.config().download_url,
    ) {
        transcript.note(&banner, out)?;
    }
    Ok(())
}
