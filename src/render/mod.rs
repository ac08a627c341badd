//! Terminal rendering of turns and status banners

mod transcript;

use colored::Colorize;

use crate::conversation::{Conversation, Role, Turn};
use crate::core::{ModelStatus, FENCE};

pub use transcript::Transcript;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    /// A fenced block; the first line of the block is its language label
    Code { language: &'a str, code: String },
}

/// Split content on fence markers.
///
/// Every marker toggles between prose and code, so an unterminated block
/// runs to the end of the content.
pub fn segments(content: &str) -> Vec<Segment<'_>> {
    content
        .split(FENCE)
        .enumerate()
        .map(|(idx, part)| {
            if idx % 2 == 0 {
                Segment::Text(part)
            } else {
                let mut lines = part.split('\n');
                let language = lines.next().unwrap_or_default();
                Segment::Code {
                    language,
                    code: lines.collect::<Vec<_>>().join("\n"),
                }
            }
        })
        .collect()
}

pub fn role_prefix(role: Role) -> String {
    let label = format!("{}>", role.as_str());
    match role {
        Role::System => label.yellow().to_string(),
        Role::User => label.blue().bold().to_string(),
        Role::Assistant => label.green().bold().to_string(),
    }
}

/// Full rendering of one turn with styled code blocks
pub fn render_turn(turn: &Turn) -> String {
    let mut out = format!("{} ", role_prefix(turn.role));
    for segment in segments(&turn.content) {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Code { language, code } => {
                out.push('\n');
                if !language.is_empty() {
                    out.push_str(&format!("  [{}]\n", language).dimmed().to_string());
                }
                for line in code.lines() {
                    out.push_str(&format!("  {}\n", line.cyan()));
                }
            }
        }
    }
    out
}

/// Guidance shown before the first exchange
pub fn status_banner(
    status: Option<ModelStatus>,
    selected_model: Option<&str>,
    download_url: &str,
) -> Option<String> {
    match status? {
        ModelStatus::Error => Some(format!(
            "{}\nPlease follow these steps:\n  1. Install Ollama from {}\n  2. Start the Ollama service\n  3. Install a model using: ollama pull llama2\n  4. Restart deskchat",
            "Ollama is not running or accessible".red().bold(),
            download_url
        )),
        ModelStatus::NoModels => Some(format!(
            "{}\nInstall a model using: ollama pull llama2",
            "No AI models are installed".yellow()
        )),
        ModelStatus::MultipleModels if selected_model.is_none() => Some(
            "Please select an AI model to begin (/models, /model <name>)."
                .blue()
                .to_string(),
        ),
        _ => None,
    }
}

/// One line per conversation in the history panel
pub fn history_line(conversation: &Conversation) -> String {
    format!(
        "[{}] {} {}",
        conversation.id,
        conversation.title.bold(),
        conversation.summary.dimmed()
    )
}

/// Expanded view of a saved conversation: its history line, then every turn
pub fn conversation_preview(conversation: &Conversation) -> String {
    let mut out = history_line(conversation);
    if conversation.messages.is_empty() {
        out.push_str(&format!("\n  {}", "(no messages)".dimmed()));
    }
    for turn in &conversation.messages {
        out.push('\n');
        out.push_str(render_turn(turn).trim_end());
    }
    out
}
