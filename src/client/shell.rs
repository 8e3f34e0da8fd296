//! Interactive shell
//!
//! Line parsing and result formatting for `dax-cli`. Keys typed at the
//! prompt are forced to the configured width so every key the shell sends
//! has the same length; `ALL` is the one exception.

use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::protocol::Command;

use super::Client;

/// Banner printed when the shell starts
pub const BANNER: &str = "Cache Client\nCommands: ADD <key> <value>, GET <key>, GET ALL, DELETE <key>, HEARTBEAT, EXIT";

/// One parsed prompt line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Add { key: String, value: String },
    Get { key: String },
    GetAll { key: String },
    Delete { key: String },
    Heartbeat,
    Exit,
    Empty,
    Invalid(String),
}

/// Parse one line typed at the prompt
pub fn parse(line: &str, config: &Config) -> ShellCommand {
    let line = line.trim();
    if line.is_empty() {
        return ShellCommand::Empty;
    }

    let (command, rest) = split_word(line);
    let command = command.to_ascii_lowercase();

    match command.as_str() {
        "exit" | "quit" => return ShellCommand::Exit,
        "heartbeat" => return ShellCommand::Heartbeat,
        "add" | "get" | "delete" => {}
        _ => return ShellCommand::Invalid(format!("Unknown command: {}", command)),
    }

    let (key, value) = split_word(rest);
    if key.is_empty() {
        return ShellCommand::Invalid(format!(
            "{} command requires a key",
            command.to_uppercase()
        ));
    }

    let all = key.as_bytes().eq_ignore_ascii_case(Command::ALL_KEY);
    if all && command == "get" {
        return ShellCommand::GetAll {
            key: key.to_string(),
        };
    }

    let key = if all {
        key.to_string()
    } else {
        fix_width(key, config.key_width)
    };
    match command.as_str() {
        "add" if value.is_empty() => {
            ShellCommand::Invalid("ADD command requires a value".to_string())
        }
        "add" => ShellCommand::Add {
            key,
            value: limit(value, config.max_value_bytes).to_string(),
        },
        "get" => ShellCommand::Get { key },
        _ => ShellCommand::Delete { key },
    }
}

/// Truncate or space-pad `key` to exactly `width` bytes
///
/// Truncation backs off to a char boundary, so a key cut inside a multi-byte
/// character is padded up to the width instead.
pub fn fix_width(key: &str, width: usize) -> String {
    let mut fixed = limit(key, width).to_string();
    while fixed.len() < width {
        fixed.push(' ');
    }
    fixed
}

/// Longest prefix of `text` no longer than `max` bytes
pub fn limit(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Run a command against the client, returning the line to print
///
/// Returns `None` for commands that print nothing.
pub fn run_command(
    client: &Client,
    command: &ShellCommand,
    timeout: Duration,
) -> Option<Result<String>> {
    let outcome = match command {
        ShellCommand::Add { key, value } => client
            .add(key.as_bytes(), value.as_bytes())
            .wait_timeout(timeout)
            .map(|added| format!("Add operation {}", outcome_word(added))),
        ShellCommand::Get { key } | ShellCommand::GetAll { key } => client
            .get(key.as_bytes())
            .wait_timeout(timeout)
            .map(|value| match value {
                Some(value) => String::from_utf8_lossy(&value).into_owned(),
                None => "Key not found".to_string(),
            }),
        ShellCommand::Delete { key } => client
            .delete(key.as_bytes())
            .wait_timeout(timeout)
            .map(|removed| format!("Delete operation {}", outcome_word(removed))),
        ShellCommand::Heartbeat => client
            .heartbeat()
            .wait_timeout(timeout)
            .map(|alive| if alive { "OK" } else { "FAILED" }.to_string()),
        ShellCommand::Invalid(reason) => Ok(reason.clone()),
        ShellCommand::Exit | ShellCommand::Empty => return None,
    };
    Some(outcome)
}

fn outcome_word(success: bool) -> &'static str {
    if success {
        "succeeded"
    } else {
        "failed"
    }
}

/// Split off the first whitespace-delimited word
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(at) => (&text[..at], text[at..].trim_start()),
        None => (text, ""),
    }
}
