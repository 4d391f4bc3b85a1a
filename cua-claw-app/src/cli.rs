//! Command-line surface of the `cua-claw` binary.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Characters of the instruction echoed before the first turn.
pub const PREVIEW_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ComputerKind {
    /// Drive the local Wayland desktop
    Desktop,
    /// Record actions without performing them
    DryRun,
}

/// Computer-use agent loop against the Responses API.
#[derive(Debug, Parser)]
#[command(name = "cua-claw", version)]
pub struct Cli {
    /// Automation backend to act through
    #[arg(long, value_enum, default_value_t = ComputerKind::Desktop)]
    pub computer: ComputerKind,

    /// Initial instruction text
    #[arg(long, conflicts_with = "task_file")]
    pub input: Option<String>,

    /// File holding the initial instruction
    #[arg(long, value_name = "PATH")]
    pub task_file: Option<PathBuf>,

    /// Open this URL before the first turn
    #[arg(long, value_name = "URL")]
    pub start_url: Option<String>,

    /// YAML config file with `service` and `agent` sections
    #[arg(long, env = "CUA_CLAW_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Keep the session open for further instructions
    #[arg(long)]
    pub interactive: bool,

    /// Acknowledge every safety check without asking
    #[arg(long)]
    pub auto_ack: bool,

    /// Suppress the instruction preview and step output
    #[arg(long, short, conflicts_with = "debug")]
    pub quiet: bool,

    /// Verbose logging, including redacted request dumps
    #[arg(long)]
    pub debug: bool,

    /// Write the redacted session log here as JSON on exit
    #[arg(long, value_name = "PATH")]
    pub transcript: Option<PathBuf>,
}

impl Cli {
    /// Default log directive when `RUST_LOG` is unset.
    pub fn log_directive(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    /// Pick the first instruction source that yields text.
    ///
    /// Order: `--input`, `--task-file`, the configured default, then `prompt`.
    ///
    /// # Errors
    /// Returns error if the task file cannot be read or every source is empty
    pub fn resolve_instruction<P>(&self, default: Option<&str>, prompt: P) -> Result<String>
    where
        P: FnOnce() -> std::io::Result<String>,
    {
        let from_file = match &self.task_file {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read task file {}", path.display()))?,
            ),
            None => None,
        };

        let chosen = [self.input.clone(), from_file, default.map(str::to_string)]
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty());

        let instruction = match chosen {
            Some(text) => text,
            None => prompt().context("Failed to read instruction")?,
        };
        if instruction.trim().is_empty() {
            bail!("No instruction given");
        }
        Ok(instruction)
    }
}

/// Single-line preview, cut at `limit` characters with an ellipsis.
pub fn preview(instruction: &str, limit: usize) -> String {
    let flat = instruction.trim().replace('\n', " ");
    if flat.chars().count() <= limit {
        return flat;
    }
    let mut cut: String = flat.chars().take(limit).collect();
    cut.push('…');
    cut
}

/// Prefix `https://` onto a scheme-less start URL.
pub fn normalize_start_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with("http") || trimmed.starts_with("file://") {
        return Some(trimmed.to_string());
    }
    Some(format!("https://{trimmed}"))
}
