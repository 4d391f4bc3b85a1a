//! One agent session: a turn loop plus the log it grows.

use anyhow::{Context, Result};
use cua_claw_runtime::{
    Computer, InteractionLog, ReasoningService, RuntimeError, TurnLoop, TurnOutcome,
};
use serde_json::json;
use std::io::{self, Write};
use std::path::Path;
use tracing::{info, warn};

pub struct Session<S, C>
where
    S: ReasoningService,
    C: Computer,
{
    turn: TurnLoop<S, C>,
    log: InteractionLog,
}

impl<S, C> Session<S, C>
where
    S: ReasoningService,
    C: Computer,
{
    pub fn new(turn: TurnLoop<S, C>) -> Self {
        Self {
            turn,
            log: InteractionLog::new(),
        }
    }

    pub fn log(&self) -> &InteractionLog {
        &self.log
    }

    pub fn computer(&self) -> &C {
        self.turn.computer().as_ref()
    }

    /// Run one instruction to its outcome and print the result.
    ///
    /// # Errors
    /// Only integrity faults in the log surface as errors
    pub async fn run(&mut self, instruction: &str) -> Result<TurnOutcome, RuntimeError> {
        self.turn.cancellation().reset();
        let outcome = self.turn.run_instruction(&mut self.log, instruction).await?;
        self.report(&outcome);
        Ok(outcome)
    }

    fn report(&self, outcome: &TurnOutcome) {
        if let Err(e) = write_outcome(&mut io::stdout().lock(), outcome) {
            warn!(error = %e, "Could not print the final message");
        }
    }

    /// Write the redacted log as pretty JSON.
    pub fn write_transcript(&self, path: &Path) -> Result<()> {
        let transcript = json!({
            "exported_at": chrono::Utc::now().to_rfc3339(),
            "items": self.log.redacted(),
        });
        let content = serde_json::to_string_pretty(&transcript)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write transcript {}", path.display()))?;
        info!(path = %path.display(), items = self.log.len(), "Transcript written");
        Ok(())
    }
}

/// Print the answer of a completed turn; other outcomes are logged.
///
/// The answer is written regardless of `--quiet`, which only hides the
/// instruction preview and step logs.
pub fn write_outcome<W: Write>(out: &mut W, outcome: &TurnOutcome) -> io::Result<()> {
    match outcome {
        TurnOutcome::Completed { message } => {
            writeln!(out, "{message}")?;
            out.flush()?;
        }
        TurnOutcome::Cancelled => warn!("Turn cancelled"),
        TurnOutcome::Aborted { reason } => warn!(reason = %reason, "Turn aborted"),
        TurnOutcome::Blocked { url } => warn!(url = %url, "Stopped on a blocked location"),
        TurnOutcome::SafetyDeclined { message } => {
            warn!(check = %message, "Safety check declined")
        }
        TurnOutcome::IterationLimit => warn!("Turn hit the iteration limit"),
    }
    Ok(())
}

/// Process exit code for a turn's outcome.
pub fn exit_code(outcome: &TurnOutcome) -> u8 {
    match outcome {
        TurnOutcome::Completed { .. } => 0,
        TurnOutcome::Aborted { .. } => 1,
        TurnOutcome::IterationLimit => 2,
        TurnOutcome::Blocked { .. } => 3,
        TurnOutcome::SafetyDeclined { .. } => 4,
        TurnOutcome::Cancelled => 130,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use cua_claw_runtime::AbortReason;

    #[test]
    fn test_completed_answer_is_always_printed() {
        let mut out = Vec::new();
        write_outcome(
            &mut out,
            &TurnOutcome::Completed {
                message: "The table is booked.".to_string(),
            },
        )
        .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "The table is booked.\n");

        let mut out = Vec::new();
        write_outcome(&mut out, &TurnOutcome::IterationLimit).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_only_completion_exits_cleanly() {
        assert_eq!(
            exit_code(&TurnOutcome::Completed {
                message: "done".to_string()
            }),
            0
        );
        assert_ne!(
            exit_code(&TurnOutcome::Aborted {
                reason: AbortReason::EmptyResponse
            }),
            0
        );
        assert_ne!(exit_code(&TurnOutcome::IterationLimit), 0);
        assert_eq!(exit_code(&TurnOutcome::Cancelled), 130);
    }
}
