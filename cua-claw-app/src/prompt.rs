//! Terminal prompt for pending safety checks.

use async_trait::async_trait;
use cua_claw_runtime::types::SafetyCheck;
use cua_claw_runtime::SafetyAcknowledger;
use std::io::{self, BufRead, Write};
use tracing::warn;

/// Asks on the terminal before an action flagged by the service runs.
pub struct StdinAcknowledger;

/// Only an explicit "y" acknowledges.
pub fn is_acknowledgement(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

fn ask(message: &str) -> io::Result<String> {
    let mut stdout = io::stdout();
    writeln!(stdout, "Safety Check Warning: {message}")?;
    write!(stdout, "Do you want to acknowledge and proceed? (y/n): ")?;
    stdout.flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer)
}

#[async_trait]
impl SafetyAcknowledger for StdinAcknowledger {
    async fn acknowledge(&self, check: &SafetyCheck) -> bool {
        let message = check.message.clone();
        match tokio::task::spawn_blocking(move || ask(&message)).await {
            Ok(Ok(answer)) => is_acknowledgement(&answer),
            Ok(Err(e)) => {
                warn!(check = %check.id, error = %e, "Could not read safety answer, declining");
                false
            }
            Err(e) => {
                warn!(check = %check.id, error = %e, "Safety prompt task failed, declining");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_only_yes_acknowledges() {
        assert!(is_acknowledgement("y\n"));
        assert!(is_acknowledgement(" Y "));
        assert!(!is_acknowledgement("yes"));
        assert!(!is_acknowledgement("n"));
        assert!(!is_acknowledgement(""));
    }
}
