//! Interactive session loop: keeps the log open across instructions.

use crate::session::Session;
use cua_claw_runtime::{Computer, ReasoningService, TurnOutcome};
use std::io::{self, Write};

/// What a typed line asks the loop to do.
#[derive(Debug, PartialEq, Eq)]
pub enum ReplCommand<'a> {
    Exit,
    Help,
    Status,
    Clear,
    Skip,
    Instruction(&'a str),
}

pub fn parse_line(line: &str) -> ReplCommand<'_> {
    match line.trim() {
        "" => ReplCommand::Skip,
        "exit" | "quit" => ReplCommand::Exit,
        "help" => ReplCommand::Help,
        "status" => ReplCommand::Status,
        "clear" => ReplCommand::Clear,
        text => ReplCommand::Instruction(text),
    }
}

/// Read instructions until `exit` or end of input.
///
/// # Returns
/// The outcome of the last instruction run, if any
///
/// # Errors
/// Returns error on terminal I/O failure or a log integrity fault
pub async fn run<S, C>(session: &mut Session<S, C>) -> anyhow::Result<Option<TurnOutcome>>
where
    S: ReasoningService,
    C: Computer,
{
    println!("Commands: exit, status, clear, help. Anything else is an instruction.");
    let mut last = None;

    loop {
        print!("cua> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        match parse_line(&input) {
            ReplCommand::Skip => continue,
            ReplCommand::Exit => break,
            ReplCommand::Help => {
                println!("  exit, quit  - End the session");
                println!("  status      - Show session status");
                println!("  clear       - Clear screen");
            }
            ReplCommand::Status => {
                let (width, height) = session.computer().dimensions();
                println!(
                    "  Environment: {} ({}x{})",
                    session.computer().environment(),
                    width,
                    height
                );
                println!("  Log items: {}", session.log().len());
            }
            ReplCommand::Clear => print!("\x1B[2J\x1B[1;1H"),
            ReplCommand::Instruction(text) => {
                last = Some(session.run(text).await?);
            }
        }
    }

    Ok(last)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("  \n"), ReplCommand::Skip);
        assert_eq!(parse_line("quit\n"), ReplCommand::Exit);
        assert_eq!(parse_line("status"), ReplCommand::Status);
        assert_eq!(
            parse_line(" scroll to the footer \n"),
            ReplCommand::Instruction("scroll to the footer")
        );
    }
}
