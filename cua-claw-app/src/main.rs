use anyhow::{bail, Context, Result};
use clap::Parser;
use cua_claw_app::cli::{normalize_start_url, preview, Cli, ComputerKind, PREVIEW_CHARS};
use cua_claw_app::prompt::StdinAcknowledger;
use cua_claw_app::repl;
use cua_claw_app::session::{exit_code, Session};
use cua_claw_runtime::{
    load_config, AcknowledgeAll, CancellationFlag, Computer, Config, ResponsesClient,
    SafetyAcknowledger, TurnLoop,
};
use cua_claw_tools::{DesktopComputer, DryRunComputer};
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let dotenv = dotenvy::dotenv();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded .env"),
        Err(e) => debug!(error = %e, "No .env loaded"),
    }

    let config = load(&cli)?;

    match cli.computer {
        ComputerKind::Desktop => run(&cli, config, Arc::new(DesktopComputer::detect().await)).await,
        ComputerKind::DryRun => run(&cli, config, Arc::new(DryRunComputer::new())).await,
    }
}

fn load(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => load_config(&path.to_string_lossy())?,
        None => Config::default(),
    };
    config.apply_process_env()?;
    config.validate()?;

    if config.service.api_key.is_none() {
        bail!("OPENAI_API_KEY is not set (environment, .env, or service.api_key)");
    }
    debug!(?config, "Configuration loaded");
    Ok(config)
}

fn read_instruction() -> io::Result<String> {
    print!("> ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}

/// Cancel the running turn on Ctrl+C; a second Ctrl+C exits.
fn install_interrupt(flag: CancellationFlag) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Ctrl+C handler unavailable");
                return;
            }
            if flag.is_cancelled() {
                std::process::exit(130);
            }
            warn!("Interrupt received, stopping after the current action");
            flag.cancel();
        }
    });
}

async fn run<C>(cli: &Cli, config: Config, computer: Arc<C>) -> Result<ExitCode>
where
    C: Computer + 'static,
{
    let instruction = cli.resolve_instruction(
        config.agent.default_instruction.as_deref(),
        read_instruction,
    )?;
    if !cli.quiet {
        println!("[Instruction] {}", preview(&instruction, PREVIEW_CHARS));
    }

    info!(
        environment = %computer.environment(),
        model = %config.service.model,
        "Starting session"
    );

    if let Some(url) = cli.start_url.as_deref().and_then(normalize_start_url) {
        computer
            .goto(&url)
            .await
            .with_context(|| format!("Failed to open start URL {url}"))?;
    }

    let acknowledger: Arc<dyn SafetyAcknowledger> = if cli.auto_ack {
        Arc::new(AcknowledgeAll)
    } else {
        Arc::new(StdinAcknowledger)
    };
    let cancel = CancellationFlag::new();
    install_interrupt(cancel.clone());

    let truncation = config.service.truncation;
    let service = Arc::new(ResponsesClient::new(config.service)?);
    let turn = TurnLoop::new(service, computer, &config.agent)
        .with_acknowledger(acknowledger)
        .with_cancellation(cancel)
        .with_truncation(truncation);
    let mut session = Session::new(turn);

    let result = run_instructions(cli, &mut session, &instruction).await;

    if let Some(path) = &cli.transcript {
        session.write_transcript(path)?;
    }
    result
}

async fn run_instructions<C>(
    cli: &Cli,
    session: &mut Session<ResponsesClient, C>,
    instruction: &str,
) -> Result<ExitCode>
where
    C: Computer + 'static,
{
    let mut last = session.run(instruction).await?;
    if cli.interactive {
        if let Some(outcome) = repl::run(session).await? {
            last = outcome;
        }
    }
    Ok(ExitCode::from(exit_code(&last)))
}
