//! Runs shell command lines non-interactively against a fresh session.

use anyhow::{Context, Result, bail};
use clap::Parser;
use po_session::about;
use po_session::config::StartupArgs;
use po_session::logging::{LogArgs, init_logging};
use po_session::session::Session;
use po_session::session_shell::{execute_shell_command, parse_shell_line};
use serde::Serialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "po_cli",
    about = "Apply a sequence of product operator commands and print the transcript",
    after_help = "Tip: pass @file.txt as a command to read one command per line from a file"
)]
struct Cli {
    #[command(flatten)]
    startup: StartupArgs,

    #[command(flatten)]
    log: LogArgs,

    /// Shell command lines, e.g. "pulse I --flip pi/2" "jc IS".
    #[arg(value_name = "COMMAND")]
    commands: Vec<String>,

    /// Save the final transcript to this path.
    #[arg(long = "output", short = 'o', value_name = "PATH")]
    output: Option<PathBuf>,

    /// Continue after a failing command instead of stopping.
    #[arg(long = "keep-going")]
    keep_going: bool,

    /// Print one JSON report instead of the transcript.
    #[arg(long)]
    json: bool,

    /// Print version and build number.
    #[arg(long = "version", short = 'V')]
    version: bool,
}

#[derive(Serialize)]
struct CommandReport {
    line: String,
    ok: bool,
    output: serde_json::Value,
}

#[derive(Serialize)]
struct RunReport {
    commands: Vec<CommandReport>,
    failed: usize,
    transcript: String,
}

/// Expands `@path` arguments into the non-empty, non-comment lines of the file.
fn load_command_lines(args: &[String]) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for arg in args {
        if let Some(path) = arg.strip_prefix('@') {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Could not read command file '{path}'"))?;
            lines.extend(
                text.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.starts_with('#'))
                    .map(str::to_string),
            );
        } else {
            lines.push(arg.clone());
        }
    }
    Ok(lines)
}

fn run(cli: &Cli) -> Result<RunReport> {
    let config = cli.startup.to_config()?;
    let mut session = Session::new(config)?;
    let mut reports = Vec::new();
    let mut failed = 0usize;

    for line in load_command_lines(&cli.commands)? {
        let result = parse_shell_line(&line)
            .and_then(|command| execute_shell_command(&mut session, &command));
        match result {
            Ok(result) => reports.push(CommandReport {
                line,
                ok: true,
                output: result.output,
            }),
            Err(e) => {
                failed += 1;
                warn!(line = %line, error = %e, "Command failed");
                if !cli.keep_going {
                    bail!("Command '{line}' failed: {e}");
                }
                reports.push(CommandReport {
                    line,
                    ok: false,
                    output: serde_json::json!({ "error": e }),
                });
            }
        }
    }

    if let Some(path) = &cli.output {
        session.save_transcript(path)?;
    }
    info!(
        commands = reports.len(),
        failed,
        history_len = session.history_len(),
        "Run finished"
    );
    Ok(RunReport {
        commands: reports,
        failed,
        transcript: session.export_transcript(),
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("{}", about::version_cli_text());
        return Ok(());
    }
    init_logging(&cli.log.to_config().map_err(anyhow::Error::msg)?)?;

    let report = run(&cli)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.transcript);
    }
    if report.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
