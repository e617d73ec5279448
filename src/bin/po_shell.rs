//! Interactive product operator shell.

use clap::Parser;
use po_session::about;
use po_session::config::StartupArgs;
use po_session::logging::{LogArgs, init_logging};
use po_session::session::Session;
use po_session::session_shell::{
    ShellCommand, ShellRunResult, execute_shell_command, parse_shell_line, shell_help_text,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::error::Error;

#[derive(Parser)]
#[command(
    name = "po_shell",
    about = "Build product operator derivations one pulse, shift or coupling at a time"
)]
struct Cli {
    #[command(flatten)]
    startup: StartupArgs,

    #[command(flatten)]
    log: LogArgs,

    /// Print every result as JSON instead of the transcript.
    #[arg(long)]
    json: bool,

    /// Print version and build number.
    #[arg(long = "version", short = 'V')]
    version: bool,
}

fn print_result(command: &ShellCommand, result: &ShellRunResult, session: &Session, json: bool) {
    if !json {
        match command {
            ShellCommand::Help => {
                println!("{}", shell_help_text());
                return;
            }
            ShellCommand::Show => {
                println!("{}", session.transcript());
                return;
            }
            _ if result.state_changed => {
                println!("{}", session.transcript());
                return;
            }
            _ => {}
        }
    }
    match serde_json::to_string_pretty(&result.output) {
        Ok(text) => println!("{text}"),
        Err(e) => println!("Error: {e}"),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    if cli.version {
        println!("{}", about::version_cli_text());
        return Ok(());
    }
    init_logging(&cli.log.to_config()?)?;

    let mut session = Session::new(cli.startup.to_config()?)?;
    let mut rl = DefaultEditor::new()?;

    println!("{}", shell_help_text());
    println!();
    println!("{}", session.transcript());

    loop {
        match rl.readline("PO> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed == "exit" || trimmed == "quit" {
                    break;
                }
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(line.as_str())?;

                let result = parse_shell_line(trimmed).and_then(|command| {
                    execute_shell_command(&mut session, &command).map(|r| (command, r))
                });
                match result {
                    Ok((command, result)) => print_result(&command, &result, &session, cli.json),
                    Err(e) => println!("Error: {e}"),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {err}");
            }
        }
    }

    Ok(())
}
