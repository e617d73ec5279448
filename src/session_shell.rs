use crate::algebra::OperatorAlgebra;
use crate::session::{ActionOutcome, DEFAULT_SAVE_FILE, ParameterField, Session, UserAction};
use serde_json::{Value, json};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Help,
    Capabilities,
    StateSummary,
    Presets,
    Symbols,
    Show,
    History,
    Select {
        field: ParameterField,
        value: String,
    },
    Pulse {
        target: String,
        phase: Option<String>,
        flip_angle: Option<String>,
    },
    ChemicalShift {
        target: String,
        angle: Option<String>,
    },
    JCoupling {
        target: String,
        angle: Option<String>,
    },
    Undo,
    Clear,
    Save {
        path: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct ShellRunResult {
    pub state_changed: bool,
    pub output: Value,
}

impl ShellCommand {
    pub fn preview(&self) -> String {
        match self {
            Self::Help => "show shell command help".to_string(),
            Self::Capabilities => "inspect session capabilities".to_string(),
            Self::StateSummary => "show history/selection summary".to_string(),
            Self::Presets => "list preset parameter values".to_string(),
            Self::Symbols => "list declared symbols".to_string(),
            Self::Show => "print the transcript".to_string(),
            Self::History => "list applied operations".to_string(),
            Self::Select { field, value } => format!("select {field} '{value}'"),
            Self::Pulse {
                target,
                phase,
                flip_angle,
            } => format!(
                "apply pulse to '{target}' (phase {}, flip angle {})",
                phase.as_deref().unwrap_or("selected"),
                flip_angle.as_deref().unwrap_or("selected")
            ),
            Self::ChemicalShift { target, angle } => format!(
                "apply chemical shift to '{target}' (angle {})",
                angle.as_deref().unwrap_or("selected")
            ),
            Self::JCoupling { target, angle } => format!(
                "apply J-coupling to '{target}' (angle {})",
                angle.as_deref().unwrap_or("selected")
            ),
            Self::Undo => "undo the last operation".to_string(),
            Self::Clear => "return to the initial density operator".to_string(),
            Self::Save { path } => format!(
                "save transcript to '{}'",
                path.as_deref().unwrap_or(DEFAULT_SAVE_FILE)
            ),
        }
    }

    pub fn is_state_mutating(&self) -> bool {
        matches!(
            self,
            Self::Pulse { .. }
                | Self::ChemicalShift { .. }
                | Self::JCoupling { .. }
                | Self::Undo
                | Self::Clear
        )
    }
}

pub fn shell_help_text() -> &'static str {
    "Product operator shell commands:\n\
help\n\
capabilities\n\
state-summary\n\
presets\n\
symbols\n\
show\n\
history\n\
flip EXPR | phase EXPR | cs-angle EXPR | jc-angle EXPR\n\
pulse LABEL [--phase P] [--flip A]\n\
cs LABEL [--angle A]\n\
jc PAIR [--angle A]\n\
undo\n\
clear\n\
save [PATH]\n\
PAIR is LM or L,M; quote expressions containing spaces"
}

fn token_error(command: &str) -> String {
    format!("Invalid '{command}' usage. Try: help")
}

fn field_for_command(cmd: &str) -> Option<ParameterField> {
    match cmd {
        "flip" | "flip-angle" => Some(ParameterField::FlipAngle),
        "phase" => Some(ParameterField::Phase),
        "cs-angle" => Some(ParameterField::CsAngle),
        "jc-angle" => Some(ParameterField::JcAngle),
        _ => None,
    }
}

/// Reads `--name VALUE` options after the positional target.
fn parse_options(
    cmd: &str,
    tokens: &[String],
    allowed: &[&str],
) -> Result<Vec<(String, String)>, String> {
    let mut out = Vec::new();
    let mut idx = 0usize;
    while idx < tokens.len() {
        let name = tokens[idx].as_str();
        if !allowed.contains(&name) {
            return Err(format!("Unknown argument '{name}' for {cmd}"));
        }
        if idx + 1 >= tokens.len() {
            return Err(format!("Missing value after {name}"));
        }
        out.push((name.to_string(), tokens[idx + 1].clone()));
        idx += 2;
    }
    Ok(out)
}

fn option_value(options: &[(String, String)], name: &str) -> Option<String> {
    options
        .iter()
        .rev()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.clone())
}

pub fn parse_shell_tokens(tokens: &[String]) -> Result<ShellCommand, String> {
    if tokens.is_empty() {
        return Err("Missing shell command".to_string());
    }
    let cmd = tokens[0].as_str();
    let no_args = |command: ShellCommand| {
        if tokens.len() == 1 {
            Ok(command)
        } else {
            Err(token_error(cmd))
        }
    };
    match cmd {
        "help" | "-h" | "--help" => Ok(ShellCommand::Help),
        "capabilities" => no_args(ShellCommand::Capabilities),
        "state-summary" => no_args(ShellCommand::StateSummary),
        "presets" => no_args(ShellCommand::Presets),
        "symbols" => no_args(ShellCommand::Symbols),
        "show" => no_args(ShellCommand::Show),
        "history" => no_args(ShellCommand::History),
        "undo" => no_args(ShellCommand::Undo),
        "clear" => no_args(ShellCommand::Clear),
        "save" => match tokens.len() {
            1 => Ok(ShellCommand::Save { path: None }),
            2 => Ok(ShellCommand::Save {
                path: Some(tokens[1].clone()),
            }),
            _ => Err(token_error(cmd)),
        },
        "flip" | "flip-angle" | "phase" | "cs-angle" | "jc-angle" => {
            let value = tokens[1..].join(" ");
            if value.trim().is_empty() {
                return Err(format!("Missing value for {cmd}"));
            }
            let field = field_for_command(cmd).ok_or_else(|| token_error(cmd))?;
            Ok(ShellCommand::Select { field, value })
        }
        "pulse" => {
            if tokens.len() < 2 {
                return Err(token_error(cmd));
            }
            let options = parse_options(cmd, &tokens[2..], &["--phase", "--flip"])?;
            Ok(ShellCommand::Pulse {
                target: tokens[1].clone(),
                phase: option_value(&options, "--phase"),
                flip_angle: option_value(&options, "--flip"),
            })
        }
        "cs" | "jc" => {
            if tokens.len() < 2 {
                return Err(token_error(cmd));
            }
            let options = parse_options(cmd, &tokens[2..], &["--angle"])?;
            let target = tokens[1].clone();
            let angle = option_value(&options, "--angle");
            Ok(if cmd == "cs" {
                ShellCommand::ChemicalShift { target, angle }
            } else {
                ShellCommand::JCoupling { target, angle }
            })
        }
        other => Err(format!("Unknown shell command '{other}'. Try: help")),
    }
}

pub fn parse_shell_line(line: &str) -> Result<ShellCommand, String> {
    let tokens = split_shell_words(line)?;
    parse_shell_tokens(&tokens)
}

/// Splits a command line into words. Single quotes are literal, double
/// quotes allow backslash escapes, and a backslash outside quotes escapes
/// the next character.
pub fn split_shell_words(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut word: Option<String> = None;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Some('\''), '\'') | (Some('"'), '"') => quote = None,
            (Some('\''), c) => word.get_or_insert_with(String::new).push(c),
            (_, '\\') => {
                if let Some(next) = chars.next() {
                    word.get_or_insert_with(String::new).push(next);
                }
            }
            (Some(_), c) => word.get_or_insert_with(String::new).push(c),
            (None, '\'' | '"') => {
                quote = Some(ch);
                word.get_or_insert_with(String::new);
            }
            (None, c) if c.is_whitespace() => {
                if let Some(done) = word.take() {
                    words.push(done);
                }
            }
            (None, c) => word.get_or_insert_with(String::new).push(c),
        }
    }

    if quote.is_some() {
        return Err("Unterminated quoted string in shell command".to_string());
    }
    words.extend(word);
    if words.is_empty() {
        return Err("Empty shell command".to_string());
    }
    Ok(words)
}

fn outcome_output<A: OperatorAlgebra>(session: &Session<A>, outcome: &ActionOutcome) -> Value {
    let mut output = json!({
        "outcome": outcome,
        "history_len": session.history_len(),
        "current_operator": session.current().value(),
    });
    if let ActionOutcome::NothingToUndo = outcome {
        output["message"] = json!("Nothing to undo");
    }
    output
}

pub fn execute_shell_command<A: OperatorAlgebra>(
    session: &mut Session<A>,
    command: &ShellCommand,
) -> Result<ShellRunResult, String> {
    debug!(command = %command.preview(), "Shell command");
    let mut result = match command {
        ShellCommand::Help => ShellRunResult {
            state_changed: false,
            output: json!({ "help": shell_help_text() }),
        },
        ShellCommand::Capabilities => ShellRunResult {
            state_changed: false,
            output: serde_json::to_value(Session::<A>::capabilities())
                .map_err(|e| format!("Could not serialize capabilities: {e}"))?,
        },
        ShellCommand::StateSummary => ShellRunResult {
            state_changed: false,
            output: serde_json::to_value(session.summarize())
                .map_err(|e| format!("Could not serialize state summary: {e}"))?,
        },
        ShellCommand::Presets => {
            let mut output = serde_json::to_value(session.presets())
                .map_err(|e| format!("Could not serialize presets: {e}"))?;
            output["jc_buttons"] = json!(session.presets().jc_pair_labels());
            ShellRunResult {
                state_changed: false,
                output,
            }
        }
        ShellCommand::Symbols => ShellRunResult {
            state_changed: false,
            output: serde_json::to_value(session.symbols().iter().collect::<Vec<_>>())
                .map_err(|e| format!("Could not serialize symbols: {e}"))?,
        },
        ShellCommand::Show => ShellRunResult {
            state_changed: false,
            output: json!({ "transcript": session.transcript() }),
        },
        ShellCommand::History => ShellRunResult {
            state_changed: false,
            output: json!({ "operations": session.operation_log() }),
        },
        ShellCommand::Select { field, value } => {
            let outcome = session
                .handle(UserAction::Select {
                    field: *field,
                    value: value.clone(),
                })
                .map_err(|e| e.to_string())?;
            ShellRunResult {
                state_changed: false,
                output: json!({ "outcome": outcome }),
            }
        }
        ShellCommand::Pulse {
            target,
            phase,
            flip_angle,
        } => {
            let selections = session.selections().clone();
            let phase = phase.as_deref().unwrap_or(&selections.phase);
            let flip_angle = flip_angle.as_deref().unwrap_or(&selections.flip_angle);
            let record = session
                .apply_pulse(target, phase, flip_angle)
                .map_err(|e| e.to_string())?;
            let outcome = ActionOutcome::Applied(record);
            ShellRunResult {
                state_changed: true,
                output: outcome_output(session, &outcome),
            }
        }
        ShellCommand::ChemicalShift { target, angle } => {
            let selections = session.selections().clone();
            let angle = angle.as_deref().unwrap_or(&selections.cs_angle);
            let record = session
                .apply_chemical_shift(target, angle)
                .map_err(|e| e.to_string())?;
            let outcome = ActionOutcome::Applied(record);
            ShellRunResult {
                state_changed: true,
                output: outcome_output(session, &outcome),
            }
        }
        ShellCommand::JCoupling { target, angle } => {
            if !session.presets().has_j_coupling() {
                return Err("J-coupling needs at least two spin labels".to_string());
            }
            let selections = session.selections().clone();
            let angle = angle.as_deref().unwrap_or(&selections.jc_angle);
            let record = session
                .apply_j_coupling(target, angle)
                .map_err(|e| e.to_string())?;
            let outcome = ActionOutcome::Applied(record);
            ShellRunResult {
                state_changed: true,
                output: outcome_output(session, &outcome),
            }
        }
        ShellCommand::Undo => {
            let outcome = session.handle(UserAction::Undo).map_err(|e| e.to_string())?;
            ShellRunResult {
                state_changed: outcome.changes_state(),
                output: outcome_output(session, &outcome),
            }
        }
        ShellCommand::Clear => {
            let outcome = session.handle(UserAction::Clear).map_err(|e| e.to_string())?;
            ShellRunResult {
                state_changed: outcome.changes_state(),
                output: outcome_output(session, &outcome),
            }
        }
        ShellCommand::Save { path } => {
            let path = path.as_deref().unwrap_or(DEFAULT_SAVE_FILE);
            session
                .save_transcript(Path::new(path))
                .map_err(|e| e.to_string())?;
            ShellRunResult {
                state_changed: false,
                output: json!({ "message": format!("Saved transcript to '{path}'") }),
            }
        }
    };
    if command.is_state_mutating() {
        result.output["transcript"] = json!(session.transcript());
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;

    fn session() -> Session {
        Session::new(SessionConfig::default()).unwrap()
    }

    #[test]
    fn parse_pulse_with_options() {
        let cmd = parse_shell_line("pulse I --phase -y --flip 'pi * 3/4'").expect("parse pulse");
        assert_eq!(
            cmd,
            ShellCommand::Pulse {
                target: "I".to_string(),
                phase: Some("-y".to_string()),
                flip_angle: Some("pi * 3/4".to_string()),
            }
        );
        assert!(cmd.is_state_mutating());
    }

    #[test]
    fn parse_selection_keeps_whitespace() {
        let cmd = parse_shell_line("cs-angle oI * t").expect("parse selection");
        assert_eq!(
            cmd,
            ShellCommand::Select {
                field: ParameterField::CsAngle,
                value: "oI * t".to_string(),
            }
        );
    }

    #[test]
    fn parse_rejects_bad_usage() {
        assert!(parse_shell_line("undo now").is_err());
        assert!(parse_shell_line("pulse").is_err());
        assert!(parse_shell_line("pulse I --angle pi").is_err());
        assert!(parse_shell_line("cs I --angle").is_err());
        assert!(parse_shell_line("phase").is_err());
        assert!(parse_shell_line("rotate I").is_err());
        assert!(parse_shell_line("pulse 'I").is_err());
        assert!(parse_shell_line("   ").is_err());
    }

    #[test]
    fn execute_uses_selections_when_options_missing() {
        let mut session = session();
        execute_shell_command(&mut session, &parse_shell_line("phase f").unwrap()).unwrap();
        let out = execute_shell_command(&mut session, &parse_shell_line("pulse S").unwrap())
            .expect("apply pulse");
        assert!(out.state_changed);
        assert_eq!(out.output["history_len"], json!(2));
        assert_eq!(
            session.operation_log()[0].request.describe(),
            "pulse on S, phase angle f, flip angle pi/2"
        );
    }

    #[test]
    fn execute_undo_at_initial_reports_message() {
        let mut session = session();
        let out = execute_shell_command(&mut session, &ShellCommand::Undo).unwrap();
        assert!(!out.state_changed);
        assert_eq!(out.output["message"], json!("Nothing to undo"));
    }

    #[test]
    fn execute_failed_operation_returns_error_text() {
        let mut session = session();
        let err = execute_shell_command(&mut session, &parse_shell_line("jc SI").unwrap())
            .unwrap_err();
        assert!(err.starts_with("InvalidTarget"));
        assert_eq!(session.history_len(), 1);
    }

    #[test]
    fn execute_show_and_save() {
        let mut session = session();
        execute_shell_command(&mut session, &parse_shell_line("cs I --angle oI*t").unwrap())
            .unwrap();
        let out = execute_shell_command(&mut session, &ShellCommand::Show).unwrap();
        assert_eq!(out.output["transcript"], json!(session.transcript()));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.txt");
        let line = format!("save '{}'", path.display());
        execute_shell_command(&mut session, &parse_shell_line(&line).unwrap()).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            session.export_transcript()
        );
    }

    #[test]
    fn split_words_handles_quotes_and_escapes() {
        assert_eq!(
            split_shell_words(r#"pulse I --flip "pi * 3/4" --phase 'f'"#).unwrap(),
            vec!["pulse", "I", "--flip", "pi * 3/4", "--phase", "f"]
        );
        assert_eq!(
            split_shell_words(r#"save my\ run.txt"#).unwrap(),
            vec!["save", "my run.txt"]
        );
        assert_eq!(split_shell_words("save ''").unwrap(), vec!["save", ""]);
        assert!(split_shell_words("phase \"x").is_err());
    }

    #[test]
    fn presets_list_coupling_buttons() {
        let mut session = session();
        let out = execute_shell_command(&mut session, &ShellCommand::Presets).unwrap();
        assert_eq!(out.output["jc_buttons"], json!(["IS"]));
    }

    #[test]
    fn coupling_needs_two_spins() {
        let config = SessionConfig::new(Default::default(), vec!["H".to_string()]);
        let mut session = Session::new(config).unwrap();
        let err = execute_shell_command(&mut session, &parse_shell_line("jc HH").unwrap())
            .unwrap_err();
        assert_eq!(err, "J-coupling needs at least two spin labels");
        let out = execute_shell_command(&mut session, &ShellCommand::Presets).unwrap();
        assert_eq!(out.output["jc_buttons"], json!([]));
    }

    #[test]
    fn mutating_commands_return_transcript() {
        let mut session = session();
        for line in ["pulse I", "undo", "cs S", "clear"] {
            let cmd = parse_shell_line(line).unwrap();
            assert!(cmd.is_state_mutating());
            let out = execute_shell_command(&mut session, &cmd).unwrap();
            assert_eq!(out.output["transcript"], json!(session.transcript()), "{line}");
        }
        let out = execute_shell_command(&mut session, &ShellCommand::History).unwrap();
        assert!(out.output.get("transcript").is_none());
        assert_eq!(
            parse_shell_line("cs S").unwrap().preview(),
            "apply chemical shift to 'S' (angle selected)"
        );
    }
}
