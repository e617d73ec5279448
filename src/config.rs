use crate::error::SessionError;
use crate::expression::is_identifier;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, path::Path, str::FromStr};

pub const DEFAULT_SPIN_LABELS: &str = "I,S";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Simplification {
    #[default]
    #[serde(rename = "simplify")]
    Simplify,
    #[serde(rename = "TR8")]
    Tr8,
    #[serde(rename = "fu")]
    Fu,
}

impl Simplification {
    pub const ALL: [Simplification; 3] = [Self::Simplify, Self::Tr8, Self::Fu];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simplify => "simplify",
            Self::Tr8 => "TR8",
            Self::Fu => "fu",
        }
    }
}

impl fmt::Display for Simplification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Simplification {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::default());
        }
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                SessionError::invalid_config(format!(
                    "Unknown simplification '{s}', expected one of: {}",
                    Self::ALL.iter().join(", ")
                ))
            })
    }
}

/// Splits comma separated spin labels, dropping all spaces.
pub fn parse_spin_labels(text: &str) -> Vec<String> {
    let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let text = if text.is_empty() {
        DEFAULT_SPIN_LABELS.to_string()
    } else {
        text
    };
    text.split(',').map(|s| s.to_string()).collect()
}

/// Sum of the longitudinal operators, e.g. `Iz + Sz` for labels `I,S`.
pub fn default_initial_operator(labels: &[String]) -> String {
    labels.iter().map(|l| format!("{l}z")).join(" + ")
}

/// Startup configuration of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub simplification: Simplification,
    pub spin_labels: Vec<String>,
    /// Initial density operator text; empty means the label default.
    pub initial_operator: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            simplification: Simplification::default(),
            spin_labels: parse_spin_labels(DEFAULT_SPIN_LABELS),
            initial_operator: String::new(),
        }
    }
}

impl SessionConfig {
    pub fn new(simplification: Simplification, spin_labels: Vec<String>) -> Self {
        Self {
            simplification,
            spin_labels,
            initial_operator: String::new(),
        }
    }

    pub fn with_initial_operator(mut self, text: impl Into<String>) -> Self {
        self.initial_operator = text.into();
        self
    }

    pub fn load_from_path(path: &Path) -> Result<Self, SessionError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SessionError::new(
                crate::error::ErrorCode::Io,
                format!("Could not read config file '{}': {e}", path.display()),
            )
        })?;
        serde_json::from_str(&text).map_err(|e| {
            SessionError::invalid_config(format!(
                "Could not parse config file '{}': {e}",
                path.display()
            ))
        })
    }

    pub fn resolved_initial_operator(&self) -> String {
        let text = self.initial_operator.trim();
        if text.is_empty() {
            default_initial_operator(&self.spin_labels)
        } else {
            text.to_string()
        }
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.spin_labels.is_empty() {
            return Err(SessionError::invalid_config("At least one spin label is required"));
        }
        let mut seen = HashSet::new();
        for label in &self.spin_labels {
            if !is_identifier(label) {
                return Err(SessionError::invalid_config(format!(
                    "Spin label '{label}' is not a valid name"
                )));
            }
            if !seen.insert(label.as_str()) {
                return Err(SessionError::invalid_config(format!(
                    "Spin label '{label}' is listed more than once"
                )));
            }
        }
        Ok(())
    }
}

/// Startup flags shared by the binaries. Flags win over a config file.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct StartupArgs {
    /// JSON file with `simplification`, `spin_labels` and `initial_operator`.
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<std::path::PathBuf>,

    /// Simplification method (simplify, TR8, fu).
    #[arg(long = "simplification", short = 's', value_name = "METHOD")]
    pub simplification: Option<String>,

    /// Spin labels separated by commas, e.g. "I,S".
    #[arg(long = "labels", short = 'l', value_name = "LABELS")]
    pub labels: Option<String>,

    /// Initial density operator (default: sum of the z operators).
    #[arg(long = "initial", short = 'i', value_name = "EXPR")]
    pub initial_operator: Option<String>,
}

impl StartupArgs {
    pub fn to_config(&self) -> Result<SessionConfig, SessionError> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::load_from_path(path)?,
            None => SessionConfig::default(),
        };
        if let Some(mode) = &self.simplification {
            config.simplification = mode.parse()?;
        }
        if let Some(labels) = &self.labels {
            config.spin_labels = parse_spin_labels(labels);
        }
        if let Some(initial) = &self.initial_operator {
            config.initial_operator = initial.clone();
        }
        config.validate()?;
        Ok(config)
    }
}
