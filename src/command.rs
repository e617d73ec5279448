//! Turns button/typed input into validated operation requests.

use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Pulse,
    ChemicalShift,
    JCoupling,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pulse => "pulse",
            Self::ChemicalShift => "chemical shift",
            Self::JCoupling => "J-coupling",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    Spin(String),
    Pair(String, String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spin(label) => write!(f, "{label}"),
            Self::Pair(a, b) => write!(f, "{a}{b}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuadraturePhase {
    X,
    Y,
    MinusX,
    MinusY,
}

impl QuadraturePhase {
    pub const ALL: [QuadraturePhase; 4] = [Self::X, Self::Y, Self::MinusX, Self::MinusY];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::MinusX => "-x",
            Self::MinusY => "-y",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL.into_iter().find(|p| p.as_str() == text)
    }
}

impl fmt::Display for QuadraturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transformation, ready to be handed to the operator algebra.
/// Expression fields hold trimmed user text; they are evaluated by the
/// algebra, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OperationRequest {
    Pulse {
        spin: String,
        phase: QuadraturePhase,
        flip_angle: String,
    },
    PulsePhaseShift {
        spin: String,
        phase: String,
        flip_angle: String,
    },
    ChemicalShift {
        spin: String,
        angle: String,
    },
    JCoupling {
        first: String,
        second: String,
        angle: String,
    },
}

impl OperationRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Pulse { .. } | Self::PulsePhaseShift { .. } => OperationKind::Pulse,
            Self::ChemicalShift { .. } => OperationKind::ChemicalShift,
            Self::JCoupling { .. } => OperationKind::JCoupling,
        }
    }

    pub fn target(&self) -> Target {
        match self {
            Self::Pulse { spin, .. }
            | Self::PulsePhaseShift { spin, .. }
            | Self::ChemicalShift { spin, .. } => Target::Spin(spin.clone()),
            Self::JCoupling { first, second, .. } => Target::Pair(first.clone(), second.clone()),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Pulse {
                spin,
                phase,
                flip_angle,
            } => format!("pulse on {spin}, phase {phase}, flip angle {flip_angle}"),
            Self::PulsePhaseShift {
                spin,
                phase,
                flip_angle,
            } => format!("pulse on {spin}, phase angle {phase}, flip angle {flip_angle}"),
            Self::ChemicalShift { spin, angle } => {
                format!("chemical shift on {spin}, angle {angle}")
            }
            Self::JCoupling {
                first,
                second,
                angle,
            } => format!("J-coupling on {first}{second}, angle {angle}"),
        }
    }
}

pub struct CommandBuilder<'a> {
    spin_labels: &'a [String],
}

fn require_expression(text: &str, what: &str) -> Result<String, SessionError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SessionError::invalid_expression(format!("Missing {what}")));
    }
    Ok(text.to_string())
}

impl<'a> CommandBuilder<'a> {
    pub fn new(spin_labels: &'a [String]) -> Self {
        Self { spin_labels }
    }

    fn label_index(&self, label: &str) -> Option<usize> {
        self.spin_labels.iter().position(|l| l == label)
    }

    fn validate_spin(&self, label: &str) -> Result<(), SessionError> {
        match self.label_index(label) {
            Some(_) => Ok(()),
            None => Err(SessionError::invalid_target(format!(
                "Unknown spin label '{label}', expected one of: {}",
                self.spin_labels.join(", ")
            ))),
        }
    }

    fn validate_pair(&self, first: &str, second: &str) -> Result<(), SessionError> {
        let (Some(i), Some(j)) = (self.label_index(first), self.label_index(second)) else {
            return Err(SessionError::invalid_target(format!(
                "Unknown spin pair '{first}{second}', expected labels from: {}",
                self.spin_labels.join(", ")
            )));
        };
        if j <= i {
            return Err(SessionError::invalid_target(format!(
                "J-coupling pair '{first}{second}' must name two distinct labels in configured order ({})",
                self.spin_labels.join(", ")
            )));
        }
        Ok(())
    }

    /// Reads a target as typed on a button: a single label for pulses and
    /// chemical shifts, `LM` or `L,M` for J-coupling.
    pub fn parse_target(&self, kind: OperationKind, text: &str) -> Result<Target, SessionError> {
        let text = text.trim();
        if kind != OperationKind::JCoupling {
            self.validate_spin(text)?;
            return Ok(Target::Spin(text.to_string()));
        }
        if let Some((a, b)) = text.split_once(',') {
            return Ok(Target::Pair(a.trim().to_string(), b.trim().to_string()));
        }
        // A split in configured order wins over a reversed one.
        let mut fallback = None;
        for (i, a) in self.spin_labels.iter().enumerate() {
            for (j, b) in self.spin_labels.iter().enumerate() {
                if i == j || a.len() + b.len() != text.len() {
                    continue;
                }
                if text.starts_with(a.as_str()) && text.ends_with(b.as_str()) {
                    let pair = Target::Pair(a.clone(), b.clone());
                    if j > i {
                        return Ok(pair);
                    }
                    fallback.get_or_insert(pair);
                }
            }
        }
        fallback.ok_or_else(|| {
            SessionError::invalid_target(format!(
                "'{text}' is not a pair of configured spin labels"
            ))
        })
    }

    /// Builds a request. `params` holds exactly one angle expression; a
    /// pulse additionally needs `phase`. The phase selects the quadrature
    /// shape for x, y, -x and -y and the arbitrary-phase shape otherwise.
    pub fn build(
        &self,
        kind: OperationKind,
        target: &Target,
        params: &[String],
        phase: Option<&str>,
    ) -> Result<OperationRequest, SessionError> {
        let [angle] = params else {
            return Err(SessionError::invalid_expression(format!(
                "A {kind} takes exactly one angle expression, got {}",
                params.len()
            )));
        };

        match (kind, target) {
            (OperationKind::Pulse, Target::Spin(spin)) => {
                self.validate_spin(spin)?;
                let flip_angle = require_expression(angle, "flip angle")?;
                let phase = require_expression(phase.unwrap_or_default(), "pulse phase")?;
                Ok(match QuadraturePhase::parse(&phase) {
                    Some(phase) => OperationRequest::Pulse {
                        spin: spin.clone(),
                        phase,
                        flip_angle,
                    },
                    None => OperationRequest::PulsePhaseShift {
                        spin: spin.clone(),
                        phase,
                        flip_angle,
                    },
                })
            }
            (OperationKind::ChemicalShift, Target::Spin(spin)) => {
                self.validate_spin(spin)?;
                Ok(OperationRequest::ChemicalShift {
                    spin: spin.clone(),
                    angle: require_expression(angle, "chemical shift angle")?,
                })
            }
            (OperationKind::JCoupling, Target::Pair(first, second)) => {
                self.validate_pair(first, second)?;
                Ok(OperationRequest::JCoupling {
                    first: first.clone(),
                    second: second.clone(),
                    angle: require_expression(angle, "J-coupling angle")?,
                })
            }
            (OperationKind::JCoupling, Target::Spin(spin)) => Err(SessionError::invalid_target(
                format!("J-coupling needs a spin pair, got '{spin}'"),
            )),
            (kind, Target::Pair(a, b)) => Err(SessionError::invalid_target(format!(
                "A {kind} applies to a single spin, got pair '{a}{b}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn params(angle: &str) -> Vec<String> {
        vec![angle.to_string()]
    }

    #[test]
    fn test_quadrature_phase_builds_pulse() {
        let labels = labels(&["I", "S"]);
        let builder = CommandBuilder::new(&labels);
        let req = builder
            .build(
                OperationKind::Pulse,
                &Target::Spin("I".into()),
                &params(" pi/2 "),
                Some("-y"),
            )
            .unwrap();
        assert_eq!(
            req,
            OperationRequest::Pulse {
                spin: "I".into(),
                phase: QuadraturePhase::MinusY,
                flip_angle: "pi/2".into(),
            }
        );
    }

    #[test]
    fn test_other_phase_builds_phase_shift_pulse() {
        let labels = labels(&["I", "S"]);
        let builder = CommandBuilder::new(&labels);
        let req = builder
            .build(OperationKind::Pulse, &Target::Spin("S".into()), &params("b"), Some("f"))
            .unwrap();
        assert!(matches!(
            req,
            OperationRequest::PulsePhaseShift { ref phase, .. } if phase == "f"
        ));
        assert_eq!(req.kind(), OperationKind::Pulse);
    }

    #[test]
    fn test_unknown_spin_is_invalid_target() {
        let labels = labels(&["I", "S"]);
        let builder = CommandBuilder::new(&labels);
        let err = builder
            .build(
                OperationKind::ChemicalShift,
                &Target::Spin("K".into()),
                &params("q"),
                None,
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTarget);
    }

    #[test]
    fn test_empty_expression_is_invalid_expression() {
        let labels = labels(&["I", "S"]);
        let builder = CommandBuilder::new(&labels);
        let err = builder
            .build(OperationKind::ChemicalShift, &Target::Spin("I".into()), &params("  "), None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidExpression);

        let err = builder
            .build(OperationKind::Pulse, &Target::Spin("I".into()), &params("pi"), None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidExpression);

        let err = builder
            .build(OperationKind::ChemicalShift, &Target::Spin("I".into()), &[], None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidExpression);
    }

    #[test]
    fn test_j_coupling_pair_must_follow_label_order() {
        let labels = labels(&["I", "S"]);
        let builder = CommandBuilder::new(&labels);
        let ok = builder.build(
            OperationKind::JCoupling,
            &Target::Pair("I".into(), "S".into()),
            &params("pi/2"),
            None,
        );
        assert!(ok.is_ok());

        for (a, b) in [("S", "I"), ("I", "I"), ("I", "K")] {
            let err = builder
                .build(
                    OperationKind::JCoupling,
                    &Target::Pair(a.into(), b.into()),
                    &params("pi/2"),
                    None,
                )
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidTarget, "{a}{b}");
        }
    }

    #[test]
    fn test_target_shape_must_match_kind() {
        let labels = labels(&["I", "S"]);
        let builder = CommandBuilder::new(&labels);
        let err = builder
            .build(OperationKind::JCoupling, &Target::Spin("I".into()), &params("pi"), None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTarget);
        let err = builder
            .build(
                OperationKind::Pulse,
                &Target::Pair("I".into(), "S".into()),
                &params("pi"),
                Some("x"),
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTarget);
    }

    #[test]
    fn test_parse_pair_targets() {
        let labels = labels(&["H1", "C2", "N"]);
        let builder = CommandBuilder::new(&labels);
        assert_eq!(
            builder.parse_target(OperationKind::JCoupling, "H1C2").unwrap(),
            Target::Pair("H1".into(), "C2".into())
        );
        assert_eq!(
            builder.parse_target(OperationKind::JCoupling, "C2, N").unwrap(),
            Target::Pair("C2".into(), "N".into())
        );
        // Reversed pairs still parse; ordering is checked when building.
        assert_eq!(
            builder.parse_target(OperationKind::JCoupling, "NH1").unwrap(),
            Target::Pair("N".into(), "H1".into())
        );
        assert!(builder.parse_target(OperationKind::JCoupling, "H1").is_err());
        assert!(builder.parse_target(OperationKind::Pulse, "X").is_err());
        assert_eq!(
            builder.parse_target(OperationKind::Pulse, " C2 ").unwrap(),
            Target::Spin("C2".into())
        );
    }
}
