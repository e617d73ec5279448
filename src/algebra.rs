//! Boundary to the operator algebra that actually transforms density
//! operators.
//!
//! The session only relies on the contract of [`OperatorAlgebra`]: a new
//! state's log always starts with the log of the state it was derived from.
//! [`SymbolicAlgebra`] is the algebra shipped with the crate. It evaluates
//! and canonicalises every expression against the session's symbol table
//! and records each transformation as a symbolic propagator, without
//! carrying out the rotation itself.

use crate::command::OperationRequest;
use crate::config::Simplification;
use crate::error::SessionError;
use crate::expression::{Expr, parse_expression};
use crate::symbols::{RESERVED_CONSTANT, SymbolKind, SymbolTable};
use serde::{Deserialize, Serialize};

/// Separator the shipped algebra puts between derivation steps.
pub const LOG_LINE_SEPARATOR: char = '\n';

/// Immutable density-operator snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorState {
    value: String,
    log: String,
}

impl OperatorState {
    pub fn new(value: impl Into<String>, log: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            log: log.into(),
        }
    }

    /// The operator itself, in the algebra's own notation.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Cumulative derivation log.
    pub fn log(&self) -> &str {
        &self.log
    }
}

pub struct AlgebraContext<'a> {
    pub symbols: &'a SymbolTable,
    pub simplification: Simplification,
}

pub trait OperatorAlgebra {
    fn initial(&self, text: &str, ctx: &AlgebraContext) -> Result<OperatorState, SessionError>;

    fn apply(
        &self,
        state: &OperatorState,
        request: &OperationRequest,
        ctx: &AlgebraContext,
    ) -> Result<OperatorState, SessionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Operator,
    Scalar,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolicAlgebra;

impl SymbolicAlgebra {
    pub fn new() -> Self {
        Self
    }

    fn evaluate(
        &self,
        text: &str,
        role: Role,
        what: &str,
        symbols: &SymbolTable,
    ) -> Result<Expr, SessionError> {
        let expr = parse_expression(text)
            .map_err(|e| SessionError::algebra(format!("Could not evaluate {what} '{text}': {e}")))?;
        for name in expr.identifiers() {
            if name == RESERVED_CONSTANT {
                continue;
            }
            match symbols.kind_of(name) {
                Some(SymbolKind::Parameter) => {}
                Some(SymbolKind::Operator) if role == Role::Operator => {}
                Some(SymbolKind::Operator) => {
                    return Err(SessionError::algebra(format!(
                        "Spin operator '{name}' cannot appear in {what} '{text}'"
                    )));
                }
                Some(SymbolKind::Function) => {
                    return Err(SessionError::algebra(format!(
                        "Function '{name}' is used without arguments in {what} '{text}'"
                    )));
                }
                None => {
                    return Err(SessionError::algebra(format!(
                        "Undeclared symbol '{name}' in {what} '{text}'"
                    )));
                }
            }
        }
        for name in expr.function_names() {
            if symbols.kind_of(name) != Some(SymbolKind::Function) {
                return Err(SessionError::algebra(format!(
                    "'{name}' is not a known function in {what} '{text}'"
                )));
            }
        }
        Ok(expr)
    }

    fn scalar(&self, text: &str, what: &str, symbols: &SymbolTable) -> Result<Expr, SessionError> {
        self.evaluate(text, Role::Scalar, what, symbols)
    }

    /// Propagator notation and step description for one request.
    fn step(
        &self,
        request: &OperationRequest,
        symbols: &SymbolTable,
    ) -> Result<(String, String), SessionError> {
        Ok(match request {
            OperationRequest::Pulse {
                spin,
                phase,
                flip_angle,
            } => {
                let flip = self.scalar(flip_angle, "flip angle", symbols)?;
                (
                    format!("P_{spin}[{phase}, {flip}]"),
                    format!("Pulse on {spin}, phase {phase}, flip angle {flip}"),
                )
            }
            OperationRequest::PulsePhaseShift {
                spin,
                phase,
                flip_angle,
            } => {
                let phase = self.scalar(phase, "pulse phase", symbols)?;
                let flip = self.scalar(flip_angle, "flip angle", symbols)?;
                (
                    format!("P_{spin}[{phase}, {flip}]"),
                    format!("Pulse on {spin}, phase angle {phase}, flip angle {flip}"),
                )
            }
            OperationRequest::ChemicalShift { spin, angle } => {
                let angle = self.scalar(angle, "chemical shift angle", symbols)?;
                (
                    format!("CS_{spin}[{angle}]"),
                    format!("Chemical shift on {spin}, angle {angle}"),
                )
            }
            OperationRequest::JCoupling {
                first,
                second,
                angle,
            } => {
                let angle = self.scalar(angle, "J-coupling angle", symbols)?;
                (
                    format!("JC_{first}{second}[{angle}]"),
                    format!("J-coupling on {first}{second}, angle {angle}"),
                )
            }
        })
    }
}

impl OperatorAlgebra for SymbolicAlgebra {
    fn initial(&self, text: &str, ctx: &AlgebraContext) -> Result<OperatorState, SessionError> {
        let expr = self.evaluate(text, Role::Operator, "initial operator", ctx.symbols)?;
        let canonical = expr.to_string();
        Ok(OperatorState::new(canonical.clone(), canonical))
    }

    fn apply(
        &self,
        state: &OperatorState,
        request: &OperationRequest,
        ctx: &AlgebraContext,
    ) -> Result<OperatorState, SessionError> {
        let (propagator, description) = self.step(request, ctx.symbols)?;
        let value = format!("{propagator}({})", state.value());
        let log = format!(
            "{}{LOG_LINE_SEPARATOR}{description} => {value}",
            state.log()
        );
        Ok(OperatorState::new(value, log))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::QuadraturePhase;
    use crate::error::ErrorCode;

    fn table() -> SymbolTable {
        let mut symbols = SymbolTable::for_spin_labels(&["I".to_string(), "S".to_string()]);
        symbols.resolve("oI*t");
        symbols.resolve("f");
        symbols
    }

    fn ctx(symbols: &SymbolTable) -> AlgebraContext<'_> {
        AlgebraContext {
            symbols,
            simplification: Simplification::Simplify,
        }
    }

    #[test]
    fn test_initial_state_is_canonical_text() {
        let symbols = table();
        let state = SymbolicAlgebra.initial("Iz+Sz", &ctx(&symbols)).unwrap();
        assert_eq!(state.log(), "Iz + Sz");
        assert_eq!(state.value(), "Iz + Sz");
    }

    #[test]
    fn test_pulse_appends_one_line() {
        let symbols = table();
        let initial = SymbolicAlgebra.initial("Iz + Sz", &ctx(&symbols)).unwrap();
        let next = SymbolicAlgebra
            .apply(
                &initial,
                &OperationRequest::Pulse {
                    spin: "I".into(),
                    phase: QuadraturePhase::X,
                    flip_angle: "pi / 2".into(),
                },
                &ctx(&symbols),
            )
            .unwrap();
        assert!(next.log().starts_with(initial.log()));
        let suffix = &next.log()[initial.log().len()..];
        assert_eq!(
            suffix,
            "\nPulse on I, phase x, flip angle pi/2 => P_I[x, pi/2](Iz + Sz)"
        );
        assert_eq!(suffix.matches('\n').count(), 1);
    }

    #[test]
    fn test_undeclared_symbol_is_evaluation_error() {
        let symbols = table();
        let initial = SymbolicAlgebra.initial("Iz", &ctx(&symbols)).unwrap();
        let err = SymbolicAlgebra
            .apply(
                &initial,
                &OperationRequest::ChemicalShift {
                    spin: "I".into(),
                    angle: "w*t".into(),
                },
                &ctx(&symbols),
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AlgebraEvaluation);
        assert!(err.message.contains("'w'"));
    }

    #[test]
    fn test_malformed_and_misused_expressions_fail() {
        let symbols = table();
        let initial = SymbolicAlgebra.initial("Iz", &ctx(&symbols)).unwrap();
        for angle in ["pi/", "Iz*t", "cos", "oI(t)", "(t"] {
            let err = SymbolicAlgebra
                .apply(
                    &initial,
                    &OperationRequest::JCoupling {
                        first: "I".into(),
                        second: "S".into(),
                        angle: angle.into(),
                    },
                    &ctx(&symbols),
                )
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::AlgebraEvaluation, "{angle}");
        }
        assert!(SymbolicAlgebra.initial("Iz +", &ctx(&symbols)).is_err());
        assert!(SymbolicAlgebra.initial("Kz", &ctx(&symbols)).is_err());
    }

    #[test]
    fn test_arbitrary_phase_is_evaluated() {
        let symbols = table();
        let initial = SymbolicAlgebra.initial("cos(t)*Iz", &ctx(&symbols)).unwrap();
        let next = SymbolicAlgebra
            .apply(
                &initial,
                &OperationRequest::PulsePhaseShift {
                    spin: "S".into(),
                    phase: "f+pi/4".into(),
                    flip_angle: "pi".into(),
                },
                &ctx(&symbols),
            )
            .unwrap();
        assert_eq!(next.value(), "P_S[f + pi/4, pi](cos(t)*Iz)");
    }
}
