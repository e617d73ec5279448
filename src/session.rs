//! One interactive derivation: symbol resolution, request building, the
//! operator history and the transcript, driven one user action at a time.
//!
//! Every action either commits completely or leaves history, journal and
//! transcript untouched. Symbols declared while resolving a failed action
//! stay declared; the symbol table only ever grows.

use crate::algebra::{AlgebraContext, OperatorAlgebra, OperatorState, SymbolicAlgebra};
use crate::command::{CommandBuilder, OperationKind, OperationRequest, QuadraturePhase, Target};
use crate::config::{SessionConfig, Simplification};
use crate::error::{ErrorCode, SessionError};
use crate::history::OperatorHistory;
use crate::presets::{self, Presets};
use crate::symbols::SymbolTable;
use crate::transcript::{LogDiffTracker, render_chain, transcript_header};
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::Path, rc::Rc};
use tracing::{debug, info, warn};

pub const DEFAULT_SAVE_FILE: &str = "PO_Result.txt";

pub type OpId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterField {
    FlipAngle,
    Phase,
    CsAngle,
    JcAngle,
}

impl ParameterField {
    pub const ALL: [ParameterField; 4] = [Self::FlipAngle, Self::Phase, Self::CsAngle, Self::JcAngle];

    pub fn name(&self) -> &'static str {
        match self {
            Self::FlipAngle => "flip angle",
            Self::Phase => "phase",
            Self::CsAngle => "chemical shift angle",
            Self::JcAngle => "J-coupling angle",
        }
    }
}

impl fmt::Display for ParameterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Currently selected value of each parameter field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelSelections {
    pub flip_angle: String,
    pub phase: String,
    pub cs_angle: String,
    pub jc_angle: String,
}

impl Default for PanelSelections {
    fn default() -> Self {
        Self {
            flip_angle: presets::DEFAULT_FLIP_ANGLE.to_string(),
            phase: presets::DEFAULT_PHASE.to_string(),
            cs_angle: presets::DEFAULT_CS_ANGLE.to_string(),
            jc_angle: presets::DEFAULT_JC_ANGLE.to_string(),
        }
    }
}

impl PanelSelections {
    pub fn get(&self, field: ParameterField) -> &str {
        match field {
            ParameterField::FlipAngle => &self.flip_angle,
            ParameterField::Phase => &self.phase,
            ParameterField::CsAngle => &self.cs_angle,
            ParameterField::JcAngle => &self.jc_angle,
        }
    }

    fn slot(&mut self, field: ParameterField) -> &mut String {
        match field {
            ParameterField::FlipAngle => &mut self.flip_angle,
            ParameterField::Phase => &mut self.phase,
            ParameterField::CsAngle => &mut self.cs_angle,
            ParameterField::JcAngle => &mut self.jc_angle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub op_id: OpId,
    pub request: OperationRequest,
    /// Parameters first declared by this operation's expressions.
    pub declared_symbols: Vec<String>,
    /// Text appended to the transcript, separator included.
    pub appended: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserAction {
    Select { field: ParameterField, value: String },
    ApplyPulse { target: String },
    ApplyChemicalShift { target: String },
    ApplyJCoupling { target: String },
    Undo,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    Selected { field: ParameterField, value: String },
    Applied(OperationRecord),
    /// The operation that was taken back.
    Undone(OperationRecord),
    /// Undo at the initial state; nothing changed.
    NothingToUndo,
    Cleared { removed: usize },
}

impl ActionOutcome {
    pub fn changes_state(&self) -> bool {
        match self {
            Self::Applied(_) | Self::Undone(_) => true,
            Self::Cleared { removed } => *removed > 0,
            Self::Selected { .. } | Self::NothingToUndo => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    pub protocol_version: String,
    pub supported_operations: Vec<String>,
    pub quadrature_phases: Vec<String>,
    pub simplification_modes: Vec<String>,
    pub export_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub simplification: Simplification,
    pub spin_labels: Vec<String>,
    pub history_len: usize,
    pub current_operator: String,
    pub parameters: Vec<String>,
    pub selections: PanelSelections,
    pub operations: Vec<OperationRecord>,
}

pub struct Session<A: OperatorAlgebra = SymbolicAlgebra> {
    config: SessionConfig,
    presets: Presets,
    algebra: A,
    symbols: SymbolTable,
    history: OperatorHistory,
    journal: Vec<OperationRecord>,
    tracker: LogDiffTracker,
    selections: PanelSelections,
    op_counter: u64,
}

impl Session<SymbolicAlgebra> {
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        Self::with_algebra(config, SymbolicAlgebra)
    }
}

impl<A: OperatorAlgebra> Session<A> {
    pub fn with_algebra(config: SessionConfig, algebra: A) -> Result<Self, SessionError> {
        config.validate()?;
        let mut symbols = SymbolTable::for_spin_labels(&config.spin_labels);
        let initial_text = config.resolved_initial_operator();
        let declared = symbols.resolve(&initial_text);
        let initial = algebra.initial(
            &initial_text,
            &AlgebraContext {
                symbols: &symbols,
                simplification: config.simplification,
            },
        )?;
        info!(
            simplification = %config.simplification,
            labels = %config.spin_labels.join(","),
            initial = initial.log(),
            declared = ?declared,
            "Session started"
        );
        let tracker = LogDiffTracker::new(transcript_header(config.simplification), initial.log());
        Ok(Self {
            presets: Presets::for_labels(&config.spin_labels),
            history: OperatorHistory::new(initial),
            config,
            algebra,
            symbols,
            journal: Vec::new(),
            tracker,
            selections: PanelSelections::default(),
            op_counter: 0,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn simplification(&self) -> Simplification {
        self.config.simplification
    }

    pub fn spin_labels(&self) -> &[String] {
        &self.config.spin_labels
    }

    pub fn presets(&self) -> &Presets {
        &self.presets
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn history(&self) -> &OperatorHistory {
        &self.history
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn current(&self) -> &OperatorState {
        self.history.current()
    }

    pub fn operation_log(&self) -> &[OperationRecord] {
        &self.journal
    }

    pub fn selections(&self) -> &PanelSelections {
        &self.selections
    }

    /// Displayed text: header plus the incrementally maintained transcript.
    pub fn transcript(&self) -> String {
        self.tracker.text()
    }

    /// The transcript rendered from scratch out of the surviving history.
    /// Always equal to [`Session::transcript`].
    pub fn rebuilt_transcript(&self) -> Result<String, SessionError> {
        Ok(format!(
            "{}{}",
            self.tracker.header(),
            render_chain(self.history.logs())?
        ))
    }

    /// Text written by [`Session::save_transcript`].
    pub fn export_transcript(&self) -> String {
        self.tracker.text()
    }

    pub fn save_transcript(&self, path: &Path) -> Result<(), SessionError> {
        fs::write(path, self.export_transcript()).map_err(|e| {
            SessionError::new(
                ErrorCode::Io,
                format!("Could not write transcript '{}': {e}", path.display()),
            )
        })?;
        info!(path = %path.display(), operations = self.journal.len(), "Transcript saved");
        Ok(())
    }

    pub fn select(&mut self, field: ParameterField, value: &str) -> Result<(), SessionError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(SessionError::invalid_expression(format!("Missing {field}")));
        }
        debug!(%field, value, "Parameter selected");
        *self.selections.slot(field) = value.to_string();
        Ok(())
    }

    pub fn apply_pulse(
        &mut self,
        target: &str,
        phase: &str,
        flip_angle: &str,
    ) -> Result<OperationRecord, SessionError> {
        self.apply(OperationKind::Pulse, target, &[flip_angle], Some(phase))
    }

    pub fn apply_chemical_shift(
        &mut self,
        target: &str,
        angle: &str,
    ) -> Result<OperationRecord, SessionError> {
        self.apply(OperationKind::ChemicalShift, target, &[angle], None)
    }

    pub fn apply_j_coupling(
        &mut self,
        target: &str,
        angle: &str,
    ) -> Result<OperationRecord, SessionError> {
        self.apply(OperationKind::JCoupling, target, &[angle], None)
    }

    /// Applies one operation to the current state. `target` is the text of
    /// the button pressed: a spin label, or a label pair for J-coupling.
    pub fn apply(
        &mut self,
        kind: OperationKind,
        target: &str,
        params: &[&str],
        phase: Option<&str>,
    ) -> Result<OperationRecord, SessionError> {
        let params: Vec<String> = params.iter().map(|s| s.to_string()).collect();
        let parsed = CommandBuilder::new(&self.config.spin_labels).parse_target(kind, target);
        let result = parsed.and_then(|t| self.resolve_and_commit(kind, &t, &params, phase));
        if let Err(e) = &result {
            warn!(%kind, requested = target, error = %e, "Operation rejected");
        }
        result
    }

    /// Applies a request built elsewhere. It is validated like typed input.
    pub fn apply_request(
        &mut self,
        request: &OperationRequest,
    ) -> Result<OperationRecord, SessionError> {
        let (params, phase) = match request {
            OperationRequest::Pulse {
                phase, flip_angle, ..
            } => (vec![flip_angle.clone()], Some(phase.as_str().to_string())),
            OperationRequest::PulsePhaseShift {
                phase, flip_angle, ..
            } => (vec![flip_angle.clone()], Some(phase.clone())),
            OperationRequest::ChemicalShift { angle, .. }
            | OperationRequest::JCoupling { angle, .. } => (vec![angle.clone()], None),
        };
        let result =
            self.resolve_and_commit(request.kind(), &request.target(), &params, phase.as_deref());
        if let Err(e) = &result {
            warn!(request = %request.describe(), error = %e, "Operation rejected");
        }
        result
    }

    fn resolve_and_commit(
        &mut self,
        kind: OperationKind,
        target: &Target,
        params: &[String],
        phase: Option<&str>,
    ) -> Result<OperationRecord, SessionError> {
        let mut declared = Vec::new();
        for text in params.iter().map(String::as_str).chain(phase) {
            declared.extend(self.symbols.resolve(text));
        }
        if !declared.is_empty() {
            debug!(?declared, "Declared new symbolic parameters");
        }
        let request = CommandBuilder::new(&self.config.spin_labels).build(kind, target, params, phase)?;
        self.commit(request, declared)
    }

    fn commit(
        &mut self,
        request: OperationRequest,
        declared: Vec<String>,
    ) -> Result<OperationRecord, SessionError> {
        let current = Rc::clone(self.history.current());
        let ctx = AlgebraContext {
            symbols: &self.symbols,
            simplification: self.config.simplification,
        };
        let next = self.algebra.apply(&current, &request, &ctx)?;
        if !next.log().starts_with(current.log()) {
            return Err(SessionError::internal(format!(
                "Operator algebra rewrote the derivation log while applying {}",
                request.describe()
            )));
        }
        let appended = self.tracker.advance(next.log())?;
        self.history.push(next);
        self.op_counter += 1;
        let record = OperationRecord {
            op_id: format!("op-{}", self.op_counter),
            request,
            declared_symbols: declared,
            appended,
        };
        debug!(
            op_id = %record.op_id,
            operation = %record.request.describe(),
            history_len = self.history.len(),
            "Operation applied"
        );
        self.journal.push(record.clone());
        Ok(record)
    }

    /// Takes back the last operation and re-renders the transcript from the
    /// surviving states.
    pub fn undo(&mut self) -> Result<ActionOutcome, SessionError> {
        if self.history.is_at_initial() {
            debug!("Nothing to undo");
            return Ok(ActionOutcome::NothingToUndo);
        }
        if self.journal.len() + 1 != self.history.len() {
            return Err(SessionError::internal(
                "Operation journal is out of step with the history",
            ));
        }
        let states = self.history.states();
        self.tracker
            .rebuild(states[..states.len() - 1].iter().map(|s| s.log()))?;
        self.history.undo();
        let record = self.journal.pop().ok_or_else(|| {
            SessionError::internal("Operation journal is out of step with the history")
        })?;
        info!(op_id = %record.op_id, history_len = self.history.len(), "Undo");
        Ok(ActionOutcome::Undone(record))
    }

    /// Returns to the initial state. Returns how many states were dropped.
    pub fn clear_all(&mut self) -> Result<usize, SessionError> {
        self.tracker
            .rebuild(std::iter::once(self.history.initial().log()))?;
        let removed = self.history.clear();
        self.journal.clear();
        info!(removed, "Cleared to initial state");
        Ok(removed)
    }

    pub fn handle(&mut self, action: UserAction) -> Result<ActionOutcome, SessionError> {
        match action {
            UserAction::Select { field, value } => {
                self.select(field, &value)?;
                Ok(ActionOutcome::Selected {
                    field,
                    value: self.selections.get(field).to_string(),
                })
            }
            UserAction::ApplyPulse { target } => {
                let PanelSelections {
                    flip_angle, phase, ..
                } = self.selections.clone();
                self.apply_pulse(&target, &phase, &flip_angle)
                    .map(ActionOutcome::Applied)
            }
            UserAction::ApplyChemicalShift { target } => {
                let angle = self.selections.cs_angle.clone();
                self.apply_chemical_shift(&target, &angle)
                    .map(ActionOutcome::Applied)
            }
            UserAction::ApplyJCoupling { target } => {
                let angle = self.selections.jc_angle.clone();
                self.apply_j_coupling(&target, &angle)
                    .map(ActionOutcome::Applied)
            }
            UserAction::Undo => self.undo(),
            UserAction::Clear => Ok(ActionOutcome::Cleared {
                removed: self.clear_all()?,
            }),
        }
    }

    pub fn capabilities() -> Capabilities {
        Capabilities {
            protocol_version: "v1".to_string(),
            supported_operations: vec![
                "Pulse".to_string(),
                "PulsePhaseShift".to_string(),
                "ChemicalShift".to_string(),
                "JCoupling".to_string(),
                "Undo".to_string(),
                "Clear".to_string(),
                "SaveTranscript".to_string(),
            ],
            quadrature_phases: QuadraturePhase::ALL
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
            simplification_modes: Simplification::ALL
                .iter()
                .map(|m| m.as_str().to_string())
                .collect(),
            export_format: "Simplification: <mode>\\nInitial Density Operator: <transcript>"
                .to_string(),
        }
    }

    pub fn summarize(&self) -> SessionSummary {
        SessionSummary {
            simplification: self.config.simplification,
            spin_labels: self.config.spin_labels.clone(),
            history_len: self.history.len(),
            current_operator: self.current().value().to_string(),
            parameters: self.symbols.parameters().map(|s| s.name.clone()).collect(),
            selections: self.selections.clone(),
            operations: self.journal.clone(),
        }
    }
}
