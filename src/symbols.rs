//! Registry of the names a session knows about, and the resolver that
//! declares new symbolic parameters as users type them.

use crate::expression::is_identifier;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The only name that is never declared, since it is a constant.
pub const RESERVED_CONSTANT: &str = "pi";

/// Functions the expression grammar may call.
pub const BUILTIN_FUNCTIONS: [&str; 6] = ["sin", "cos", "tan", "exp", "sqrt", "log"];

/// Cartesian and raising/lowering suffixes of the per-spin basis operators.
pub const BASIS_SUFFIXES: [&str; 5] = ["x", "y", "z", "p", "m"];

/// Name of the identity operator.
pub const IDENTITY_OPERATOR: &str = "E";

lazy_static! {
    static ref TOKEN_SEPARATORS: Regex = Regex::new(r"[*/+\-.()^,\s]+").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    /// Free symbolic parameter such as an angle, frequency or delay.
    Parameter,
    /// Spin basis operator, e.g. `Ix` or `Sz`.
    Operator,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolTable {
    entries: Vec<Symbol>,
    by_name: HashMap<String, SymbolId>,
}

pub fn is_reserved(name: &str) -> bool {
    name == RESERVED_CONSTANT || (!name.is_empty() && name.chars().all(|c| c.is_ascii_digit()))
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table seeded with the builtin functions, the identity and the basis
    /// operators of every spin label.
    pub fn for_spin_labels(labels: &[String]) -> Self {
        let mut table = Self::new();
        for name in BUILTIN_FUNCTIONS {
            table.declare(name, SymbolKind::Function);
        }
        table.declare(IDENTITY_OPERATOR, SymbolKind::Operator);
        for label in labels {
            for suffix in BASIS_SUFFIXES {
                table.declare(&format!("{label}{suffix}"), SymbolKind::Operator);
            }
        }
        table
    }

    /// Registers `name` unless it is already known. Returns the symbol id and
    /// whether a new entry was created; an existing entry keeps its kind.
    pub fn declare(&mut self, name: &str, kind: SymbolKind) -> (SymbolId, bool) {
        if let Some(id) = self.by_name.get(name) {
            return (*id, false);
        }
        let id = SymbolId(self.entries.len() as u32);
        self.entries.push(Symbol {
            id,
            name: name.to_string(),
            kind,
        });
        self.by_name.insert(name.to_string(), id);
        (id, true)
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.by_name
            .get(name)
            .and_then(|id| self.entries.get(id.0 as usize))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<SymbolKind> {
        self.get(name).map(|s| s.kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All symbols in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.entries.iter()
    }

    pub fn parameters(&self) -> impl Iterator<Item = &Symbol> {
        self.entries
            .iter()
            .filter(|s| s.kind == SymbolKind::Parameter)
    }

    /// Declares every undeclared name in `expression` as a parameter and
    /// returns the new names in the order they appear.
    ///
    /// Syntax is not checked here. A token that cannot be a name (e.g. `2x`)
    /// is skipped and left for evaluation to reject.
    pub fn resolve(&mut self, expression: &str) -> Vec<String> {
        let mut declared = Vec::new();
        for token in TOKEN_SEPARATORS.split(expression) {
            if token.is_empty() || is_reserved(token) || self.contains(token) {
                continue;
            }
            if !is_identifier(token) {
                continue;
            }
            self.declare(token, SymbolKind::Parameter);
            declared.push(token.to_string());
        }
        declared
    }
}
