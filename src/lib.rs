pub mod about;
pub mod algebra;
pub mod command;
pub mod config;
pub mod error;
pub mod expression;
pub mod history;
pub mod logging;
pub mod presets;
pub mod session;
pub mod session_shell;
pub mod symbols;
pub mod transcript;

pub use algebra::{OperatorAlgebra, OperatorState, SymbolicAlgebra};
pub use config::{SessionConfig, Simplification};
pub use error::{ErrorCode, SessionError};
pub use session::{ActionOutcome, Session, UserAction};
