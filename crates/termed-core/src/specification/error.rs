use super::Engine;

/// Compilation to a backend failed. Never recovered from by dropping the
/// offending clause.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("criterion `{criterion}` cannot be compiled for the {engine} engine")]
    Unsupported { engine: Engine, criterion: String },
}
