//! Error types for compilation, execution and configuration.

use thiserror::Error;

use crate::types::ProgVariableType;

/// A compile failure, pinned to the 1-based source line that caused it.
///
/// Line `0` marks problems with the prog definition itself (parameters),
/// which have no source line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct CompileError {
    pub line: usize,
    pub message: String,
}

impl CompileError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self { line, message: message.into() }
    }
}

/// A failed top-level invocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// A statement or expression signalled an error while executing.
    #[error("{0}")]
    Statement(String),

    #[error("prog {prog} expects {expected} argument(s), got {actual}")]
    ArgumentCount { prog: String, expected: usize, actual: usize },

    #[error("argument {name} of prog {prog} expects {expected}, got {actual}")]
    ArgumentType {
        prog: String,
        name: String,
        expected: ProgVariableType,
        actual: ProgVariableType,
    },
}

/// A non-fatal problem on one line of a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}
