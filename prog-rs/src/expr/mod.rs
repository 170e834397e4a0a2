//! Expression boundary.
//!
//! Statements never parse expression text themselves.  They hand it to an
//! [`ExpressionCompiler`] and only inspect the [`ProgExpression::return_type`]
//! of the node they get back.  [`StandardCompiler`] is the reference
//! implementation: a small typed expression language whose functions come
//! from a host-extensible [`FunctionLibrary`].
//!
//! ```rust
//! use prog::expr::{ExpressionCompiler, StandardCompiler};
//! use prog::{LexicalScope, ProgVariableType, Value, VariableSpace};
//!
//! let compiler = StandardCompiler::new();
//! let scope = LexicalScope::new().with_variable("hp", ProgVariableType::NUMBER);
//! let node = compiler.compile("@hp * 2 > 10", &scope).unwrap();
//! assert_eq!(node.return_type(), ProgVariableType::BOOLEAN);
//!
//! let mut vars = VariableSpace::new();
//! vars.declare("hp", ProgVariableType::NUMBER, Value::Number(6.0));
//! assert_eq!(node.evaluate(&vars), Ok(Value::Boolean(true)));
//! ```

pub mod functions;
pub mod parser;
pub mod typed;

use std::fmt;
use std::rc::Rc;

use crate::scope::LexicalScope;
use crate::types::ProgVariableType;
use crate::value::Value;
use crate::variables::VariableSpace;

pub use functions::{Function, FunctionLibrary};
pub use typed::CompiledExpression;

/// A compiled, type-checked expression node.
///
/// Evaluation failures are returned as the error message; the node keeps no
/// state between calls, so it may be evaluated re-entrantly.
pub trait ProgExpression: fmt::Debug {
    /// The static type of the value [`evaluate`](Self::evaluate) produces.
    fn return_type(&self) -> ProgVariableType;

    fn evaluate(&self, variables: &VariableSpace) -> Result<Value, String>;
}

/// Service that turns expression text into a [`ProgExpression`].
pub trait ExpressionCompiler {
    fn compile(&self, text: &str, scope: &LexicalScope) -> Result<Rc<dyn ProgExpression>, String>;
}

/// The reference [`ExpressionCompiler`].
#[derive(Debug, Clone)]
pub struct StandardCompiler {
    library: FunctionLibrary,
}

impl Default for StandardCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardCompiler {
    /// A compiler backed by [`FunctionLibrary::standard`].
    pub fn new() -> Self {
        Self::with_library(FunctionLibrary::standard())
    }

    pub fn with_library(library: FunctionLibrary) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &FunctionLibrary {
        &self.library
    }

    /// Mutable access for registering host functions.
    pub fn library_mut(&mut self) -> &mut FunctionLibrary {
        &mut self.library
    }
}

impl ExpressionCompiler for StandardCompiler {
    fn compile(&self, text: &str, scope: &LexicalScope) -> Result<Rc<dyn ProgExpression>, String> {
        let ast = parser::parse_expr(text)?;
        let compiled = typed::check(&ast, scope, &self.library)?;
        Ok(Rc::new(compiled))
    }
}
