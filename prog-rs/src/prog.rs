//! Compiled progs and their invocation.

use std::fmt;
use std::rc::Rc;

use crate::config::CompilerConfig;
use crate::error::{CompileError, RuntimeError};
use crate::expr::{ExpressionCompiler, StandardCompiler};
use crate::runtime::Runtime;
use crate::scheduler::Scheduler;
use crate::scope::{is_reserved, is_valid_name, LexicalScope, RETURN_SLOT};
use crate::source::prepare_source;
use crate::statements::{compile_body, execute_sequence, CompileContext, Statement, StatementResult};
use crate::types::ProgVariableType;
use crate::value::Value;
use crate::variables::VariableSpace;

/// Everything needed to compile a prog: its signature and source text.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgDefinition {
    pub name: String,
    pub return_type: ProgVariableType,
    pub parameters: Vec<(String, ProgVariableType)>,
    pub source: String,
}

impl ProgDefinition {
    pub fn new(name: impl Into<String>, return_type: ProgVariableType, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            return_type,
            parameters: Vec::new(),
            source: source.into(),
        }
    }

    /// Append a parameter (builder style).
    pub fn with_parameter(mut self, name: impl Into<String>, ty: ProgVariableType) -> Self {
        self.parameters.push((name.into(), ty));
        self
    }
}

/// A compiled prog, ready to run any number of times.
///
/// ```rust
/// use prog::{Prog, ProgDefinition, ProgVariableType, StandardCompiler, Value};
///
/// let src = "var total as number\nfor (i : @n)\n  total += @i\nend for\nreturn @total";
/// let def = ProgDefinition::new("sum", ProgVariableType::NUMBER, src)
///     .with_parameter("n", ProgVariableType::NUMBER);
/// let prog = Prog::compile(&def, &StandardCompiler::new()).unwrap();
/// assert_eq!(prog.execute(&[Value::Number(5.0)]), Ok(Value::Number(15.0)));
/// ```
pub struct Prog {
    name: Rc<str>,
    return_type: ProgVariableType,
    parameters: Vec<(String, ProgVariableType)>,
    body: Vec<Statement>,
}

impl fmt::Debug for Prog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prog")
            .field("name", &self.name)
            .field("return_type", &self.return_type)
            .field("parameters", &self.parameters)
            .field("body", &self.body)
            .finish()
    }
}

impl Prog {
    /// Compile with the default [`CompilerConfig`].
    pub fn compile(def: &ProgDefinition, compiler: &dyn ExpressionCompiler) -> Result<Prog, CompileError> {
        Self::compile_with(def, compiler, &CompilerConfig::default())
    }

    /// Compile with the reference expression compiler and default settings.
    pub fn compile_standard(def: &ProgDefinition) -> Result<Prog, CompileError> {
        Self::compile(def, &StandardCompiler::new())
    }

    pub fn compile_with(
        def: &ProgDefinition,
        compiler: &dyn ExpressionCompiler,
        config: &CompilerConfig,
    ) -> Result<Prog, CompileError> {
        let scope = parameter_scope(def)?;
        let lines = prepare_source(&def.source);
        let ctx = CompileContext::new(compiler, config, def.return_type);
        let body = compile_body(&lines, scope, &ctx).map_err(|e| {
            tracing::debug!(prog = %def.name, line = e.line, error = %e.message, "prog failed to compile");
            e
        })?;
        tracing::debug!(prog = %def.name, statements = body.len(), "compiled prog");
        Ok(Prog {
            name: def.name.as_str().into(),
            return_type: def.return_type,
            parameters: def
                .parameters
                .iter()
                .map(|(n, t)| (n.to_ascii_lowercase(), *t))
                .collect(),
            body,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn return_type(&self) -> ProgVariableType {
        self.return_type
    }

    pub fn parameters(&self) -> &[(String, ProgVariableType)] {
        &self.parameters
    }

    pub fn statements(&self) -> &[Statement] {
        &self.body
    }

    /// Run without a scheduler; any `delay` statement reached fails.
    pub fn execute(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        self.execute_with(args, None)
    }

    /// Run once.  Returns the return slot's value, or `Null` for void progs.
    pub fn execute_with(
        &self,
        args: &[Value],
        scheduler: Option<Rc<dyn Scheduler>>,
    ) -> Result<Value, RuntimeError> {
        let variables = self.bind_arguments(args)?;
        let mut rt = Runtime::new(Rc::clone(&self.name), variables).with_scheduler(scheduler);
        tracing::trace!(prog = %self.name, "executing prog");
        match execute_sequence(&self.body, &mut rt) {
            StatementResult::Error(message) => {
                tracing::debug!(prog = %self.name, error = %message, "prog failed");
                Err(RuntimeError::Statement(message))
            }
            _ => Ok(rt.variables.value(RETURN_SLOT).cloned().unwrap_or_default()),
        }
    }

    fn bind_arguments(&self, args: &[Value]) -> Result<VariableSpace, RuntimeError> {
        if args.len() != self.parameters.len() {
            return Err(RuntimeError::ArgumentCount {
                prog: self.name.to_string(),
                expected: self.parameters.len(),
                actual: args.len(),
            });
        }
        let mut variables = VariableSpace::new();
        for ((name, ty), arg) in self.parameters.iter().zip(args) {
            if let Some(actual) = mismatch(*ty, arg) {
                return Err(RuntimeError::ArgumentType {
                    prog: self.name.to_string(),
                    name: name.clone(),
                    expected: *ty,
                    actual,
                });
            }
            variables.declare(name, *ty, arg.clone());
        }
        if !self.return_type.is_void() {
            variables.declare(RETURN_SLOT, self.return_type, Value::default_for(self.return_type));
        }
        Ok(variables)
    }
}

/// Build the root scope from the parameter list.  Problems are reported
/// against line 0.
fn parameter_scope(def: &ProgDefinition) -> Result<LexicalScope, CompileError> {
    let mut scope = LexicalScope::new();
    for (name, ty) in &def.parameters {
        let problem = if !is_valid_name(name) {
            Some(format!("invalid parameter name '{name}'"))
        } else if is_reserved(name) {
            Some(format!("parameter name '{name}' is a reserved word"))
        } else if scope.is_declared(name) {
            Some(format!("duplicate parameter {name}"))
        } else if ty.is_void() {
            Some(format!("parameter {name} cannot be Void"))
        } else {
            None
        };
        if let Some(message) = problem {
            return Err(CompileError::new(0, message));
        }
        scope = scope.with_variable(name, *ty);
    }
    Ok(scope)
}

/// Why `value` cannot be passed where `expected` is declared, as the type
/// that was actually supplied.
///
/// Entity-typed parameters accept `Null`.  Structural arguments are checked
/// element by element, so an empty collection fits any element type and the
/// reported type of a bad one is the offending element's type under the
/// argument's structure.
fn mismatch(expected: ProgVariableType, value: &Value) -> Option<ProgVariableType> {
    type T = ProgVariableType;

    let expected = expected.without_markers();
    let structure = expected.structure();
    let Some(element) = expected.element_type() else {
        return match value {
            Value::Null if accepts_null(expected) => None,
            v if expected.compatible_with(v.type_of()) => None,
            v => Some(v.type_of()),
        };
    };
    let found = match value {
        Value::Collection(items) if structure == T::COLLECTION => {
            first_mismatch(element, items.borrow().iter())
        }
        Value::Dictionary(map) if structure == T::DICTIONARY => {
            first_mismatch(element, map.borrow().values())
        }
        Value::CollectionDictionary(map) if structure == T::COLLECTION_DICTIONARY => {
            first_mismatch(element, map.borrow().values().flatten())
        }
        v => return Some(v.type_of()),
    };
    found.map(|ty| ty | structure)
}

fn first_mismatch<'a>(
    element: ProgVariableType,
    mut items: impl Iterator<Item = &'a Value>,
) -> Option<ProgVariableType> {
    items.find_map(|v| mismatch(element, v))
}

fn accepts_null(expected: ProgVariableType) -> bool {
    !expected.is_structural()
        && ![ProgVariableType::NUMBER, ProgVariableType::TEXT, ProgVariableType::BOOLEAN].contains(&expected)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
