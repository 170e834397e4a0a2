//! `name = expr` and the compound forms `+=`, `-=`, `*=`, `/=`.

use std::fmt;
use std::rc::Rc;

use regex::Captures;

use super::dispatch::{CompileContext, Compiled};
use super::{fail, Statement, StatementResult};
use crate::error::CompileError;
use crate::expr::ProgExpression;
use crate::runtime::Runtime;
use crate::scope::LexicalScope;
use crate::source::SourceLine;
use crate::types::ProgVariableType;
use crate::value::Value;

pub(crate) const PATTERN: &str = r"^@?([a-z][a-z0-9_]*)\s*=([^=].*)$";
pub(crate) const COMPOUND_PATTERN: &str = r"^@?([a-z][a-z0-9_]*)\s*([-+*/])=(.+)$";

/// Rebind a variable to a new value.
#[derive(Debug)]
pub struct Assign {
    pub name: String,
    pub value: Rc<dyn ProgExpression>,
    pub line: usize,
}

impl Assign {
    pub fn execute(&self, rt: &mut Runtime) -> StatementResult {
        let value = match self.value.evaluate(&rt.variables) {
            Ok(v) => v,
            Err(e) => return fail(self.line, e),
        };
        match rt.variables.set(&self.name, value) {
            Ok(()) => StatementResult::Normal,
            Err(e) => fail(self.line, e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithmeticOp {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(Self::Add),
            "-" => Some(Self::Subtract),
            "*" => Some(Self::Multiply),
            "/" => Some(Self::Divide),
            _ => None,
        }
    }

    fn apply(self, a: f64, b: f64) -> Result<f64, String> {
        match self {
            Self::Add => Ok(a + b),
            Self::Subtract => Ok(a - b),
            Self::Multiply => Ok(a * b),
            Self::Divide if b == 0.0 => Err("division by zero".into()),
            Self::Divide => Ok(a / b),
        }
    }
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Add => "+=",
            Self::Subtract => "-=",
            Self::Multiply => "*=",
            Self::Divide => "/=",
        };
        f.write_str(symbol)
    }
}

/// Update a variable in place.
///
/// On numbers this is arithmetic; on text `+=` appends; on collections `+=`
/// adds an element (or every element of another collection) and `-=`
/// removes the first equal element.  Collection updates mutate the shared
/// structure, so every binding of it observes the change.
#[derive(Debug)]
pub struct CompoundAssign {
    pub name: String,
    pub op: ArithmeticOp,
    pub value: Rc<dyn ProgExpression>,
    pub line: usize,
}

impl CompoundAssign {
    pub fn execute(&self, rt: &mut Runtime) -> StatementResult {
        let rhs = match self.value.evaluate(&rt.variables) {
            Ok(v) => v,
            Err(e) => return fail(self.line, e),
        };
        let Some(current) = rt.variables.value(&self.name).cloned() else {
            return fail(self.line, format!("variable {} is not declared", self.name));
        };
        let updated = match (self.op, &current, rhs) {
            (op, Value::Number(a), Value::Number(b)) => match op.apply(*a, b) {
                Ok(n) => Value::Number(n),
                Err(e) => return fail(self.line, e),
            },
            (ArithmeticOp::Add, Value::Text(a), b) => Value::Text(format!("{a}{b}")),
            (ArithmeticOp::Add, Value::Collection(items), Value::Collection(more)) => {
                let more = more.borrow().clone();
                items.borrow_mut().extend(more);
                return StatementResult::Normal;
            }
            (ArithmeticOp::Add, Value::Collection(items), element) => {
                items.borrow_mut().push(element);
                return StatementResult::Normal;
            }
            (ArithmeticOp::Subtract, Value::Collection(items), element) => {
                let mut items = items.borrow_mut();
                if let Some(pos) = items.iter().position(|v| *v == element) {
                    items.remove(pos);
                }
                return StatementResult::Normal;
            }
            (op, current, _) => {
                return fail(
                    self.line,
                    format!("operator {op} cannot be applied to {}", current.type_of()),
                )
            }
        };
        match rt.variables.set(&self.name, updated) {
            Ok(()) => StatementResult::Normal,
            Err(e) => fail(self.line, e),
        }
    }
}

/// Look up an assignment target, which must already be declared.
pub(crate) fn target_type(
    name: &str,
    scope: &LexicalScope,
    line: usize,
) -> Result<ProgVariableType, CompileError> {
    scope
        .lookup(name)
        .ok_or_else(|| CompileError::new(line, format!("variable {name} is not declared")))
}

pub(crate) fn compile<'s>(
    caps: &Captures<'_>,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    let name = &caps[1];
    let ty = target_type(name, scope, line.number)?;
    let value = ctx.typed_expression(
        &caps[2],
        ty,
        &format!("value assigned to {name}"),
        scope,
        line.number,
    )?;
    let statement = Statement::Assign(Assign {
        name: name.to_ascii_lowercase(),
        value,
        line: line.number,
    });
    Ok(Compiled::single(statement, line, rest, scope))
}

pub(crate) fn compile_compound<'s>(
    caps: &Captures<'_>,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    type T = ProgVariableType;

    let name = &caps[1];
    let ty = target_type(name, scope, line.number)?;
    let op = ArithmeticOp::from_symbol(&caps[2])
        .ok_or_else(|| CompileError::new(line.number, format!("unknown operator {}=", &caps[2])))?;
    let value = ctx.expression(&caps[3], scope, line.number)?;
    let rhs = value.return_type();

    let element = if ty.without_markers().contains(T::COLLECTION) {
        Some(ty.strip(T::COLLECTION))
    } else {
        None
    };
    let accepted = match (op, element) {
        (_, None) if T::NUMBER.compatible_with(ty) => T::NUMBER.compatible_with(rhs),
        (ArithmeticOp::Add, None) if T::TEXT.compatible_with(ty) => {
            !rhs.is_void() && !rhs.is_structural()
        }
        (ArithmeticOp::Add, Some(el)) => el.compatible_with(rhs) || ty.compatible_with(rhs),
        (ArithmeticOp::Subtract, Some(el)) => el.compatible_with(rhs),
        _ => {
            return Err(CompileError::new(
                line.number,
                format!("operator {op} cannot be applied to {name} ({ty})"),
            ))
        }
    };
    if !accepted {
        return Err(CompileError::new(
            line.number,
            format!("operator {op} on {name} ({ty}) cannot take {rhs}"),
        ));
    }

    let statement = Statement::CompoundAssign(CompoundAssign {
        name: name.to_ascii_lowercase(),
        op,
        value,
        line: line.number,
    });
    Ok(Compiled::single(statement, line, rest, scope))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
