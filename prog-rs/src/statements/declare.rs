//! `var <name> as <type> [= <expr>]`

use std::rc::Rc;

use regex::Captures;

use super::dispatch::{CompileContext, Compiled};
use super::{fail, Statement, StatementResult};
use crate::error::CompileError;
use crate::expr::ProgExpression;
use crate::runtime::Runtime;
use crate::scope::{is_reserved, is_valid_name, LexicalScope};
use crate::source::SourceLine;
use crate::types::ProgVariableType;
use crate::value::Value;

pub(crate) const PATTERN: &str = r"^var\s+(\S+)\s+as\s+(.+?)(?:\s*=\s*(.+))?$";

#[derive(Debug)]
pub struct Declare {
    pub name: String,
    pub ty: ProgVariableType,
    pub initializer: Option<Rc<dyn ProgExpression>>,
    pub line: usize,
}

impl Declare {
    pub fn execute(&self, rt: &mut Runtime) -> StatementResult {
        let value = match &self.initializer {
            Some(expr) => match expr.evaluate(&rt.variables) {
                Ok(v) => v,
                Err(e) => return fail(self.line, e),
            },
            None => Value::default_for(self.ty),
        };
        if !rt.variables.declare(&self.name, self.ty, value) {
            return fail(self.line, format!("variable {} is already declared", self.name));
        }
        StatementResult::Normal
    }
}

/// Reject names that cannot introduce a new variable at this point.
pub(crate) fn check_new_name(
    name: &str,
    scope: &LexicalScope,
    line: usize,
) -> Result<(), CompileError> {
    if !is_valid_name(name) {
        return Err(CompileError::new(
            line,
            format!(
                "invalid variable name '{name}': names start with a letter and use only letters, digits and '_'"
            ),
        ));
    }
    if is_reserved(name) {
        return Err(CompileError::new(line, format!("'{name}' is a reserved word")));
    }
    if scope.is_declared(name) {
        return Err(CompileError::new(line, format!("variable {name} is already declared")));
    }
    Ok(())
}

pub(crate) fn compile<'s>(
    caps: &Captures<'_>,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    let name = caps[1].trim_start_matches('@');
    check_new_name(name, scope, line.number)?;

    let ty: ProgVariableType = caps[2]
        .parse()
        .map_err(|e: String| CompileError::new(line.number, e))?;
    if ty.is_void() {
        return Err(CompileError::new(line.number, "variables cannot be declared as Void"));
    }

    let initializer = caps
        .get(3)
        .map(|init| {
            ctx.typed_expression(
                init.as_str(),
                ty,
                &format!("initial value of {name}"),
                scope,
                line.number,
            )
        })
        .transpose()?;

    let statement = Statement::Declare(Declare {
        name: name.to_ascii_lowercase(),
        ty,
        initializer,
        line: line.number,
    });
    Ok(Compiled {
        statement,
        remaining: rest,
        scope: scope.with_variable(name, ty),
        line: line.number,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
