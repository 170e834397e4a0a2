//! `break`, `continue` and `return [expr]`.

use std::rc::Rc;

use regex::Captures;

use super::dispatch::{CompileContext, Compiled};
use super::{fail, Statement, StatementResult};
use crate::error::CompileError;
use crate::expr::ProgExpression;
use crate::runtime::Runtime;
use crate::scope::{LexicalScope, RETURN_SLOT};
use crate::source::SourceLine;

pub(crate) const BREAK_PATTERN: &str = r"^break$";
pub(crate) const CONTINUE_PATTERN: &str = r"^continue$";
pub(crate) const RETURN_PATTERN: &str = r"^return(?:\s+(.+))?$";

/// `return`, optionally storing a value in the return slot first.
#[derive(Debug)]
pub struct Return {
    pub value: Option<Rc<dyn ProgExpression>>,
    pub line: usize,
}

impl Return {
    pub fn execute(&self, rt: &mut Runtime) -> StatementResult {
        if let Some(expr) = &self.value {
            let value = match expr.evaluate(&rt.variables) {
                Ok(v) => v,
                Err(e) => return fail(self.line, e),
            };
            if let Err(e) = rt.variables.set(RETURN_SLOT, value) {
                return fail(self.line, e);
            }
        }
        StatementResult::Return
    }
}

pub(crate) fn compile_break<'s>(
    _: &Captures<'_>,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    if ctx.config.strict_jumps && !ctx.in_loop && !ctx.in_switch {
        return Err(CompileError::new(line.number, "break outside of a loop or switch"));
    }
    Ok(Compiled::single(Statement::Break, line, rest, scope))
}

pub(crate) fn compile_continue<'s>(
    _: &Captures<'_>,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    if ctx.config.strict_jumps && !ctx.in_loop {
        return Err(CompileError::new(line.number, "continue outside of a loop"));
    }
    Ok(Compiled::single(Statement::Continue, line, rest, scope))
}

pub(crate) fn compile_return<'s>(
    caps: &Captures<'_>,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    let value = match caps.get(1) {
        Some(_) if ctx.in_delay => {
            return Err(CompileError::new(line.number, "a delay block cannot return a value"))
        }
        Some(_) if ctx.return_type.is_void() => {
            return Err(CompileError::new(line.number, "this prog does not return a value"))
        }
        Some(text) => Some(ctx.typed_expression(
            text.as_str(),
            ctx.return_type,
            "return value",
            scope,
            line.number,
        )?),
        None if !ctx.return_type.is_void() && !ctx.in_delay => {
            return Err(CompileError::new(
                line.number,
                format!("return needs a value of type {}", ctx.return_type),
            ))
        }
        None => None,
    };
    let statement = Statement::Return(Return { value, line: line.number });
    Ok(Compiled::single(statement, line, rest, scope))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
