//! `delay (ms)` … `end delay`
//!
//! The body is handed to the host scheduler together with a snapshot of the
//! variables visible at that point, and execution continues immediately.
//! Plain values in the snapshot are copies; collections and dictionaries are
//! shared, so the delayed body sees later in-place changes to them.

use std::rc::Rc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::dispatch::{compile_block, end_pattern, CompileContext, Compiled};
use super::{execute_sequence, fail, Statement, StatementResult};
use crate::error::CompileError;
use crate::expr::ProgExpression;
use crate::runtime::Runtime;
use crate::scope::LexicalScope;
use crate::source::SourceLine;
use crate::types::ProgVariableType;
use crate::value::Value;

pub(crate) const PATTERN: &str = r"^delay\s*\((.*)\)$";

static END_DELAY: Lazy<Regex> = Lazy::new(|| end_pattern("delay"));

#[derive(Debug)]
pub struct Delay {
    /// Milliseconds to wait.
    pub duration: Rc<dyn ProgExpression>,
    pub body: Rc<[Statement]>,
    pub line: usize,
}

impl Delay {
    pub fn execute(&self, rt: &mut Runtime) -> StatementResult {
        let millis = match self.duration.evaluate(&rt.variables) {
            Ok(Value::Number(n)) if n.is_finite() && n >= 0.0 => n,
            Ok(other) => return fail(self.line, format!("invalid delay of {other} ms")),
            Err(e) => return fail(self.line, e),
        };
        let Some(scheduler) = rt.scheduler().cloned() else {
            return fail(self.line, "delay requires a scheduler, but none was provided");
        };

        let prog = Rc::clone(rt.prog_name());
        let description = format!("delayed block at line {} of prog {}", self.line, prog);
        let snapshot = rt.variables.snapshot();
        let body = Rc::clone(&self.body);
        let nested = Rc::clone(&scheduler);
        let line = self.line;
        let task = move || {
            let mut rt = Runtime::new(Rc::clone(&prog), snapshot).with_scheduler(Some(nested));
            match execute_sequence(&body, &mut rt) {
                StatementResult::Error(e) => {
                    tracing::warn!(prog = %prog, line, error = %e, "delayed block failed");
                }
                _ => tracing::debug!(prog = %prog, line, "delayed block finished"),
            }
        };
        tracing::debug!(prog = %rt.prog_name(), line, millis, "scheduling delayed block");
        scheduler.schedule(Box::new(task), Duration::from_millis(millis.round() as u64), description);
        StatementResult::Normal
    }
}

pub(crate) fn compile<'s>(
    caps: &Captures<'_>,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    let inner = ctx.nested(line.number)?;
    let body_ctx = CompileContext {
        return_type: ProgVariableType::VOID,
        in_loop: false,
        in_switch: false,
        in_delay: true,
        ..inner
    };
    let duration = ctx.typed_expression(&caps[1], ProgVariableType::NUMBER, "delay", scope, line.number)?;
    let block = compile_block(line, "delay", rest, scope.clone(), &body_ctx, |t| END_DELAY.is_match(t))?;
    let statement = Statement::Delay(Delay {
        duration,
        body: block.statements.into(),
        line: line.number,
    });
    Ok(Compiled {
        statement,
        remaining: block.remaining,
        scope: scope.clone(),
        line: block.terminator.number,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
