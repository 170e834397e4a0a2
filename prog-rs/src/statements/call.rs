//! A bare function call used as a statement; the result is discarded.

use std::rc::Rc;

use regex::Captures;

use super::dispatch::{CompileContext, Compiled};
use super::{fail, Statement, StatementResult};
use crate::error::CompileError;
use crate::expr::ProgExpression;
use crate::runtime::Runtime;
use crate::scope::LexicalScope;
use crate::source::SourceLine;

pub(crate) const PATTERN: &str = r"^([a-z][a-z0-9_]*)\s*\((.*)\)$";

#[derive(Debug)]
pub struct Call {
    pub expression: Rc<dyn ProgExpression>,
    pub line: usize,
}

impl Call {
    pub fn execute(&self, rt: &mut Runtime) -> StatementResult {
        match self.expression.evaluate(&rt.variables) {
            Ok(_) => StatementResult::Normal,
            Err(e) => fail(self.line, e),
        }
    }
}

pub(crate) fn compile<'s>(
    _: &Captures<'_>,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    let expression = ctx.expression(&line.text, scope, line.number)?;
    let statement = Statement::Call(Call { expression, line: line.number });
    Ok(Compiled::single(statement, line, rest, scope))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::config::CompilerConfig;
    use crate::expr::StandardCompiler;
    use crate::statements::dispatch::{compile_sequence, CompileContext};
    use crate::statements::test_support::{compile_err, run_result};
    use crate::statements::{execute_sequence, StatementResult};
    use crate::runtime::Runtime;
    use crate::scope::LexicalScope;
    use crate::source::prepare_source;
    use crate::types::ProgVariableType;
    use crate::value::Value;
    use crate::variables::VariableSpace;

    #[test]
    fn host_function_side_effects() {
        let hits = Rc::new(Cell::new(0.0));
        let sink = Rc::clone(&hits);
        let mut compiler = StandardCompiler::new();
        compiler.library_mut().register("bump", &[ProgVariableType::NUMBER], ProgVariableType::VOID, move |args| {
            sink.set(sink.get() + args[0].as_number().unwrap_or(0.0));
            Ok(Value::Null)
        });
        let config = CompilerConfig::default();
        let ctx = CompileContext::new(&compiler, &config, ProgVariableType::VOID);
        let stmts = compile_sequence(&prepare_source("bump(2)\nBUMP(3)"), LexicalScope::new(), &ctx).unwrap();
        let mut rt = Runtime::new("calls", VariableSpace::new());
        assert_eq!(execute_sequence(&stmts, &mut rt), StatementResult::Normal);
        assert_eq!(hits.get(), 5.0);
    }

    #[test]
    fn failing_call() {
        let (result, _) = run_result("tonumber('abc')");
        match result {
            StatementResult::Error(msg) => assert!(msg.starts_with("line 1: tonumber"), "{msg}"),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_function() {
        let err = compile_err("launch(1)");
        assert!(err.message.contains("unknown function launch"), "{err}");
    }
}
