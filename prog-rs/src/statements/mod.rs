//! Statement tree and execution.
//!
//! Compilation turns prepared source lines into a tree of [`Statement`]s via
//! the ordered recognizer table in [`dispatch`].  Execution walks that tree,
//! every node reporting its outcome as a [`StatementResult`] so that loops,
//! switches and the top-level driver can react to `break`, `continue`,
//! `return` and runtime errors without unwinding.

pub mod dispatch;

mod assign;
mod call;
mod collection;
mod conditional;
mod declare;
mod delay;
mod jump;
mod loops;
mod switch;

pub use assign::{Assign, ArithmeticOp, CompoundAssign};
pub use call::Call;
pub use collection::{CollectionOp, CollectionStatement};
pub use conditional::{Arm, If};
pub use declare::Declare;
pub use delay::Delay;
pub use dispatch::{compile_body, compile_next, compile_sequence, CompileContext, Compiled};
pub use jump::Return;
pub use loops::{For, ForEach, While};
pub use switch::{Case, Switch};

use crate::runtime::Runtime;

/// Outcome of executing one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum StatementResult {
    /// Carry on with the next statement.
    Normal,
    /// Leave the nearest enclosing loop or switch.
    Break,
    /// Skip to the next iteration of the nearest enclosing loop.
    Continue,
    /// Leave the prog.
    Return,
    /// Abort the invocation with a message.
    Error(String),
}

impl StatementResult {
    pub fn is_normal(&self) -> bool {
        matches!(self, StatementResult::Normal)
    }
}

/// One compiled statement.
#[derive(Debug)]
pub enum Statement {
    Declare(Declare),
    Assign(Assign),
    CompoundAssign(CompoundAssign),
    If(If),
    For(For),
    ForEach(ForEach),
    While(While),
    Switch(Switch),
    Break,
    Continue,
    Return(Return),
    Collection(CollectionStatement),
    Call(Call),
    Delay(Delay),
}

impl Statement {
    pub fn execute(&self, rt: &mut Runtime) -> StatementResult {
        match self {
            Statement::Declare(s) => s.execute(rt),
            Statement::Assign(s) => s.execute(rt),
            Statement::CompoundAssign(s) => s.execute(rt),
            Statement::If(s) => s.execute(rt),
            Statement::For(s) => s.execute(rt),
            Statement::ForEach(s) => s.execute(rt),
            Statement::While(s) => s.execute(rt),
            Statement::Switch(s) => s.execute(rt),
            Statement::Break => StatementResult::Break,
            Statement::Continue => StatementResult::Continue,
            Statement::Return(s) => s.execute(rt),
            Statement::Collection(s) => s.execute(rt),
            Statement::Call(s) => s.execute(rt),
            Statement::Delay(s) => s.execute(rt),
        }
    }

    /// Does every path through this statement end in `return`?
    ///
    /// Loops never count: their bodies may run zero times.
    pub fn returns_on_all_paths(&self) -> bool {
        match self {
            Statement::Return(_) => true,
            Statement::If(s) => s.returns_on_all_paths(),
            Statement::Switch(s) => s.returns_on_all_paths(),
            _ => false,
        }
    }
}

/// Run statements in order until one does not complete normally.
pub fn execute_sequence(statements: &[Statement], rt: &mut Runtime) -> StatementResult {
    for statement in statements {
        let result = statement.execute(rt);
        if !result.is_normal() {
            return result;
        }
    }
    StatementResult::Normal
}

/// Does this sequence reach a `return` on every path?
///
/// A `break` or `continue` reached first ends the sequence without one.
pub fn sequence_returns(statements: &[Statement]) -> bool {
    for statement in statements {
        match statement {
            Statement::Break | Statement::Continue => return false,
            s if s.returns_on_all_paths() => return true,
            _ => {}
        }
    }
    false
}

/// Prefix a runtime failure with the line it happened on.
pub(crate) fn fail(line: usize, message: impl std::fmt::Display) -> StatementResult {
    StatementResult::Error(format!("line {line}: {message}"))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::rc::Rc;

    use super::{compile_body, execute_sequence, CompileContext, Statement, StatementResult};
    use crate::config::CompilerConfig;
    use crate::error::CompileError;
    use crate::expr::StandardCompiler;
    use crate::runtime::Runtime;
    use crate::scheduler::Scheduler;
    use crate::scope::LexicalScope;
    use crate::source::prepare_source;
    use crate::types::ProgVariableType;
    use crate::variables::VariableSpace;

    pub fn compile_with(
        src: &str,
        return_type: ProgVariableType,
        config: &CompilerConfig,
    ) -> Result<Vec<Statement>, CompileError> {
        let compiler = StandardCompiler::new();
        let ctx = CompileContext::new(&compiler, config, return_type);
        compile_body(&prepare_source(src), LexicalScope::new(), &ctx)
    }

    pub fn compile_returning(src: &str, return_type: ProgVariableType) -> Result<Vec<Statement>, CompileError> {
        compile_with(src, return_type, &CompilerConfig::default())
    }

    pub fn compile_ok(src: &str) -> Vec<Statement> {
        compile_returning(src, ProgVariableType::VOID).unwrap_or_else(|e| panic!("{src:?}: {e}"))
    }

    pub fn compile_err(src: &str) -> CompileError {
        match compile_returning(src, ProgVariableType::VOID) {
            Ok(stmts) => panic!("{src:?} compiled unexpectedly: {stmts:?}"),
            Err(e) => e,
        }
    }

    fn execute(src: &str, scheduler: Option<Rc<dyn Scheduler>>) -> (StatementResult, VariableSpace) {
        let stmts = compile_ok(src);
        let mut rt = Runtime::new("test", VariableSpace::new()).with_scheduler(scheduler);
        let result = execute_sequence(&stmts, &mut rt);
        (result, rt.variables)
    }

    /// Compile and run at the root frame, returning the outcome and variables.
    pub fn run_result(src: &str) -> (StatementResult, VariableSpace) {
        execute(src, None)
    }

    pub fn run_scheduled(src: &str, scheduler: Rc<dyn Scheduler>) -> (StatementResult, VariableSpace) {
        execute(src, Some(scheduler))
    }

    /// Like [`run_result`], but the run must complete normally.
    pub fn run(src: &str) -> VariableSpace {
        let (result, vars) = run_result(src);
        assert_eq!(result, StatementResult::Normal, "{src:?}");
        vars
    }
}
