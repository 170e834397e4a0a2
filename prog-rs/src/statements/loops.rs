//! `for`, `foreach` and `while` loops.
//!
//! Every iteration runs in its own block frame, so declarations inside the
//! body start afresh each time round.

use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::declare::check_new_name;
use super::dispatch::{compile_block, end_pattern, CompileContext, Compiled};
use super::{execute_sequence, fail, Statement, StatementResult};
use crate::error::CompileError;
use crate::expr::ProgExpression;
use crate::runtime::Runtime;
use crate::scope::LexicalScope;
use crate::source::SourceLine;
use crate::types::ProgVariableType;
use crate::value::Value;

pub(crate) const FOR_PATTERN: &str = r"^for\s*\(\s*@?(\S+)\s*:\s*(.+)\)$";
pub(crate) const FOREACH_PATTERN: &str = r"^foreach\s*\(\s*@?(\S+)\s+in\s+(.+)\)$";
pub(crate) const WHILE_PATTERN: &str = r"^while\s*\((.*)\)$";

static END_FOR: Lazy<Regex> = Lazy::new(|| end_pattern("for"));
static END_FOREACH: Lazy<Regex> = Lazy::new(|| end_pattern("foreach"));
static END_WHILE: Lazy<Regex> = Lazy::new(|| end_pattern("while"));

/// What a loop does after one pass over its body.
enum Flow {
    Next,
    Stop,
    Leave(StatementResult),
}

fn after_iteration(result: StatementResult) -> Flow {
    match result {
        StatementResult::Normal | StatementResult::Continue => Flow::Next,
        StatementResult::Break => Flow::Stop,
        other => Flow::Leave(other),
    }
}

/// Run one iteration with `variable` bound in a fresh frame.
fn iterate(
    rt: &mut Runtime,
    variable: &str,
    ty: ProgVariableType,
    value: Value,
    body: &[Statement],
) -> StatementResult {
    rt.scoped(|rt| {
        if !rt.variables.declare(variable, ty, value) {
            return StatementResult::Error(format!("loop variable {variable} is already declared"));
        }
        execute_sequence(body, rt)
    })
}

// ── for ───────────────────────────────────────────────────────────────────────

/// `for (i : n)`: runs the body with `i` = 1, 2, … round(n).
#[derive(Debug)]
pub struct For {
    pub variable: String,
    pub count: Rc<dyn ProgExpression>,
    pub body: Vec<Statement>,
    pub line: usize,
}

impl For {
    pub fn execute(&self, rt: &mut Runtime) -> StatementResult {
        let count = match self.count.evaluate(&rt.variables) {
            Ok(Value::Number(n)) => n.round(),
            Ok(other) => return fail(self.line, format!("loop count {other} is not a number")),
            Err(e) => return fail(self.line, e),
        };
        if !(count >= 1.0) {
            return StatementResult::Normal;
        }
        let mut i = 1.0;
        while i <= count {
            let result = iterate(rt, &self.variable, ProgVariableType::NUMBER, Value::Number(i), &self.body);
            match after_iteration(result) {
                Flow::Next => {}
                Flow::Stop => break,
                Flow::Leave(result) => return result,
            }
            i += 1.0;
        }
        StatementResult::Normal
    }
}

pub(crate) fn compile_for<'s>(
    caps: &Captures<'_>,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    let variable = &caps[1];
    check_new_name(variable, scope, line.number)?;
    let inner = ctx.nested(line.number)?.looping();
    let count = ctx.typed_expression(&caps[2], ProgVariableType::NUMBER, "loop count", scope, line.number)?;

    let body_scope = scope.with_variable(variable, ProgVariableType::NUMBER);
    let block = compile_block(line, "for", rest, body_scope, &inner, |t| END_FOR.is_match(t))?;
    let statement = Statement::For(For {
        variable: variable.to_ascii_lowercase(),
        count,
        body: block.statements,
        line: line.number,
    });
    Ok(Compiled {
        statement,
        remaining: block.remaining,
        scope: scope.clone(),
        line: block.terminator.number,
    })
}

// ── foreach ───────────────────────────────────────────────────────────────────

/// `foreach (x in coll)`: iterates a snapshot of the collection taken when
/// the loop starts.
#[derive(Debug)]
pub struct ForEach {
    pub variable: String,
    pub element_type: ProgVariableType,
    pub collection: Rc<dyn ProgExpression>,
    pub body: Vec<Statement>,
    pub line: usize,
}

impl ForEach {
    pub fn execute(&self, rt: &mut Runtime) -> StatementResult {
        let items = match self.collection.evaluate(&rt.variables) {
            Ok(Value::Collection(items)) => items.borrow().clone(),
            Ok(other) => return fail(self.line, format!("{other} is not a collection")),
            Err(e) => return fail(self.line, e),
        };
        for item in items {
            let result = iterate(rt, &self.variable, self.element_type, item, &self.body);
            match after_iteration(result) {
                Flow::Next => {}
                Flow::Stop => break,
                Flow::Leave(result) => return result,
            }
        }
        StatementResult::Normal
    }
}

pub(crate) fn compile_foreach<'s>(
    caps: &Captures<'_>,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    let variable = &caps[1];
    check_new_name(variable, scope, line.number)?;
    let inner = ctx.nested(line.number)?.looping();
    let collection = ctx.expression(&caps[2], scope, line.number)?;
    let ty = collection.return_type().without_markers();
    if !ty.contains(ProgVariableType::COLLECTION) {
        return Err(CompileError::new(
            line.number,
            format!("{} is not a collection ({ty})", caps[2].trim()),
        ));
    }
    let element_type = ty.strip(ProgVariableType::COLLECTION);

    let body_scope = scope.with_variable(variable, element_type);
    let block = compile_block(line, "foreach", rest, body_scope, &inner, |t| END_FOREACH.is_match(t))?;
    let statement = Statement::ForEach(ForEach {
        variable: variable.to_ascii_lowercase(),
        element_type,
        collection,
        body: block.statements,
        line: line.number,
    });
    Ok(Compiled {
        statement,
        remaining: block.remaining,
        scope: scope.clone(),
        line: block.terminator.number,
    })
}

// ── while ─────────────────────────────────────────────────────────────────────

/// `while (cond)`: the condition is re-evaluated before every iteration.
#[derive(Debug)]
pub struct While {
    pub condition: Rc<dyn ProgExpression>,
    pub body: Vec<Statement>,
    pub line: usize,
}

impl While {
    pub fn execute(&self, rt: &mut Runtime) -> StatementResult {
        loop {
            match self.condition.evaluate(&rt.variables) {
                Ok(Value::Boolean(true)) => {}
                Ok(Value::Boolean(false)) => return StatementResult::Normal,
                Ok(other) => return fail(self.line, format!("condition produced {other}, not a Boolean")),
                Err(e) => return fail(self.line, e),
            }
            let result = rt.scoped(|rt| execute_sequence(&self.body, rt));
            match after_iteration(result) {
                Flow::Next => {}
                Flow::Stop => return StatementResult::Normal,
                Flow::Leave(result) => return result,
            }
        }
    }
}

pub(crate) fn compile_while<'s>(
    caps: &Captures<'_>,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    let inner = ctx.nested(line.number)?.looping();
    let condition = ctx.typed_expression(&caps[1], ProgVariableType::BOOLEAN, "condition", scope, line.number)?;
    let block = compile_block(line, "while", rest, scope.clone(), &inner, |t| END_WHILE.is_match(t))?;
    let statement = Statement::While(While {
        condition,
        body: block.statements,
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

#[cfg(test)]
mod tests {
    use crate::statements::test_support::{compile_err, run, run_result};
    use crate::statements::StatementResult;
    use crate::value::Value;

    fn total(src: &str) -> Value {
        run(src).value("total").cloned().unwrap_or_default()
    }

    #[test]
    fn for_counts_from_one() {
        let src = "var total as number\nfor (i : 5)\n  total += @i\nend for";
        assert_eq!(total(src), Value::Number(15.0));
    }

    #[test]
    fn for_rounds_and_skips_non_positive_counts() {
        assert_eq!(total("var total as number\nfor (i : 2.6)\ntotal += 1\nend for"), Value::Number(3.0));
        assert_eq!(total("var total as number\nfor (i : 0)\ntotal += 1\nend for"), Value::Number(0.0));
        assert_eq!(total("var total as number\nfor (i : -4)\ntotal += 1\nend for"), Value::Number(0.0));
        assert_eq!(total("var total as number\nfor (i : 0.4)\ntotal += 1\nend for"), Value::Number(0.0));
    }

    #[test]
    fn break_and_continue() {
        let src = "var total as number\nfor (i : 10)\n\
                   if (@i == 3)\ncontinue\nend if\n\
                   if (@i == 6)\nbreak\nend if\n\
                   total += @i\nend for";
        assert_eq!(total(src), Value::Number(1.0 + 2.0 + 4.0 + 5.0));
    }

    #[test]
    fn foreach_iterates_snapshot() {
        let src = "var list as number collection\nadditem list 1\nadditem list 2\n\
                   var total as number\nforeach (n in @list)\n  additem list @n\n  total += @n\nend foreach";
        let vars = run(src);
        assert_eq!(vars.value("total"), Some(&Value::Number(3.0)));
        match vars.value("list") {
            Some(Value::Collection(items)) => assert_eq!(items.borrow().len(), 4),
            other => panic!("expected collection, got {other:?}"),
        }
    }

    #[test]
    fn foreach_over_empty_collection() {
        let src = "var list as text collection\nvar total as number\n\
                   foreach (s in @list)\ntotal += 1\nend foreach";
        assert_eq!(total(src), Value::Number(0.0));
    }

    #[test]
    fn foreach_element_type_flows_into_body() {
        let err = compile_err("var list as text collection\nforeach (s in @list)\nvar n as number = @s\nend foreach");
        assert_eq!(err.line, 3);
        assert!(err.message.contains("must be Number"), "{err}");
    }

    #[test]
    fn foreach_needs_a_collection() {
        let err = compile_err("var n as number\n\nforeach (x in @n)\nend foreach");
        assert_eq!(err.line, 3);
        assert!(err.message.contains("not a collection"), "{err}");
    }

    #[test]
    fn while_loop() {
        let src = "var total as number\nwhile (@total < 10)\n  total += 3\nend while";
        assert_eq!(total(src), Value::Number(12.0));
    }

    #[test]
    fn body_declarations_are_fresh_each_iteration() {
        let src = "var total as number\nfor (i : 3)\n  var seen as number\n  seen += 1\n  total += @seen\nend for";
        assert_eq!(total(src), Value::Number(3.0));
    }

    #[test]
    fn loop_variable_is_scoped_to_the_body() {
        let err = compile_err("for (i : 2)\nend for\ni = 3");
        assert_eq!(err.line, 3);
        let err = compile_err("var i as number\nfor (i : 2)\nend for");
        assert!(err.message.contains("already declared"), "{err}");
        run("for (i : 2)\nend for\nfor (i : 2)\nend for");
    }

    #[test]
    fn runtime_error_stops_the_loop() {
        let (result, vars) = run_result(
            "var total as number\nvar d as number\nfor (i : 5)\ntotal += @i\ntotal = 1 / @d\nend for",
        );
        assert_eq!(result, StatementResult::Error("line 5: division by zero".into()));
        assert_eq!(vars.value("total"), Some(&Value::Number(1.0)));
    }
}
