//! `switch (expr)` / `case (expr)` / `default` / `end switch`
//!
//! Cases are tested in source order and the first equal one runs; there is
//! no fall-through.  A `break` inside the chosen section ends the switch,
//! while `continue` travels on to the enclosing loop.

use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::dispatch::{compile_block, end_pattern, pattern, CompileContext, Compiled};
use super::{execute_sequence, fail, sequence_returns, Statement, StatementResult};
use crate::error::CompileError;
use crate::expr::ProgExpression;
use crate::runtime::Runtime;
use crate::scope::LexicalScope;
use crate::source::SourceLine;

pub(crate) const PATTERN: &str = r"^switch\s*\((.*)\)$";

static CASE: Lazy<Regex> = Lazy::new(|| pattern(r"^case\s*\((.*)\)$"));
static DEFAULT: Lazy<Regex> = Lazy::new(|| pattern(r"^default$"));
static END_SWITCH: Lazy<Regex> = Lazy::new(|| end_pattern("switch"));

fn is_section_end(text: &str) -> bool {
    CASE.is_match(text) || DEFAULT.is_match(text) || END_SWITCH.is_match(text)
}

#[derive(Debug)]
pub struct Case {
    pub value: Rc<dyn ProgExpression>,
    pub body: Vec<Statement>,
    pub line: usize,
}

#[derive(Debug)]
pub struct Switch {
    pub value: Rc<dyn ProgExpression>,
    pub cases: Vec<Case>,
    pub default: Option<Vec<Statement>>,
    pub line: usize,
}

impl Switch {
    pub fn execute(&self, rt: &mut Runtime) -> StatementResult {
        let value = match self.value.evaluate(&rt.variables) {
            Ok(v) => v,
            Err(e) => return fail(self.line, e),
        };
        let mut chosen = self.default.as_deref();
        for case in &self.cases {
            match case.value.evaluate(&rt.variables) {
                Ok(v) if v == value => {
                    chosen = Some(case.body.as_slice());
                    break;
                }
                Ok(_) => {}
                Err(e) => return fail(case.line, e),
            }
        }
        let Some(body) = chosen else {
            return StatementResult::Normal;
        };
        match rt.scoped(|rt| execute_sequence(body, rt)) {
            StatementResult::Break => StatementResult::Normal,
            other => other,
        }
    }

    /// Only a switch with a `default` can cover every value.
    pub fn returns_on_all_paths(&self) -> bool {
        self.default.as_deref().is_some_and(sequence_returns)
            && self.cases.iter().all(|c| sequence_returns(&c.body))
    }
}

pub(crate) fn compile<'s>(
    caps: &Captures<'_>,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    let inner = ctx.nested(line.number)?.switching();
    let value = ctx.expression(&caps[1], scope, line.number)?;
    let switch_type = value.return_type();

    let mut cases = Vec::new();
    let mut default: Option<Vec<Statement>> = None;
    let mut rest = rest;
    loop {
        let Some(section) = rest.first() else {
            return Err(CompileError::new(
                line.number,
                "unterminated switch block: missing 'end switch'",
            ));
        };
        if END_SWITCH.is_match(&section.text) {
            return Ok(Compiled {
                statement: Statement::Switch(Switch { value, cases, default, line: line.number }),
                remaining: &rest[1..],
                scope: scope.clone(),
                line: section.number,
            });
        }
        if default.is_some() {
            return Err(CompileError::new(
                section.number,
                "default must be the last section of a switch",
            ));
        }

        let case_value = if let Some(c) = CASE.captures(&section.text) {
            let expr = ctx.expression(&c[1], scope, section.number)?;
            let case_type = expr.return_type();
            if !switch_type.compatible_with(case_type) && !case_type.compatible_with(switch_type) {
                return Err(CompileError::new(
                    section.number,
                    format!("case of type {case_type} can never match a switch on {switch_type}"),
                ));
            }
            Some(expr)
        } else if DEFAULT.is_match(&section.text) {
            None
        } else {
            return Err(CompileError::new(
                section.number,
                "expected 'case', 'default' or 'end switch'",
            ));
        };

        let block = compile_block(line, "switch", &rest[1..], scope.clone(), &inner, is_section_end)?;
        match case_value {
            Some(value) => cases.push(Case { value, body: block.statements, line: section.number }),
            None => default = Some(block.statements),
        }
        rest = block.from_terminator;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::statements::test_support::{compile_err, compile_returning, run, run_result};
    use crate::statements::StatementResult;
    use crate::types::ProgVariableType;
    use crate::value::Value;

    fn pick(n: i64) -> Value {
        let src = format!(
            "var n as number = {n}\nvar out as text\nswitch (@n)\n\
             case (1)\n  out = 'one'\n\
             case (2)\n  out = 'two'\n\
             case (1)\n  out = 'duplicate'\n\
             default\n  out = 'many'\nend switch"
        );
        run(&src).value("out").cloned().unwrap_or_default()
    }

    #[test]
    fn first_matching_case_wins() {
        assert_eq!(pick(1), Value::from("one"));
        assert_eq!(pick(2), Value::from("two"));
        assert_eq!(pick(7), Value::from("many"));
    }

    #[test]
    fn no_match_without_default() {
        let vars = run("var out as number\nswitch ('x')\ncase ('y')\nout = 1\nend switch");
        assert_eq!(vars.value("out"), Some(&Value::Number(0.0)));
    }

    #[test]
    fn break_is_consumed_continue_is_not() {
        let src = "var total as number\nfor (i : 4)\n\
                   switch (@i)\ncase (2)\n  continue\ncase (3)\n  break\n  total += 100\nend switch\n\
                   total += @i\nend for";
        let vars = run(src);
        assert_eq!(vars.value("total"), Some(&Value::Number(1.0 + 3.0 + 4.0)));
    }

    #[test]
    fn break_at_top_level_of_switch() {
        let (result, _) = run_result("switch (1)\ncase (1)\nbreak\nend switch");
        assert_eq!(result, StatementResult::Normal);
    }

    #[test]
    fn continue_outside_loop_is_rejected_even_in_switch() {
        let err = compile_err("switch (1)\ncase (1)\ncontinue\nend switch");
        assert_eq!(err.line, 3);
    }

    #[test]
    fn sections_have_own_scope() {
        run("switch (1)\ncase (1)\nvar x as number\ncase (2)\nvar x as text\nend switch\nvar x as boolean");
    }

    #[test]
    fn malformed_switches() {
        let err = compile_err("switch (1)\nvar x as number\nend switch");
        assert_eq!(err.line, 2);
        let err = compile_err("switch (1)\ndefault\ncase (1)\nend switch");
        assert_eq!(err.line, 3);
        assert!(err.message.contains("default must be the last"), "{err}");
        let err = compile_err("switch (1)\ncase ('a')\nend switch");
        assert!(err.message.contains("can never match"), "{err}");
        let err = compile_err("switch (1)\ncase (1)");
        assert_eq!(err.line, 1);
        assert!(err.message.contains("unterminated switch"), "{err}");
    }

    #[test]
    fn returns_on_all_paths_needs_default() {
        let with_default = "switch (1)\ncase (1)\nreturn 1\ndefault\nreturn 2\nend switch";
        assert!(compile_returning(with_default, ProgVariableType::NUMBER).is_ok());
        let without = "switch (1)\ncase (1)\nreturn 1\nend switch";
        let err = compile_returning(without, ProgVariableType::NUMBER).unwrap_err();
        assert!(err.message.contains("not all code paths return a value"), "{err}");
    }
}
