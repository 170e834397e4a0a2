//! `if (cond)` … `elseif (cond)` … `else` … `end if`
//!
//! The whole chain compiles to one flat [`If`]: a list of guarded arms
//! tried in order, then an optional else body.

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
use crate::types::ProgVariableType;

pub(crate) const PATTERN: &str = r"^if\s*\((.*)\)$";

static ELSEIF: Lazy<Regex> = Lazy::new(|| pattern(r"^else\s*if\s*\((.*)\)$"));
static ELSE: Lazy<Regex> = Lazy::new(|| pattern(r"^else$"));
static END_IF: Lazy<Regex> = Lazy::new(|| end_pattern("if"));

fn is_separator(text: &str) -> bool {
    END_IF.is_match(text) || ELSE.is_match(text) || ELSEIF.is_match(text)
}

/// One `if` or `elseif` arm.
#[derive(Debug)]
pub struct Arm {
    pub condition: Rc<dyn ProgExpression>,
    pub body: Vec<Statement>,
    pub line: usize,
}

#[derive(Debug)]
pub struct If {
    /// The `if` arm first, then each `elseif` in source order.
    pub arms: Vec<Arm>,
    pub else_branch: Option<Vec<Statement>>,
    pub line: usize,
}

impl If {
    pub fn execute(&self, rt: &mut Runtime) -> StatementResult {
        let mut chosen = self.else_branch.as_deref();
        for arm in &self.arms {
            let taken = match arm.condition.evaluate(&rt.variables) {
                Ok(v) => match v.as_bool() {
                    Some(b) => b,
                    None => return fail(arm.line, format!("condition produced {v}, not a Boolean")),
                },
                Err(e) => return fail(arm.line, e),
            };
            if taken {
                chosen = Some(arm.body.as_slice());
                break;
            }
        }
        match chosen {
            Some(body) if !body.is_empty() => rt.scoped(|rt| execute_sequence(body, rt)),
            _ => StatementResult::Normal,
        }
    }

    pub(crate) fn returns_on_all_paths(&self) -> bool {
        self.else_branch.as_deref().is_some_and(sequence_returns)
            && self.arms.iter().all(|arm| sequence_returns(&arm.body))
    }
}

fn condition(
    text: &str,
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
    line: usize,
) -> Result<Rc<dyn ProgExpression>, CompileError> {
    ctx.typed_expression(text, ProgVariableType::BOOLEAN, "condition", scope, line)
}

pub(crate) fn compile<'s>(
    caps: &Captures<'_>,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    let inner = ctx.nested(line.number)?;
    let mut arms = Vec::new();
    let mut guard = condition(&caps[1], scope, ctx, line.number)?;
    let mut guard_line = line.number;
    let mut rest = rest;

    // Unterminated errors always point at the opening `if`.
    loop {
        let block = compile_block(line, "if", rest, scope.clone(), &inner, is_separator)?;
        let separator = block.terminator;
        arms.push(Arm { condition: guard, body: block.statements, line: guard_line });
        rest = block.remaining;

        if END_IF.is_match(&separator.text) {
            let statement = Statement::If(If { arms, else_branch: None, line: line.number });
            return Ok(Compiled { statement, remaining: rest, scope: scope.clone(), line: separator.number });
        }
        match ELSEIF.captures(&separator.text) {
            Some(caps) => {
                guard = condition(&caps[1], scope, ctx, separator.number)?;
                guard_line = separator.number;
            }
            None => break,
        }
    }

    let otherwise = compile_block(line, "if", rest, scope.clone(), &inner, is_separator)?;
    if !END_IF.is_match(&otherwise.terminator.text) {
        return Err(CompileError::new(
            otherwise.terminator.number,
            format!("'{}' after else", otherwise.terminator.text),
        ));
    }
    let statement = Statement::If(If {
        arms,
        else_branch: Some(otherwise.statements),
        line: line.number,
    });
    Ok(Compiled {
        statement,
        remaining: otherwise.remaining,
        scope: scope.clone(),
        line: otherwise.terminator.number,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::statements::test_support::{compile_err, compile_ok, run};
    use crate::statements::Statement;
    use crate::value::Value;

    fn grade(score: i64) -> Value {
        let src = format!(
            "var score as number = {score}\nvar g as text\n\
             if (@score >= 90)\n  g = 'A'\nelseif (@score >= 80)\n  g = 'B'\n\
             else if (@score >= 70)\n  g = 'C'\nelse\n  g = 'F'\nend if"
        );
        run(&src).value("g").cloned().unwrap_or_default()
    }

    #[test]
    fn elseif_chain_picks_first_true_arm() {
        assert_eq!(grade(95), Value::from("A"));
        assert_eq!(grade(85), Value::from("B"));
        assert_eq!(grade(75), Value::from("C"));
        assert_eq!(grade(10), Value::from("F"));
    }

    #[test]
    fn elseif_chain_compiles_flat() {
        let stmts = compile_ok("if (true)\nelseif (false)\nelse if (true)\nelse\nend if");
        let Statement::If(chain) = &stmts[0] else { panic!("expected if") };
        assert_eq!(chain.arms.iter().map(|a| a.line).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(chain.else_branch.as_ref().map(Vec::len), Some(0));
    }

    #[test]
    fn long_elseif_chain_compiles_and_runs() {
        let mut src = String::from("var x as number\nif (false)\n");
        for _ in 0..5_000 {
            src.push_str("elseif (false)\n");
        }
        src.push_str("elseif (@x == 0)\n  x = 7\nelse\n  x = 1\nend if");
        assert_eq!(run(&src).value("x"), Some(&Value::Number(7.0)));
    }

    #[test]
    fn unterminated_chain_points_at_opening_if() {
        let err = compile_err("var x as number\nif (true)\nelseif (false)\nelseif (true)\n  x = 1");
        assert_eq!(err.line, 2);
        assert!(err.message.contains("unterminated if"), "{err}");

        let err = compile_err("if (true)\nelseif (false)\nelse\nvar y as number");
        assert_eq!(err.line, 1);
    }

    #[test]
    fn branch_declarations_do_not_leak() {
        let err = compile_err("if (true)\n  var inner as number = 1\nend if\ninner = 2");
        assert_eq!(err.line, 4);
        assert!(err.message.contains("not declared"), "{err}");
        run("if (true)\n  var t as number\nelse\n  var t as text\nend if\nvar t as boolean");
    }

    #[test]
    fn endif_spelling() {
        run("IF (true)\nENDIF");
    }

    #[test]
    fn condition_must_be_boolean() {
        let err = compile_err("if (1 + 1)\nend if");
        assert!(err.message.contains("condition must be Boolean"), "{err}");
    }

    #[test]
    fn else_must_be_last() {
        let err = compile_err("if (true)\nelse\nelse\nend if");
        assert_eq!(err.line, 3);
        let err = compile_err("if (true)\nelse");
        assert_eq!(err.line, 1);
        assert!(err.message.contains("unterminated if"), "{err}");
    }
}
