//! Collection and dictionary statements.
//!
//! | statement                     | target                  |
//! |-------------------------------|-------------------------|
//! | `additem list <expr>`         | collection              |
//! | `additem groups[<key>] <expr>`| collection dictionary   |
//! | `addrange list <collection>`  | collection              |
//! | `removeitem list <expr>`      | collection              |
//! | `removeat list <index>`       | collection              |
//! | `clearitems name`             | any structure           |
//! | `setitem name[<key>] = <expr>`| dictionary, collection  |
//! | `removekey name <key>`        | either dictionary kind  |
//!
//! All of these mutate the shared structure in place except `removeat`,
//! which builds a new collection and rebinds the variable to it.  Other
//! bindings of the old collection keep seeing the element.

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

type T = ProgVariableType;

pub(crate) const ADD_PATTERN: &str = r"^additem\s+@?([a-z][a-z0-9_]*)\s*(?:\[(.+?)\])?\s+(.+)$";
pub(crate) const ADD_RANGE_PATTERN: &str = r"^addrange\s+@?([a-z][a-z0-9_]*)\s+(.+)$";
pub(crate) const REMOVE_PATTERN: &str = r"^removeitem\s+@?([a-z][a-z0-9_]*)\s+(.+)$";
pub(crate) const REMOVE_AT_PATTERN: &str = r"^removeat\s+@?([a-z][a-z0-9_]*)\s+(.+)$";
pub(crate) const CLEAR_PATTERN: &str = r"^clearitems\s+@?([a-z][a-z0-9_]*)$";
pub(crate) const SET_PATTERN: &str = r"^setitem\s+@?([a-z][a-z0-9_]*)\s*\[(.+?)\]\s*=\s*(.+)$";
pub(crate) const REMOVE_KEY_PATTERN: &str = r"^removekey\s+@?([a-z][a-z0-9_]*)\s+(.+)$";

type Expr = Rc<dyn ProgExpression>;

#[derive(Debug)]
pub enum CollectionOp {
    Add(Expr),
    AddKeyed { key: Expr, value: Expr },
    AddRange(Expr),
    Remove(Expr),
    RemoveAt(Expr),
    Clear,
    Set { key: Expr, value: Expr },
    RemoveKey(Expr),
}

#[derive(Debug)]
pub struct CollectionStatement {
    pub variable: String,
    pub op: CollectionOp,
    pub line: usize,
}

/// An operand after evaluation.
enum Operands {
    None,
    One(Value),
    Two(Value, Value),
}

impl CollectionStatement {
    pub fn execute(&self, rt: &mut Runtime) -> StatementResult {
        match self.apply(rt) {
            Ok(()) => StatementResult::Normal,
            Err(e) => fail(self.line, e),
        }
    }

    fn evaluate(&self, rt: &Runtime) -> Result<Operands, String> {
        let eval = |e: &Expr| e.evaluate(&rt.variables);
        Ok(match &self.op {
            CollectionOp::Clear => Operands::None,
            CollectionOp::Add(e)
            | CollectionOp::AddRange(e)
            | CollectionOp::Remove(e)
            | CollectionOp::RemoveAt(e)
            | CollectionOp::RemoveKey(e) => Operands::One(eval(e)?),
            CollectionOp::AddKeyed { key, value } | CollectionOp::Set { key, value } => {
                Operands::Two(eval(key)?, eval(value)?)
            }
        })
    }

    fn apply(&self, rt: &mut Runtime) -> Result<(), String> {
        let operands = self.evaluate(rt)?;
        let target = rt
            .variables
            .value(&self.variable)
            .cloned()
            .ok_or_else(|| format!("variable {} is not declared", self.variable))?;

        match (&self.op, target, operands) {
            (CollectionOp::Add(_), Value::Collection(items), Operands::One(v)) => {
                items.borrow_mut().push(v);
            }
            (CollectionOp::AddKeyed { .. }, Value::CollectionDictionary(map), Operands::Two(k, v)) => {
                map.borrow_mut().entry(text_key(&k)?).or_default().push(v);
            }
            (CollectionOp::AddRange(_), Value::Collection(items), Operands::One(v)) => {
                let Value::Collection(more) = v else {
                    return Err(format!("addrange needs a collection, got {v}"));
                };
                let more = more.borrow().clone();
                items.borrow_mut().extend(more);
            }
            (CollectionOp::Remove(_), Value::Collection(items), Operands::One(v)) => {
                let mut items = items.borrow_mut();
                if let Some(pos) = items.iter().position(|x| *x == v) {
                    items.remove(pos);
                }
            }
            (CollectionOp::RemoveAt(_), Value::Collection(items), Operands::One(i)) => {
                let mut rebuilt = items.borrow().clone();
                let idx = position(&i, rebuilt.len())?;
                rebuilt.remove(idx);
                rt.variables.set(&self.variable, Value::collection(rebuilt))?;
            }
            (CollectionOp::Clear, Value::Collection(items), _) => items.borrow_mut().clear(),
            (CollectionOp::Clear, Value::Dictionary(map), _) => map.borrow_mut().clear(),
            (CollectionOp::Clear, Value::CollectionDictionary(map), _) => map.borrow_mut().clear(),
            (CollectionOp::Set { .. }, Value::Dictionary(map), Operands::Two(k, v)) => {
                map.borrow_mut().insert(text_key(&k)?, v);
            }
            (CollectionOp::Set { .. }, Value::Collection(items), Operands::Two(i, v)) => {
                let mut items = items.borrow_mut();
                let idx = position(&i, items.len())?;
                items[idx] = v;
            }
            (CollectionOp::RemoveKey(_), Value::Dictionary(map), Operands::One(k)) => {
                map.borrow_mut().remove(&text_key(&k)?);
            }
            (CollectionOp::RemoveKey(_), Value::CollectionDictionary(map), Operands::One(k)) => {
                map.borrow_mut().remove(&text_key(&k)?);
            }
            (_, other, _) => {
                return Err(format!(
                    "variable {} holds {}, which this statement cannot change",
                    self.variable,
                    other.type_of()
                ))
            }
        }
        Ok(())
    }
}

fn text_key(key: &Value) -> Result<String, String> {
    key.as_text()
        .map(str::to_owned)
        .ok_or_else(|| format!("dictionary key must be text, got {key}"))
}

fn position(index: &Value, len: usize) -> Result<usize, String> {
    match index {
        Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 && *n < len as f64 => Ok(*n as usize),
        Value::Number(n) => Err(format!("index {n} is out of range for a collection of {len} item(s)")),
        other => Err(format!("index must be a number, got {other}")),
    }
}

// ── Compilation ───────────────────────────────────────────────────────────────

/// The declared type of `name`, which must carry one of `structures`.
fn target(
    name: &str,
    structures: &[ProgVariableType],
    what: &str,
    scope: &LexicalScope,
    line: usize,
) -> Result<ProgVariableType, CompileError> {
    let ty = scope
        .lookup(name)
        .ok_or_else(|| CompileError::new(line, format!("variable {name} is not declared")))?
        .without_markers();
    if !structures.contains(&ty.structure()) {
        return Err(CompileError::new(line, format!("variable {name} is not {what} ({ty})")));
    }
    Ok(ty)
}

fn done<'s>(
    name: &str,
    op: CollectionOp,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
) -> Compiled<'s> {
    let statement = Statement::Collection(CollectionStatement {
        variable: name.to_ascii_lowercase(),
        op,
        line: line.number,
    });
    Compiled::single(statement, line, rest, scope)
}

pub(crate) fn compile_add<'s>(
    caps: &Captures<'_>,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    let name = &caps[1];
    let op = match caps.get(2) {
        None => {
            let ty = target(name, &[T::COLLECTION], "a collection", scope, line.number)?;
            let value = ctx.typed_expression(
                &caps[3],
                ty.strip(T::COLLECTION),
                "item",
                scope,
                line.number,
            )?;
            CollectionOp::Add(value)
        }
        Some(key) => {
            let ty = target(
                name,
                &[T::COLLECTION_DICTIONARY],
                "a collection dictionary",
                scope,
                line.number,
            )?;
            let key = ctx.typed_expression(key.as_str(), T::TEXT, "key", scope, line.number)?;
            let value = ctx.typed_expression(
                &caps[3],
                ty.strip(T::COLLECTION_DICTIONARY),
                "item",
                scope,
                line.number,
            )?;
            CollectionOp::AddKeyed { key, value }
        }
    };
    Ok(done(name, op, line, rest, scope))
}

pub(crate) fn compile_add_range<'s>(
    caps: &Captures<'_>,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    let name = &caps[1];
    let ty = target(name, &[T::COLLECTION], "a collection", scope, line.number)?;
    let values = ctx.typed_expression(&caps[2], ty, "range", scope, line.number)?;
    Ok(done(name, CollectionOp::AddRange(values), line, rest, scope))
}

pub(crate) fn compile_remove<'s>(
    caps: &Captures<'_>,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    let name = &caps[1];
    let ty = target(name, &[T::COLLECTION], "a collection", scope, line.number)?;
    let value = ctx.typed_expression(&caps[2], ty.strip(T::COLLECTION), "item", scope, line.number)?;
    Ok(done(name, CollectionOp::Remove(value), line, rest, scope))
}

pub(crate) fn compile_remove_at<'s>(
    caps: &Captures<'_>,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    let name = &caps[1];
    target(name, &[T::COLLECTION], "a collection", scope, line.number)?;
    let index = ctx.typed_expression(&caps[2], T::NUMBER, "index", scope, line.number)?;
    Ok(done(name, CollectionOp::RemoveAt(index), line, rest, scope))
}

pub(crate) fn compile_clear<'s>(
    caps: &Captures<'_>,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
    _: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    let name = &caps[1];
    target(
        name,
        &[T::COLLECTION, T::DICTIONARY, T::COLLECTION_DICTIONARY],
        "a collection or dictionary",
        scope,
        line.number,
    )?;
    Ok(done(name, CollectionOp::Clear, line, rest, scope))
}

pub(crate) fn compile_set<'s>(
    caps: &Captures<'_>,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    let name = &caps[1];
    let ty = target(
        name,
        &[T::DICTIONARY, T::COLLECTION],
        "a dictionary or collection",
        scope,
        line.number,
    )?;
    let (key_type, structure) = if ty.contains(T::DICTIONARY) {
        (T::TEXT, T::DICTIONARY)
    } else {
        (T::NUMBER, T::COLLECTION)
    };
    let key = ctx.typed_expression(&caps[2], key_type, "key", scope, line.number)?;
    let value = ctx.typed_expression(&caps[3], ty.strip(structure), "item", scope, line.number)?;
    Ok(done(name, CollectionOp::Set { key, value }, line, rest, scope))
}

pub(crate) fn compile_remove_key<'s>(
    caps: &Captures<'_>,
    line: &SourceLine,
    rest: &'s [SourceLine],
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    let name = &caps[1];
    target(
        name,
        &[T::DICTIONARY, T::COLLECTION_DICTIONARY],
        "a dictionary",
        scope,
        line.number,
    )?;
    let key = ctx.typed_expression(&caps[2], T::TEXT, "key", scope, line.number)?;
    Ok(done(name, CollectionOp::RemoveKey(key), line, rest, scope))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::statements::test_support::{compile_err, run, run_result};
    use crate::statements::StatementResult;
    use crate::value::Value;
    use crate::variables::VariableSpace;

    fn items(vars: &VariableSpace, name: &str) -> Vec<Value> {
        match vars.value(name) {
            Some(Value::Collection(items)) => items.borrow().clone(),
            other => panic!("{name}: expected collection, got {other:?}"),
        }
    }

    fn nums(ns: &[i64]) -> Vec<Value> {
        ns.iter().map(|n| Value::from(*n)).collect()
    }

    #[test]
    fn add_remove_clear() {
        let vars = run(
            "var l as number collection\nadditem l 1\nadditem @l 2\nadditem l 1\n\
             removeitem l 1\nremoveitem l 42",
        );
        assert_eq!(items(&vars, "l"), nums(&[2, 1]));

        let vars = run("var l as number collection\nadditem l 1\nclearitems l");
        assert!(items(&vars, "l").is_empty());
    }

    #[test]
    fn add_range_from_self() {
        let vars = run("var l as number collection\nadditem l 1\nadditem l 2\naddrange l @l");
        assert_eq!(items(&vars, "l"), nums(&[1, 2, 1, 2]));
    }

    #[test]
    fn removeat_rebinds_while_mutation_is_shared() {
        let vars = run(
            "var a as number collection\nvar b as number collection\n\
             additem a 10\nadditem a 20\nadditem a 30\nb = @a\n\
             additem a 40\nremoveat a 0",
        );
        assert_eq!(items(&vars, "a"), nums(&[20, 30, 40]));
        assert_eq!(items(&vars, "b"), nums(&[10, 20, 30, 40]));
    }

    #[test]
    fn removeat_out_of_range() {
        let (result, vars) = run_result("var a as number collection\nadditem a 1\nremoveat a 1");
        assert_eq!(
            result,
            StatementResult::Error("line 3: index 1 is out of range for a collection of 1 item(s)".into())
        );
        assert_eq!(items(&vars, "a"), nums(&[1]));
    }

    #[test]
    fn dictionaries() {
        let vars = run(
            "var d as number dictionary\nsetitem d['a'] = 1\nsetitem d['b'] = 2\n\
             setitem d['a'] = 3\nremovekey d 'b'\nvar total as number = @d['a']",
        );
        assert_eq!(vars.value("total"), Some(&Value::Number(3.0)));
        match vars.value("d") {
            Some(Value::Dictionary(map)) => assert_eq!(map.borrow().len(), 1),
            other => panic!("expected dictionary, got {other:?}"),
        }
    }

    #[test]
    fn collection_dictionaries() {
        let vars = run(
            "var g as text collectiondictionary\nadditem g['red'] 'apple'\nadditem g['red'] 'cherry'\n\
             additem g['green'] 'lime'\nvar n as number = count(@g['red'])\nremovekey g 'green'",
        );
        assert_eq!(vars.value("n"), Some(&Value::Number(2.0)));
        match vars.value("g") {
            Some(Value::CollectionDictionary(map)) => {
                let map = map.borrow();
                assert_eq!(map.len(), 1);
                assert_eq!(map["red"], vec![Value::from("apple"), Value::from("cherry")]);
            }
            other => panic!("expected collection dictionary, got {other:?}"),
        }
    }

    #[test]
    fn set_by_index() {
        let vars = run("var l as text collection\nadditem l 'a'\nadditem l 'b'\nsetitem l[1] = 'z'");
        assert_eq!(items(&vars, "l"), vec![Value::from("a"), Value::from("z")]);
    }

    #[test]
    fn not_a_collection() {
        let err = compile_err("var n as number\n\nadditem n 1");
        assert_eq!(err.line, 3);
        assert!(err.message.contains("n is not a collection"), "{err}");
    }

    #[test]
    fn compile_errors() {
        let cases = [
            ("additem missing 1", "variable missing is not declared"),
            ("var l as number collection\nadditem l 'x'", "item must be Number"),
            ("var l as number collection\naddrange l 5", "range must be Number Collection"),
            ("var d as number dictionary\nadditem d 1", "not a collection"),
            ("var d as number dictionary\nsetitem d[1] = 1", "key must be Text"),
            ("var l as number collection\nremoveat l 'x'", "index must be Number"),
            ("var l as number collection\nremovekey l 'x'", "not a dictionary"),
            ("var t as text\nclearitems t", "not a collection or dictionary"),
        ];
        for (src, needle) in cases {
            let err = compile_err(src);
            assert!(err.message.contains(needle), "{src:?}: {err}");
        }
    }
}
