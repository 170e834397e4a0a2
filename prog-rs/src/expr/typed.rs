//! Type checking and evaluation of parsed expressions.
//!
//! [`check`] resolves every variable against the [`LexicalScope`] and every
//! call against the [`FunctionLibrary`], producing a [`CompiledExpression`]
//! whose static type is known.  Evaluation then only fails for conditions
//! that depend on runtime data (division by zero, missing keys, …).

use std::rc::Rc;

use super::functions::{Function, FunctionLibrary};
use super::parser::{BinOp, Expr, UnaryOp};
use super::ProgExpression;
use crate::scope::LexicalScope;
use crate::types::ProgVariableType;
use crate::value::Value;
use crate::variables::VariableSpace;

type T = ProgVariableType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arith {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compare {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug)]
enum Node {
    Literal(Value),
    Variable(String),
    Negate(Box<CompiledExpression>),
    Not(Box<CompiledExpression>),
    Arithmetic(Arith, Box<CompiledExpression>, Box<CompiledExpression>),
    Concat(Box<CompiledExpression>, Box<CompiledExpression>),
    Compare(Compare, Box<CompiledExpression>, Box<CompiledExpression>),
    And(Box<CompiledExpression>, Box<CompiledExpression>),
    Or(Box<CompiledExpression>, Box<CompiledExpression>),
    Index(Box<CompiledExpression>, Box<CompiledExpression>),
    Call(Rc<Function>, Vec<CompiledExpression>),
}

/// A type-checked expression tree produced by the standard compiler.
#[derive(Debug)]
pub struct CompiledExpression {
    node: Node,
    return_type: ProgVariableType,
}

impl CompiledExpression {
    fn new(node: Node, return_type: ProgVariableType) -> Self {
        Self { node, return_type }
    }

    fn ty(&self) -> ProgVariableType {
        self.return_type.without_markers()
    }
}

// ── Type checking ─────────────────────────────────────────────────────────────

/// Type-check `expr` against `scope` and `library`.
pub fn check(
    expr: &Expr,
    scope: &LexicalScope,
    library: &FunctionLibrary,
) -> Result<CompiledExpression, String> {
    match expr {
        Expr::Number(n) => Ok(CompiledExpression::new(
            Node::Literal(Value::Number(*n)),
            T::NUMBER | T::LITERAL,
        )),
        Expr::Text(s) => Ok(CompiledExpression::new(
            Node::Literal(Value::Text(s.clone())),
            T::TEXT | T::LITERAL,
        )),
        Expr::Boolean(b) => Ok(CompiledExpression::new(
            Node::Literal(Value::Boolean(*b)),
            T::BOOLEAN | T::LITERAL,
        )),

        Expr::Var(name) => {
            let ty = scope
                .lookup(name)
                .ok_or_else(|| format!("variable {name} is not declared"))?;
            Ok(CompiledExpression::new(Node::Variable(name.to_ascii_lowercase()), ty))
        }

        Expr::Unary(op, inner) => {
            let inner = check(inner, scope, library)?;
            match op {
                UnaryOp::Neg if inner.ty() == T::NUMBER => {
                    Ok(CompiledExpression::new(Node::Negate(Box::new(inner)), T::NUMBER))
                }
                UnaryOp::Not if inner.ty() == T::BOOLEAN => {
                    Ok(CompiledExpression::new(Node::Not(Box::new(inner)), T::BOOLEAN))
                }
                UnaryOp::Neg => Err(format!("cannot negate {}", inner.ty())),
                UnaryOp::Not => Err(format!("cannot apply not to {}", inner.ty())),
            }
        }

        Expr::Binary(op, lhs, rhs) => {
            let l = check(lhs, scope, library)?;
            let r = check(rhs, scope, library)?;
            check_binary(*op, l, r)
        }

        Expr::Index(target, index) => {
            let target = check(target, scope, library)?;
            let index = check(index, scope, library)?;
            let tt = target.ty();
            let (key_type, result) = if tt.contains(T::COLLECTION) {
                (T::NUMBER, tt.strip(T::COLLECTION))
            } else if tt.contains(T::DICTIONARY) {
                (T::TEXT, tt.strip(T::DICTIONARY))
            } else if tt.contains(T::COLLECTION_DICTIONARY) {
                (T::TEXT, tt.strip(T::COLLECTION_DICTIONARY) | T::COLLECTION)
            } else {
                return Err(format!("cannot index a value of type {tt}"));
            };
            if !key_type.compatible_with(index.ty()) {
                return Err(format!(
                    "{tt} must be indexed by {key_type}, not {}",
                    index.ty()
                ));
            }
            Ok(CompiledExpression::new(
                Node::Index(Box::new(target), Box::new(index)),
                result,
            ))
        }

        Expr::Call(name, arg_exprs) => {
            let args = arg_exprs
                .iter()
                .map(|a| check(a, scope, library))
                .collect::<Result<Vec<_>, _>>()?;
            let arg_types: Vec<ProgVariableType> = args.iter().map(|a| a.return_type).collect();
            let function = library.resolve(name, &arg_types)?;
            let return_type = function.return_type;
            Ok(CompiledExpression::new(Node::Call(function, args), return_type))
        }
    }
}

fn check_binary(
    op: BinOp,
    l: CompiledExpression,
    r: CompiledExpression,
) -> Result<CompiledExpression, String> {
    let (lt, rt) = (l.ty(), r.ty());
    let numbers = lt == T::NUMBER && rt == T::NUMBER;
    let booleans = lt == T::BOOLEAN && rt == T::BOOLEAN;
    let plain = |t: T| !t.is_structural() && !t.is_void();
    let concat = (lt == T::TEXT && plain(rt)) || (rt == T::TEXT && plain(lt));
    let ordered = numbers || (lt == T::TEXT && rt == T::TEXT);
    let comparable = lt.compatible_with(rt) || rt.compatible_with(lt);
    let (l, r) = (Box::new(l), Box::new(r));

    let (node, ty) = match op {
        BinOp::Add if numbers => (Node::Arithmetic(Arith::Add, l, r), T::NUMBER),
        BinOp::Add if concat => (Node::Concat(l, r), T::TEXT),
        BinOp::Sub if numbers => (Node::Arithmetic(Arith::Sub, l, r), T::NUMBER),
        BinOp::Mul if numbers => (Node::Arithmetic(Arith::Mul, l, r), T::NUMBER),
        BinOp::Div if numbers => (Node::Arithmetic(Arith::Div, l, r), T::NUMBER),
        BinOp::Rem if numbers => (Node::Arithmetic(Arith::Rem, l, r), T::NUMBER),
        BinOp::Eq if comparable => (Node::Compare(Compare::Eq, l, r), T::BOOLEAN),
        BinOp::Ne if comparable => (Node::Compare(Compare::Ne, l, r), T::BOOLEAN),
        BinOp::Lt if ordered => (Node::Compare(Compare::Lt, l, r), T::BOOLEAN),
        BinOp::Le if ordered => (Node::Compare(Compare::Le, l, r), T::BOOLEAN),
        BinOp::Gt if ordered => (Node::Compare(Compare::Gt, l, r), T::BOOLEAN),
        BinOp::Ge if ordered => (Node::Compare(Compare::Ge, l, r), T::BOOLEAN),
        BinOp::And if booleans => (Node::And(l, r), T::BOOLEAN),
        BinOp::Or if booleans => (Node::Or(l, r), T::BOOLEAN),
        _ => return Err(format!("cannot apply {} to {lt} and {rt}", op.symbol())),
    };
    Ok(CompiledExpression::new(node, ty))
}

// ── Evaluation ────────────────────────────────────────────────────────────────

impl ProgExpression for CompiledExpression {
    fn return_type(&self) -> ProgVariableType {
        self.return_type
    }

    fn evaluate(&self, variables: &VariableSpace) -> Result<Value, String> {
        match &self.node {
            Node::Literal(v) => Ok(v.clone()),

            Node::Variable(name) => variables
                .value(name)
                .cloned()
                .ok_or_else(|| format!("variable {name} is not declared")),

            Node::Negate(inner) => Ok(Value::Number(-number(inner.evaluate(variables)?)?)),
            Node::Not(inner) => Ok(Value::Boolean(!boolean(inner.evaluate(variables)?)?)),

            Node::Arithmetic(op, lhs, rhs) => {
                let a = number(lhs.evaluate(variables)?)?;
                let b = number(rhs.evaluate(variables)?)?;
                let n = match op {
                    Arith::Add => a + b,
                    Arith::Sub => a - b,
                    Arith::Mul => a * b,
                    Arith::Div if b == 0.0 => return Err("division by zero".into()),
                    Arith::Div => a / b,
                    Arith::Rem if b == 0.0 => return Err("modulo by zero".into()),
                    Arith::Rem => a % b,
                };
                Ok(Value::Number(n))
            }

            Node::Concat(lhs, rhs) => {
                let a = lhs.evaluate(variables)?;
                let b = rhs.evaluate(variables)?;
                Ok(Value::Text(format!("{a}{b}")))
            }

            Node::Compare(op, lhs, rhs) => {
                let a = lhs.evaluate(variables)?;
                let b = rhs.evaluate(variables)?;
                let result = match op {
                    Compare::Eq => a == b,
                    Compare::Ne => a != b,
                    ordering => {
                        let ord = match (&a, &b) {
                            (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
                            (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
                            _ => None,
                        }
                        .ok_or_else(|| format!("cannot order {a} and {b}"))?;
                        match ordering {
                            Compare::Lt => ord.is_lt(),
                            Compare::Le => ord.is_le(),
                            Compare::Gt => ord.is_gt(),
                            _ => ord.is_ge(),
                        }
                    }
                };
                Ok(Value::Boolean(result))
            }

            Node::And(lhs, rhs) => {
                if !boolean(lhs.evaluate(variables)?)? {
                    return Ok(Value::Boolean(false));
                }
                Ok(Value::Boolean(boolean(rhs.evaluate(variables)?)?))
            }
            Node::Or(lhs, rhs) => {
                if boolean(lhs.evaluate(variables)?)? {
                    return Ok(Value::Boolean(true));
                }
                Ok(Value::Boolean(boolean(rhs.evaluate(variables)?)?))
            }

            Node::Index(target, index) => {
                let target = target.evaluate(variables)?;
                let index = index.evaluate(variables)?;
                index_value(&target, &index)
            }

            Node::Call(function, arg_exprs) => {
                let args = arg_exprs
                    .iter()
                    .map(|a| a.evaluate(variables))
                    .collect::<Result<Vec<_>, _>>()?;
                function.call(&args)
            }
        }
    }
}

fn number(v: Value) -> Result<f64, String> {
    v.as_number().ok_or_else(|| format!("expected a number, got {v}"))
}

fn boolean(v: Value) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("expected a boolean, got {v}"))
}

fn index_value(target: &Value, index: &Value) -> Result<Value, String> {
    match (target, index) {
        (Value::Collection(items), Value::Number(n)) => {
            let items = items.borrow();
            if n.fract() != 0.0 || *n < 0.0 || *n >= items.len() as f64 {
                return Err(format!(
                    "index {n} is out of range for a collection of {} item(s)",
                    items.len()
                ));
            }
            Ok(items[*n as usize].clone())
        }
        (Value::Dictionary(map), Value::Text(key)) => map
            .borrow()
            .get(key)
            .cloned()
            .ok_or_else(|| format!("dictionary has no entry for key '{key}'")),
        (Value::CollectionDictionary(map), Value::Text(key)) => Ok(Value::collection(
            map.borrow().get(key).cloned().unwrap_or_default(),
        )),
        _ => Err(format!("cannot index {target} with {index}")),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse_expr;

    fn scope() -> LexicalScope {
        LexicalScope::new()
            .with_variable("n", T::NUMBER)
            .with_variable("name", T::TEXT)
            .with_variable("flag", T::BOOLEAN)
            .with_variable("list", T::NUMBER | T::COLLECTION)
            .with_variable("bag", T::TEXT | T::DICTIONARY)
            .with_variable("groups", T::ITEM | T::COLLECTION_DICTIONARY)
            .with_variable("who", T::CHARACTER)
    }

    fn compile(src: &str) -> Result<CompiledExpression, String> {
        check(&parse_expr(src)?, &scope(), &FunctionLibrary::standard())
    }

    fn vars() -> VariableSpace {
        let mut v = VariableSpace::new();
        v.declare("n", T::NUMBER, Value::Number(4.0));
        v.declare("name", T::TEXT, Value::from("Ann"));
        v.declare("flag", T::BOOLEAN, Value::Boolean(true));
        v.declare(
            "list",
            T::NUMBER | T::COLLECTION,
            Value::collection([Value::Number(10.0), Value::Number(20.0)]),
        );
        v.declare("bag", T::TEXT | T::DICTIONARY, Value::default_for(T::TEXT | T::DICTIONARY));
        v.declare("who", T::CHARACTER, Value::entity(T::CHARACTER, 3, "Cora"));
        v
    }

    fn eval(src: &str) -> Result<Value, String> {
        compile(src)?.evaluate(&vars())
    }

    #[test]
    fn static_types() {
        assert_eq!(compile("1 + @n").unwrap().ty(), T::NUMBER);
        assert_eq!(compile("@name + 1").unwrap().ty(), T::TEXT);
        assert_eq!(compile("@n > 2 and @flag").unwrap().ty(), T::BOOLEAN);
        assert_eq!(compile("@list[0]").unwrap().ty(), T::NUMBER);
        assert_eq!(compile("@bag[\"k\"]").unwrap().ty(), T::TEXT);
        assert_eq!(compile("@groups[\"k\"]").unwrap().ty(), T::ITEM | T::COLLECTION);
        assert!(compile("3").unwrap().return_type().contains(T::LITERAL));
    }

    #[test]
    fn type_errors() {
        assert!(compile("@n + @flag").is_err());
        assert!(compile("@n and @flag").is_err());
        assert!(compile("@list[\"x\"]").is_err());
        assert!(compile("@n[0]").is_err());
        assert!(compile("@n < \"a\"").is_err());
        assert!(compile("@list + 1").is_err());
        let err = compile("@missing").unwrap_err();
        assert!(err.contains("not declared"));
    }

    #[test]
    fn evaluation() {
        assert_eq!(eval("@n * 2 + 1"), Ok(Value::Number(9.0)));
        assert_eq!(eval("\"hi \" + @name"), Ok(Value::from("hi Ann")));
        assert_eq!(eval("@list[1]"), Ok(Value::Number(20.0)));
        assert_eq!(eval("count(@list)"), Ok(Value::Number(2.0)));
        assert_eq!(eval("name(@who)"), Ok(Value::from("Cora")));
        assert_eq!(eval("not (@n == 4)"), Ok(Value::Boolean(false)));
        assert_eq!(eval("\"a\" < \"b\""), Ok(Value::Boolean(true)));
    }

    #[test]
    fn runtime_failures() {
        assert_eq!(eval("@n / 0"), Err("division by zero".to_owned()));
        assert!(eval("@list[2]").unwrap_err().contains("out of range"));
        assert!(eval("@bag[\"missing\"]").unwrap_err().contains("no entry"));
    }

    #[test]
    fn short_circuit_skips_failing_rhs() {
        assert_eq!(eval("false and @n / 0 == 1"), Ok(Value::Boolean(false)));
        assert_eq!(eval("true or @n / 0 == 1"), Ok(Value::Boolean(true)));
    }
}
