//! Typed function library.
//!
//! Each [`Function`] declares its parameter types and return type so calls
//! can be checked when an expression is compiled.  Names are
//! case-insensitive and may be overloaded; the first registered overload
//! whose parameters accept the argument types wins.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::types::ProgVariableType;
use crate::value::Value;

type T = ProgVariableType;

/// Native implementation of a library function.
pub type NativeFn = Rc<dyn Fn(&[Value]) -> Result<Value, String>>;

/// One overload of a library function.
pub struct Function {
    pub name: String,
    pub parameters: Vec<ProgVariableType>,
    pub return_type: ProgVariableType,
    implementation: NativeFn,
}

impl Function {
    /// Invoke with already evaluated arguments.
    pub fn call(&self, args: &[Value]) -> Result<Value, String> {
        (self.implementation)(args)
    }

    fn accepts(&self, args: &[ProgVariableType]) -> bool {
        self.parameters.len() == args.len()
            && self.parameters.iter().zip(args).all(|(p, a)| p.compatible_with(*a))
    }

    /// `name(Type, Type) -> Type`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.parameters.iter().map(|p| p.describe()).collect();
        format!("{}({}) -> {}", self.name, params.join(", "), self.return_type)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

/// Registry of callable functions.
#[derive(Clone, Default)]
pub struct FunctionLibrary {
    functions: HashMap<String, Vec<Rc<Function>>>,
}

impl fmt::Debug for FunctionLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionLibrary").field("functions", &names).finish()
    }
}

impl FunctionLibrary {
    /// An empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an overload.
    pub fn register(
        &mut self,
        name: &str,
        parameters: &[ProgVariableType],
        return_type: ProgVariableType,
        implementation: impl Fn(&[Value]) -> Result<Value, String> + 'static,
    ) {
        let function = Function {
            name: name.to_ascii_lowercase(),
            parameters: parameters.to_vec(),
            return_type,
            implementation: Rc::new(implementation),
        };
        self.functions
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(Rc::new(function));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_ascii_lowercase())
    }

    /// Find the overload of `name` accepting `args`.
    pub fn resolve(&self, name: &str, args: &[ProgVariableType]) -> Result<Rc<Function>, String> {
        let overloads = self
            .functions
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| format!("unknown function {name}"))?;
        overloads.iter().find(|f| f.accepts(args)).cloned().ok_or_else(|| {
            let given: Vec<String> = args.iter().map(|a| a.describe()).collect();
            let known: Vec<String> = overloads.iter().map(|f| f.signature()).collect();
            format!(
                "no overload of {name} accepts ({}); candidates: {}",
                given.join(", "),
                known.join("; ")
            )
        })
    }

    /// The built-in functions every prog can call.
    pub fn standard() -> Self {
        let mut lib = Self::new();

        // ── Collections ──────────────────────────────────────────────────────
        lib.register("count", &[T::ANYTHING | T::COLLECTION], T::NUMBER, |args| {
            Ok(Value::Number(list_arg(args, 0, "count")?.len() as f64))
        });
        lib.register("count", &[T::ANYTHING | T::DICTIONARY], T::NUMBER, |args| match args.first() {
            Some(Value::Dictionary(map)) => Ok(Value::Number(map.borrow().len() as f64)),
            _ => Err("count: expected a dictionary".into()),
        });
        lib.register(
            "count",
            &[T::ANYTHING | T::COLLECTION_DICTIONARY],
            T::NUMBER,
            |args| match args.first() {
                Some(Value::CollectionDictionary(map)) => {
                    Ok(Value::Number(map.borrow().values().map(Vec::len).sum::<usize>() as f64))
                }
                _ => Err("count: expected a collection dictionary".into()),
            },
        );
        lib.register(
            "contains",
            &[T::ANYTHING | T::COLLECTION, T::ANYTHING],
            T::BOOLEAN,
            |args| {
                let items = list_arg(args, 0, "contains")?;
                let needle = args.get(1).ok_or("contains: too few args")?;
                Ok(Value::Boolean(items.contains(needle)))
            },
        );
        lib.register("haskey", &[T::ANYTHING | T::DICTIONARY, T::TEXT], T::BOOLEAN, |args| {
            let key = text_arg(args, 1, "haskey")?;
            match args.first() {
                Some(Value::Dictionary(map)) => Ok(Value::Boolean(map.borrow().contains_key(key))),
                _ => Err("haskey: expected a dictionary".into()),
            }
        });
        lib.register(
            "haskey",
            &[T::ANYTHING | T::COLLECTION_DICTIONARY, T::TEXT],
            T::BOOLEAN,
            |args| {
                let key = text_arg(args, 1, "haskey")?;
                match args.first() {
                    Some(Value::CollectionDictionary(map)) => {
                        Ok(Value::Boolean(map.borrow().contains_key(key)))
                    }
                    _ => Err("haskey: expected a collection dictionary".into()),
                }
            },
        );

        // ── Conversion ───────────────────────────────────────────────────────
        lib.register("tonumber", &[T::TEXT], T::NUMBER, |args| {
            let s = text_arg(args, 0, "tonumber")?;
            s.trim()
                .parse()
                .map(Value::Number)
                .map_err(|_| format!("tonumber: '{s}' is not a number"))
        });
        lib.register("totext", &[T::ANYTHING], T::TEXT, |args| {
            let v = args.first().ok_or("totext: too few args")?;
            Ok(Value::Text(v.to_string()))
        });
        lib.register("isnull", &[T::ANYTHING], T::BOOLEAN, |args| {
            Ok(Value::Boolean(args.first().is_none_or(Value::is_null)))
        });

        // ── Math ─────────────────────────────────────────────────────────────
        lib.register("round", &[T::NUMBER], T::NUMBER, |args| {
            Ok(Value::Number(number_arg(args, 0, "round")?.round()))
        });
        lib.register("abs", &[T::NUMBER], T::NUMBER, |args| {
            Ok(Value::Number(number_arg(args, 0, "abs")?.abs()))
        });
        lib.register("min", &[T::NUMBER, T::NUMBER], T::NUMBER, |args| {
            Ok(Value::Number(number_arg(args, 0, "min")?.min(number_arg(args, 1, "min")?)))
        });
        lib.register("max", &[T::NUMBER, T::NUMBER], T::NUMBER, |args| {
            Ok(Value::Number(number_arg(args, 0, "max")?.max(number_arg(args, 1, "max")?)))
        });

        // ── Text ─────────────────────────────────────────────────────────────
        lib.register("upper", &[T::TEXT], T::TEXT, |args| {
            Ok(Value::Text(text_arg(args, 0, "upper")?.to_uppercase()))
        });
        lib.register("lower", &[T::TEXT], T::TEXT, |args| {
            Ok(Value::Text(text_arg(args, 0, "lower")?.to_lowercase()))
        });
        lib.register("length", &[T::TEXT], T::NUMBER, |args| {
            Ok(Value::Number(text_arg(args, 0, "length")?.chars().count() as f64))
        });

        // ── Entities ─────────────────────────────────────────────────────────
        lib.register("name", &[T::PERCEIVABLE], T::TEXT, |args| match args.first() {
            Some(Value::Entity(e)) => Ok(Value::Text(e.name.clone())),
            Some(Value::Null) | None => Err("name: null reference".into()),
            Some(other) => Err(format!("name: expected an entity, got {other}")),
        });

        lib
    }
}

// ── Argument helpers ──────────────────────────────────────────────────────────

fn number_arg(args: &[Value], i: usize, fname: &str) -> Result<f64, String> {
    args.get(i)
        .and_then(Value::as_number)
        .ok_or_else(|| format!("{fname}: argument {} must be a number", i + 1))
}

fn text_arg<'a>(args: &'a [Value], i: usize, fname: &str) -> Result<&'a str, String> {
    args.get(i)
        .and_then(Value::as_text)
        .ok_or_else(|| format!("{fname}: argument {} must be text", i + 1))
}

fn list_arg(args: &[Value], i: usize, fname: &str) -> Result<Vec<Value>, String> {
    match args.get(i) {
        Some(Value::Collection(items)) => Ok(items.borrow().clone()),
        _ => Err(format!("{fname}: argument {} must be a collection", i + 1)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arg_types: &[ProgVariableType], args: &[Value]) -> Result<Value, String> {
        let lib = FunctionLibrary::standard();
        lib.resolve(name, arg_types)?.call(args)
    }

    #[test]
    fn count_collection() {
        let list = Value::collection([Value::from(1i64), Value::from(2i64)]);
        assert_eq!(
            call("count", &[T::NUMBER | T::COLLECTION], &[list]),
            Ok(Value::Number(2.0))
        );
    }

    #[test]
    fn resolve_picks_overload_by_structure() {
        let lib = FunctionLibrary::standard();
        let f = lib.resolve("COUNT", &[T::TEXT | T::DICTIONARY]).unwrap();
        assert_eq!(f.parameters, vec![T::ANYTHING | T::DICTIONARY]);
    }

    #[test]
    fn resolve_errors() {
        let lib = FunctionLibrary::standard();
        let err = lib.resolve("frobnicate", &[]).unwrap_err();
        assert!(err.contains("unknown function"));
        let err = lib.resolve("upper", &[T::NUMBER]).unwrap_err();
        assert!(err.contains("no overload"), "{err}");
    }

    #[test]
    fn entity_capability_parameter() {
        let bob = Value::entity(T::CHARACTER, 1, "Bob");
        assert_eq!(call("name", &[T::CHARACTER], &[bob]), Ok(Value::from("Bob")));
        assert!(call("name", &[T::CHARACTER], &[Value::Null]).is_err());
    }

    #[test]
    fn conversions() {
        assert_eq!(call("tonumber", &[T::TEXT], &[Value::from(" 42 ")]), Ok(Value::Number(42.0)));
        assert!(call("tonumber", &[T::TEXT], &[Value::from("abc")]).is_err());
        assert_eq!(call("totext", &[T::NUMBER], &[Value::Number(3.0)]), Ok(Value::from("3")));
        assert_eq!(call("isnull", &[T::ITEM], &[Value::Null]), Ok(Value::Boolean(true)));
    }

    #[test]
    fn host_registration() {
        let mut lib = FunctionLibrary::new();
        lib.register("double", &[T::NUMBER], T::NUMBER, |args| {
            Ok(Value::Number(number_arg(args, 0, "double")? * 2.0))
        });
        assert!(lib.contains("Double"));
        let f = lib.resolve("double", &[T::NUMBER | T::LITERAL]).unwrap();
        assert_eq!(f.call(&[Value::Number(4.0)]), Ok(Value::Number(8.0)));
        assert_eq!(f.signature(), "double(Number) -> Number");
    }
}
