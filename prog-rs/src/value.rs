//! Runtime values for the Prog language.
//!
//! Plain values (`Number`, `Text`, `Boolean`, entity handles) are copied on
//! assignment.  Structural values wrap an `Rc<RefCell<..>>`, so every binding
//! that holds the same collection observes in-place mutation.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::types::ProgVariableType;

/// Shared ordered sequence backing a collection value.
pub type SharedList = Rc<RefCell<Vec<Value>>>;
/// Shared text → value map backing a dictionary value.
pub type SharedMap = Rc<RefCell<BTreeMap<String, Value>>>;
/// Shared text → sequence map backing a collection-dictionary value.
pub type SharedMultiMap = Rc<RefCell<BTreeMap<String, Vec<Value>>>>;

/// Opaque handle to a host-owned game-world entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub kind: ProgVariableType,
    pub id: i64,
    pub name: String,
}

/// A Prog runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// No value: the default for entity-typed variables and void progs.
    #[default]
    Null,
    Number(f64),
    Text(String),
    Boolean(bool),
    Entity(EntityRef),
    Collection(SharedList),
    Dictionary(SharedMap),
    CollectionDictionary(SharedMultiMap),
}

impl Value {
    /// The initial value of a freshly declared variable of type `ty`.
    pub fn default_for(ty: ProgVariableType) -> Value {
        let ty = ty.without_markers();
        if ty.contains(ProgVariableType::COLLECTION_DICTIONARY) {
            Value::CollectionDictionary(Rc::default())
        } else if ty.contains(ProgVariableType::DICTIONARY) {
            Value::Dictionary(Rc::default())
        } else if ty.contains(ProgVariableType::COLLECTION) {
            Value::Collection(Rc::default())
        } else if ty == ProgVariableType::NUMBER {
            Value::Number(0.0)
        } else if ty == ProgVariableType::TEXT {
            Value::Text(String::new())
        } else if ty == ProgVariableType::BOOLEAN {
            Value::Boolean(false)
        } else {
            Value::Null
        }
    }

    pub fn entity(kind: ProgVariableType, id: i64, name: impl Into<String>) -> Value {
        Value::Entity(EntityRef { kind, id, name: name.into() })
    }

    /// Build a fresh collection from an iterator of values.
    pub fn collection(items: impl IntoIterator<Item = Value>) -> Value {
        Value::Collection(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The most specific type describing this value.
    ///
    /// Structural values report their modifier over `Anything`, since an
    /// empty collection carries no element type of its own.
    pub fn type_of(&self) -> ProgVariableType {
        match self {
            Value::Null => ProgVariableType::VOID,
            Value::Number(_) => ProgVariableType::NUMBER,
            Value::Text(_) => ProgVariableType::TEXT,
            Value::Boolean(_) => ProgVariableType::BOOLEAN,
            Value::Entity(e) => e.kind,
            Value::Collection(_) => ProgVariableType::ANYTHING | ProgVariableType::COLLECTION,
            Value::Dictionary(_) => ProgVariableType::ANYTHING | ProgVariableType::DICTIONARY,
            Value::CollectionDictionary(_) => {
                ProgVariableType::ANYTHING | ProgVariableType::COLLECTION_DICTIONARY
            }
        }
    }
}

impl PartialEq for Value {
    /// Value equality: structural values compare by contents.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Entity(a), Value::Entity(b)) => a.kind == b.kind && a.id == b.id,
            (Value::Collection(a), Value::Collection(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Dictionary(a), Value::Dictionary(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::CollectionDictionary(a), Value::CollectionDictionary(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Number(n) => {
                // Integral numbers print without a fractional part.
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::Text(s) => f.write_str(s),
            Value::Boolean(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Entity(e) => f.write_str(&e.name),
            Value::Collection(items) => {
                let items = items.borrow();
                let parts: Vec<String> = items.iter().map(Value::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Dictionary(map) => {
                let map = map.borrow();
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::CollectionDictionary(map) => {
                let map = map.borrow();
                let parts: Vec<String> = map
                    .iter()
                    .map(|(k, vs)| {
                        let inner: Vec<String> = vs.iter().map(Value::to_string).collect();
                        format!("{k}: [{}]", inner.join(", "))
                    })
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
