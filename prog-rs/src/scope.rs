//! Compile-time lexical scope.
//!
//! A [`LexicalScope`] maps variable names to their declared types while a
//! prog is being compiled.  Block compilers clone the incoming scope before
//! compiling their interior, so declarations inside a block vanish with the
//! clone once the block is finished.

use std::collections::HashMap;

use crate::types::ProgVariableType;

/// Name of the reserved slot that `return <expr>` writes to.
pub const RETURN_SLOT: &str = "return";

/// Words that may not be used as variable names.
const RESERVED: &[&str] = &[
    RETURN_SLOT, "var", "as", "if", "elseif", "else", "end", "for", "foreach", "in", "while",
    "switch", "case", "default", "break", "continue", "delay", "true", "false", "null", "and",
    "or", "not",
];

/// Returns `true` if `name` is a language keyword.
pub fn is_reserved(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    RESERVED.contains(&lowered.as_str())
}

/// Returns `true` if `name` is a syntactically valid variable name.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Name → type mapping visible at one point of a prog's source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LexicalScope {
    variables: HashMap<String, ProgVariableType>,
}

impl LexicalScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a visible variable (case-insensitive).
    pub fn lookup(&self, name: &str) -> Option<ProgVariableType> {
        self.variables.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// A copy of this scope with one more variable.
    ///
    /// The caller is responsible for rejecting duplicates first.
    pub fn with_variable(&self, name: &str, ty: ProgVariableType) -> Self {
        let mut child = self.clone();
        child.variables.insert(name.to_ascii_lowercase(), ty);
        child
    }

    /// Iterate visible variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ProgVariableType)> {
        let mut entries: Vec<_> = self.variables.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let scope = LexicalScope::new().with_variable("Target", ProgVariableType::CHARACTER);
        assert_eq!(scope.lookup("target"), Some(ProgVariableType::CHARACTER));
        assert_eq!(scope.lookup("TARGET"), Some(ProgVariableType::CHARACTER));
    }

    #[test]
    fn child_declarations_do_not_leak() {
        let outer = LexicalScope::new().with_variable("x", ProgVariableType::NUMBER);
        let inner = outer.with_variable("y", ProgVariableType::TEXT);
        assert!(inner.is_declared("x"));
        assert!(inner.is_declared("y"));
        assert!(!outer.is_declared("y"));
    }

    #[test]
    fn name_rules() {
        assert!(is_valid_name("count2"));
        assert!(is_valid_name("a_b"));
        assert!(!is_valid_name("2count"));
        assert!(!is_valid_name("_x"));
        assert!(!is_valid_name(""));
        assert!(is_reserved("Return"));
        assert!(is_reserved("foreach"));
        assert!(!is_reserved("total"));
    }
}
