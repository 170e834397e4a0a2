//! Statement recognition.
//!
//! Each statement kind owns an anchored, case-insensitive pattern.  The
//! dispatcher tries them in a fixed order and hands the first match to that
//! kind's compile function, which consumes its own line plus, for block
//! statements, every line up to and including the block's terminator.

use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::{Captures, Regex, RegexBuilder};

use super::{
    assign, call, collection, conditional, declare, delay, jump, loops, sequence_returns, switch,
    Statement,
};
use crate::config::CompilerConfig;
use crate::error::CompileError;
use crate::expr::{ExpressionCompiler, ProgExpression};
use crate::scope::LexicalScope;
use crate::source::SourceLine;
use crate::types::ProgVariableType;

/// Immutable facts about where in a prog a statement is being compiled.
#[derive(Clone, Copy)]
pub struct CompileContext<'a> {
    pub compiler: &'a dyn ExpressionCompiler,
    pub config: &'a CompilerConfig,
    /// Declared return type of the prog, or `Void`.
    pub return_type: ProgVariableType,
    /// Number of blocks enclosing the current line.
    pub depth: usize,
    pub in_loop: bool,
    pub in_switch: bool,
    /// Compiling the body of a `delay` block.
    pub in_delay: bool,
}

impl<'a> CompileContext<'a> {
    pub fn new(
        compiler: &'a dyn ExpressionCompiler,
        config: &'a CompilerConfig,
        return_type: ProgVariableType,
    ) -> Self {
        Self {
            compiler,
            config,
            return_type,
            depth: 0,
            in_loop: false,
            in_switch: false,
            in_delay: false,
        }
    }

    /// Context for the interior of a block opened on `line`.
    pub fn nested(self, line: usize) -> Result<Self, CompileError> {
        let depth = self.depth + 1;
        if depth > self.config.max_nesting_depth {
            return Err(CompileError::new(
                line,
                format!("blocks nested deeper than {}", self.config.max_nesting_depth),
            ));
        }
        Ok(Self { depth, ..self })
    }

    pub fn looping(self) -> Self {
        Self { in_loop: true, ..self }
    }

    pub fn switching(self) -> Self {
        Self { in_switch: true, ..self }
    }

    /// Compile expression text, pinning failures to `line`.
    pub fn expression(
        &self,
        text: &str,
        scope: &LexicalScope,
        line: usize,
    ) -> Result<Rc<dyn ProgExpression>, CompileError> {
        self.compiler
            .compile(text.trim(), scope)
            .map_err(|e| CompileError::new(line, e))
    }

    /// Compile expression text that must produce a value storable as `expected`.
    pub fn typed_expression(
        &self,
        text: &str,
        expected: ProgVariableType,
        what: &str,
        scope: &LexicalScope,
        line: usize,
    ) -> Result<Rc<dyn ProgExpression>, CompileError> {
        let expr = self.expression(text, scope, line)?;
        let actual = expr.return_type();
        if !expected.compatible_with(actual) {
            return Err(CompileError::new(
                line,
                format!("{what} must be {expected}, got {actual}"),
            ));
        }
        Ok(expr)
    }
}

/// A compiled statement plus what is left of the source.
#[derive(Debug)]
pub struct Compiled<'s> {
    pub statement: Statement,
    pub remaining: &'s [SourceLine],
    /// Scope after this statement: the input plus anything it declared.
    pub scope: LexicalScope,
    /// Last source line consumed.
    pub line: usize,
}

impl<'s> Compiled<'s> {
    /// Result for a single-line statement that declares nothing.
    pub(crate) fn single(
        statement: Statement,
        line: &SourceLine,
        remaining: &'s [SourceLine],
        scope: &LexicalScope,
    ) -> Self {
        Self { statement, remaining, scope: scope.clone(), line: line.number }
    }
}

type CompileFn = for<'s> fn(
    &Captures<'_>,
    &SourceLine,
    &'s [SourceLine],
    &LexicalScope,
    &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError>;

struct StatementKind {
    name: &'static str,
    pattern: Regex,
    compile: CompileFn,
}

/// Build a case-insensitive pattern from a constant.
pub(crate) fn pattern(source: &str) -> Regex {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .build()
        .unwrap_or_else(|e| panic!("invalid statement pattern {source:?}: {e}"))
}

/// Recognizers in match order.  Earlier entries shadow later ones.
static STATEMENTS: Lazy<Vec<StatementKind>> = Lazy::new(|| {
    vec![
        kind("declare", declare::PATTERN, declare::compile),
        kind("if", conditional::PATTERN, conditional::compile),
        kind("for", loops::FOR_PATTERN, loops::compile_for),
        kind("foreach", loops::FOREACH_PATTERN, loops::compile_foreach),
        kind("while", loops::WHILE_PATTERN, loops::compile_while),
        kind("switch", switch::PATTERN, switch::compile),
        kind("delay", delay::PATTERN, delay::compile),
        kind("break", jump::BREAK_PATTERN, jump::compile_break),
        kind("continue", jump::CONTINUE_PATTERN, jump::compile_continue),
        kind("return", jump::RETURN_PATTERN, jump::compile_return),
        kind("additem", collection::ADD_PATTERN, collection::compile_add),
        kind("addrange", collection::ADD_RANGE_PATTERN, collection::compile_add_range),
        kind("removeitem", collection::REMOVE_PATTERN, collection::compile_remove),
        kind("removeat", collection::REMOVE_AT_PATTERN, collection::compile_remove_at),
        kind("clearitems", collection::CLEAR_PATTERN, collection::compile_clear),
        kind("setitem", collection::SET_PATTERN, collection::compile_set),
        kind("removekey", collection::REMOVE_KEY_PATTERN, collection::compile_remove_key),
        kind("separator", SEPARATOR_PATTERN, compile_stray_separator),
        kind("compound", assign::COMPOUND_PATTERN, assign::compile_compound),
        kind("assign", assign::PATTERN, assign::compile),
        kind("call", call::PATTERN, call::compile),
    ]
});

fn kind(name: &'static str, source: &str, compile: CompileFn) -> StatementKind {
    StatementKind { name, pattern: pattern(source), compile }
}

/// Block separators and terminators.  Reaching one through the dispatcher
/// means no open block claimed it.
const SEPARATOR_PATTERN: &str =
    r"^(?:else|elseif\b.*|case\b.*|default|end\s*(?:if|for|foreach|while|switch|delay))$";

fn compile_stray_separator<'s>(
    _: &Captures<'_>,
    line: &SourceLine,
    _: &'s [SourceLine],
    _: &LexicalScope,
    _: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    Err(CompileError::new(
        line.number,
        format!("'{}' without a matching block", line.text),
    ))
}

/// Compile the statement starting at `lines[0]`.
pub fn compile_next<'s>(
    lines: &'s [SourceLine],
    scope: &LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Compiled<'s>, CompileError> {
    let (line, rest) = lines
        .split_first()
        .ok_or_else(|| CompileError::new(0, "unexpected end of source"))?;
    for kind in STATEMENTS.iter() {
        if let Some(caps) = kind.pattern.captures(&line.text) {
            tracing::trace!(line = line.number, kind = kind.name, "compiling statement");
            return (kind.compile)(&caps, line, rest, scope, ctx);
        }
    }
    Err(CompileError::new(
        line.number,
        format!("unrecognised statement '{}'", line.text),
    ))
}

/// Compile every line, threading the scope from one statement to the next.
pub fn compile_sequence(
    lines: &[SourceLine],
    scope: LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Vec<Statement>, CompileError> {
    let mut scope = scope;
    let mut rest = lines;
    let mut statements = Vec::new();
    while !rest.is_empty() {
        let compiled = compile_next(rest, &scope, ctx)?;
        statements.push(compiled.statement);
        scope = compiled.scope;
        rest = compiled.remaining;
    }
    Ok(statements)
}

/// Compile a whole prog body.
///
/// A prog with a non-void return type must reach `return` on every path;
/// the failure is reported against the last source line.
pub fn compile_body(
    lines: &[SourceLine],
    scope: LexicalScope,
    ctx: &CompileContext<'_>,
) -> Result<Vec<Statement>, CompileError> {
    let statements = compile_sequence(lines, scope, ctx)?;
    if !ctx.return_type.is_void() && !sequence_returns(&statements) {
        let last = lines.last().map_or(0, |l| l.number);
        return Err(CompileError::new(last, "not all code paths return a value"));
    }
    Ok(statements)
}

/// Interior of a block, up to the line that closed it.
pub(crate) struct Block<'s> {
    pub statements: Vec<Statement>,
    pub terminator: &'s SourceLine,
    /// Source starting at the terminator itself.
    pub from_terminator: &'s [SourceLine],
    /// Source after the terminator.
    pub remaining: &'s [SourceLine],
}

/// Compile block interior lines until `is_end` accepts one.
///
/// `scope` should already be the block's own child scope.  Running out of
/// source is reported against `opening`, the line that started the block.
pub(crate) fn compile_block<'s>(
    opening: &SourceLine,
    keyword: &str,
    lines: &'s [SourceLine],
    scope: LexicalScope,
    ctx: &CompileContext<'_>,
    is_end: impl Fn(&str) -> bool,
) -> Result<Block<'s>, CompileError> {
    let mut scope = scope;
    let mut rest = lines;
    let mut statements = Vec::new();
    loop {
        let Some((next, after)) = rest.split_first() else {
            return Err(CompileError::new(
                opening.number,
                format!("unterminated {keyword} block: missing 'end {keyword}'"),
            ));
        };
        if is_end(&next.text) {
            return Ok(Block {
                statements,
                terminator: next,
                from_terminator: rest,
                remaining: after,
            });
        }
        let compiled = compile_next(rest, &scope, ctx)?;
        statements.push(compiled.statement);
        scope = compiled.scope;
        rest = compiled.remaining;
    }
}

/// Case-insensitive `end <keyword>` matcher, tolerant of `endif` spelling.
pub(crate) fn end_pattern(keyword: &str) -> Regex {
    pattern(&format!(r"^end\s*{keyword}$"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::StandardCompiler;
    use crate::source::prepare_source;

    fn compile(src: &str) -> Result<Vec<Statement>, CompileError> {
        let compiler = StandardCompiler::new();
        let config = CompilerConfig::default();
        let ctx = CompileContext::new(&compiler, &config, ProgVariableType::VOID);
        compile_sequence(&prepare_source(src), LexicalScope::new(), &ctx)
    }

    fn kind_of(src: &str) -> &'static str {
        let lines = prepare_source(src);
        STATEMENTS
            .iter()
            .find(|k| k.pattern.is_match(&lines[0].text))
            .map_or("none", |k| k.name)
    }

    #[test]
    fn recognizer_order() {
        assert_eq!(kind_of("var x as number"), "declare");
        assert_eq!(kind_of("VAR x AS Number = 1"), "declare");
        assert_eq!(kind_of("if (true)"), "if");
        assert_eq!(kind_of("foreach (x in @list)"), "foreach");
        assert_eq!(kind_of("for (i : 3)"), "for");
        assert_eq!(kind_of("case (1)"), "separator");
        assert_eq!(kind_of("end if"), "separator");
        assert_eq!(kind_of("endwhile"), "separator");
        assert_eq!(kind_of("x += 1"), "compound");
        assert_eq!(kind_of("@x = 1"), "assign");
        assert_eq!(kind_of("count(@list)"), "call");
        assert_eq!(kind_of("return"), "return");
        assert_eq!(kind_of("x == 1"), "none");
    }

    #[test]
    fn unknown_statement_reports_its_line() {
        let err = compile("var x as number\n\nfrobnicate the widget").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("unrecognised statement"), "{err}");
    }

    #[test]
    fn stray_terminator() {
        let err = compile("end for").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("without a matching block"), "{err}");
    }

    #[test]
    fn unterminated_block_reports_opening_line() {
        let err = compile("var n as number\nwhile (@n < 3)\nn += 1").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("unterminated while"), "{err}");
    }

    #[test]
    fn nesting_limit() {
        let compiler = StandardCompiler::new();
        let config = CompilerConfig { max_nesting_depth: 2, ..CompilerConfig::default() };
        let ctx = CompileContext::new(&compiler, &config, ProgVariableType::VOID);
        let src = "if (true)\nif (true)\nif (true)\nend if\nend if\nend if";
        let err = compile_sequence(&prepare_source(src), LexicalScope::new(), &ctx).unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("nested deeper than 2"), "{err}");

        let ok = "if (true)\nif (true)\nend if\nend if";
        assert!(compile_sequence(&prepare_source(ok), LexicalScope::new(), &ctx).is_ok());
    }

    #[test]
    fn scope_threads_through_sequence() {
        let src = "var a as number = 1\nvar b as number = @a + 1";
        assert_eq!(compile(src).unwrap().len(), 2);
        let err = compile("var b as number = @a + 1\nvar a as number").unwrap_err();
        assert_eq!(err.line, 1);
    }
}
