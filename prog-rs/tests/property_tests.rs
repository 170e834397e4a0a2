use proptest::prelude::*;
use prog::{Prog, ProgDefinition, ProgVariableType, Value};

type T = ProgVariableType;

const BASES: &[T] = &[
    T::NUMBER,
    T::TEXT,
    T::BOOLEAN,
    T::CHARACTER,
    T::ITEM,
    T::LOCATION,
    T::ZONE,
    T::SHARD,
    T::EXIT,
    T::GENDER,
    T::TIMESPAN,
    T::DATETIME,
    T::EFFECT,
    T::PERCEIVER,
    T::PERCEIVABLE,
    T::ANYTHING,
];

const STRUCTURES: &[T] = &[T::EMPTY, T::COLLECTION, T::DICTIONARY, T::COLLECTION_DICTIONARY];

fn any_type() -> impl Strategy<Value = T> {
    (prop::sample::select(BASES), prop::sample::select(STRUCTURES)).prop_map(|(b, s)| b | s)
}

/// Lines built from statement keywords, so the generator reaches the block
/// compilers instead of stopping at the first unrecognised line.
fn statement_line() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "var x as number",
        "var l as text collection",
        "x += 1",
        "if (true)",
        "elseif (@x > 1)",
        "else",
        "end if",
        "for (i : 3)",
        "end for",
        "foreach (s in @l)",
        "end foreach",
        "while (false)",
        "end while",
        "switch (@x)",
        "case (1)",
        "default",
        "end switch",
        "break",
        "continue",
        "return",
        "return @x",
        "additem l 'a'",
        "removeat l 0",
        "delay (1)",
        "end delay",
        "",
        "// note",
    ])
    .prop_map(str::to_owned)
}

proptest! {
    /// The compiler never panics on arbitrary text; it returns Ok or Err.
    #[test]
    fn compiler_does_not_panic_on_text(s in "\\PC*") {
        let _ = Prog::compile_standard(&ProgDefinition::new("fuzz", T::VOID, s));
    }

    /// Bracket nesting either compiles or is rejected, however deep.
    #[test]
    fn nesting_depth_never_aborts(depth in 0usize..4_000) {
        let src = format!("var x as number = {}1{}", "(".repeat(depth), ")".repeat(depth));
        let compiled = Prog::compile_standard(&ProgDefinition::new("deep", T::VOID, src));
        if depth < 90 {
            prop_assert!(compiled.is_ok());
        } else if depth > 110 {
            prop_assert!(compiled.is_err());
        }
    }

    /// Nor on plausible statement soup, and what compiles also runs
    /// to completion or a reported error.
    #[test]
    fn statement_soup_compiles_or_errors(lines in prop::collection::vec(statement_line(), 0..24)) {
        let src = lines.join("\n");
        if let Ok(prog) = Prog::compile_standard(&ProgDefinition::new("soup", T::VOID, src.as_str())) {
            let _ = prog.execute(&[]);
        }
    }

    /// Compile errors always point at a line that exists.
    #[test]
    fn error_lines_are_in_range(lines in prop::collection::vec(statement_line(), 1..16)) {
        let src = lines.join("\n");
        if let Err(e) = Prog::compile_standard(&ProgDefinition::new("soup", T::VOID, src.as_str())) {
            prop_assert!(e.line >= 1 && e.line <= lines.len(), "{e} for {} line(s)", lines.len());
        }
    }

    /// `for (i : n)` runs round(n) times, or not at all when that is below one.
    #[test]
    fn for_iteration_count(n in -20.0f64..60.0) {
        let src = format!("var c as number\nfor (i : {n})\nc += 1\nend for\nreturn @c");
        let prog = Prog::compile_standard(&ProgDefinition::new("count", T::NUMBER, src.as_str())).unwrap();
        let expected = n.round().max(0.0);
        prop_assert_eq!(prog.execute(&[]), Ok(Value::Number(expected)));
    }

    /// Every type is compatible with itself, and markers never matter.
    #[test]
    fn compatibility_is_reflexive(t in any_type()) {
        prop_assert!(t.compatible_with(t));
        prop_assert!(t.compatible_with(t | T::LITERAL));
        prop_assert!((t | T::REFERENCE_TYPE).compatible_with(t));
    }

    /// Differing structure is never compatible.
    #[test]
    fn structure_must_match(a in any_type(), b in any_type()) {
        if a.structure() != b.structure() {
            prop_assert!(!a.compatible_with(b));
        }
    }

    /// Compatibility only narrows: if b fits a and c fits b, then c fits a.
    #[test]
    fn compatibility_is_transitive(a in any_type(), b in any_type(), c in any_type()) {
        if a.compatible_with(b) && b.compatible_with(c) {
            prop_assert!(a.compatible_with(c));
        }
    }

    /// The declared type's name parses back to the same type.
    #[test]
    fn type_names_parse_back(t in any_type()) {
        let name = t.describe().to_lowercase();
        prop_assert_eq!(name.parse::<T>(), Ok(t));
    }
}
