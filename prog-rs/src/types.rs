//! Prog variable types.
//!
//! A [`ProgVariableType`] packs a base kind and structural modifiers into a
//! single `u64`.  Base kinds occupy the low 32 bits (one bit each, so
//! capability types such as [`ProgVariableType::PERCEIVABLE`] are plain
//! unions); modifiers live in the high bits and compose with `|`.
//!
//! ```rust
//! use prog::ProgVariableType as T;
//!
//! let numbers = T::NUMBER | T::COLLECTION;
//! assert!(numbers.contains(T::COLLECTION));
//! assert_eq!(numbers ^ T::COLLECTION, T::NUMBER);
//! assert_eq!(numbers.describe(), "Number Collection");
//! ```

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, BitXor};
use std::str::FromStr;

/// Bit-flag type descriptor used for all compile-time type checking.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProgVariableType(u64);

impl ProgVariableType {
    // ── Base kinds (low bits) ─────────────────────────────────────────────
    pub const VOID: Self      = Self(0x0001);
    pub const NUMBER: Self    = Self(0x0002);
    pub const TEXT: Self      = Self(0x0004);
    pub const BOOLEAN: Self   = Self(0x0008);
    pub const CHARACTER: Self = Self(0x0010);
    pub const ITEM: Self      = Self(0x0020);
    pub const LOCATION: Self  = Self(0x0040);
    pub const ZONE: Self      = Self(0x0080);
    pub const SHARD: Self     = Self(0x0100);
    pub const EXIT: Self      = Self(0x0200);
    pub const GENDER: Self    = Self(0x0400);
    pub const TIMESPAN: Self  = Self(0x0800);
    pub const DATETIME: Self  = Self(0x1000);
    pub const EFFECT: Self    = Self(0x2000);

    // ── Capability kinds (unions of base bits) ────────────────────────────
    /// Anything that can perceive: characters, items and locations.
    pub const PERCEIVER: Self = Self(0x0010 | 0x0020 | 0x0040);
    /// Anything that can be perceived.
    pub const PERCEIVABLE: Self = Self(0x0010 | 0x0020 | 0x0040 | 0x0080 | 0x0100 | 0x0200);
    /// Every base kind except `Void`.
    pub const ANYTHING: Self = Self(Self::BASE_MASK & !0x0001);

    // ── Modifiers (high bits) ─────────────────────────────────────────────
    pub const COLLECTION: Self            = Self(1 << 32);
    pub const DICTIONARY: Self            = Self(1 << 33);
    pub const COLLECTION_DICTIONARY: Self = Self(1 << 34);
    /// Marks the type of a constant expression.  Ignored by compatibility.
    pub const LITERAL: Self               = Self(1 << 35);
    /// Marks a by-reference parameter type.  Ignored by compatibility.
    pub const REFERENCE_TYPE: Self        = Self(1 << 36);

    const BASE_MASK: u64 = 0x3fff;
    const STRUCTURE_MASK: u64 = (1 << 32) | (1 << 33) | (1 << 34);
    const MARKER_MASK: u64 = (1 << 35) | (1 << 36);

    /// The empty set of flags (not a valid type on its own).
    pub const EMPTY: Self = Self(0);

    // ── Inspection ────────────────────────────────────────────────────────

    /// Returns `true` if all bits in `other` are set in `self`.
    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// The base-kind bits without any modifier.
    #[inline]
    pub fn base(self) -> Self {
        Self(self.0 & Self::BASE_MASK)
    }

    /// Only the structural modifier bits.
    #[inline]
    pub fn structure(self) -> Self {
        Self(self.0 & Self::STRUCTURE_MASK)
    }

    /// `self` with the `Literal` / `ReferenceType` markers removed.
    #[inline]
    pub fn without_markers(self) -> Self {
        Self(self.0 & !Self::MARKER_MASK)
    }

    /// `true` for collection, dictionary and collection-dictionary types.
    #[inline]
    pub fn is_structural(self) -> bool {
        self.0 & Self::STRUCTURE_MASK != 0
    }

    #[inline]
    pub fn is_void(self) -> bool {
        self.without_markers() == Self::VOID
    }

    /// Remove a structural modifier that is known to be present.
    ///
    /// # Panics
    ///
    /// Panics if `flag` is not set.  Callers check [`contains`](Self::contains)
    /// first; reaching the panic means a compile-time check was skipped.
    pub fn strip(self, flag: Self) -> Self {
        assert!(
            self.contains(flag),
            "cannot strip {flag:?} from {self:?}: flag not present"
        );
        self ^ flag
    }

    /// The element type of a structural type, or `None` for plain types.
    pub fn element_type(self) -> Option<Self> {
        let ty = self.without_markers();
        [Self::COLLECTION, Self::DICTIONARY, Self::COLLECTION_DICTIONARY]
            .into_iter()
            .find(|flag| ty.contains(*flag))
            .map(|flag| ty.strip(flag))
    }

    // ── Compatibility ─────────────────────────────────────────────────────

    /// Can a value of type `candidate` be stored where `self` is expected?
    ///
    /// Markers are ignored and structural modifiers must match exactly.  Base
    /// kinds match when equal, or when the candidate's kinds are a subset of
    /// the expected capability (`Character` fits `Perceivable`, not the other
    /// way round).  `Void` is only compatible with itself.
    pub fn compatible_with(self, candidate: Self) -> bool {
        let expected = self.without_markers();
        let candidate = candidate.without_markers();
        if expected.structure() != candidate.structure() {
            return false;
        }
        let (want, have) = (expected.base().0, candidate.base().0);
        if want == have {
            return true;
        }
        if want & Self::VOID.0 != 0 || have & Self::VOID.0 != 0 {
            return false;
        }
        have != 0 && have & !want == 0
    }

    // ── Naming ────────────────────────────────────────────────────────────

    /// Human-readable name, e.g. `"Number"`, `"Text Dictionary"`.
    pub fn describe(self) -> String {
        let ty = self.without_markers();
        let mut name = describe_base(ty.base());
        if ty.contains(Self::COLLECTION_DICTIONARY) {
            name.push_str(" CollectionDictionary");
        } else if ty.contains(Self::DICTIONARY) {
            name.push_str(" Dictionary");
        } else if ty.contains(Self::COLLECTION) {
            name.push_str(" Collection");
        }
        name
    }
}

/// Named base kinds, capabilities first so unions get their proper name.
const BASE_NAMES: &[(ProgVariableType, &str)] = &[
    (ProgVariableType::ANYTHING, "Anything"),
    (ProgVariableType::PERCEIVABLE, "Perceivable"),
    (ProgVariableType::PERCEIVER, "Perceiver"),
    (ProgVariableType::VOID, "Void"),
    (ProgVariableType::NUMBER, "Number"),
    (ProgVariableType::TEXT, "Text"),
    (ProgVariableType::BOOLEAN, "Boolean"),
    (ProgVariableType::CHARACTER, "Character"),
    (ProgVariableType::ITEM, "Item"),
    (ProgVariableType::LOCATION, "Location"),
    (ProgVariableType::ZONE, "Zone"),
    (ProgVariableType::SHARD, "Shard"),
    (ProgVariableType::EXIT, "Exit"),
    (ProgVariableType::GENDER, "Gender"),
    (ProgVariableType::TIMESPAN, "TimeSpan"),
    (ProgVariableType::DATETIME, "DateTime"),
    (ProgVariableType::EFFECT, "Effect"),
];

fn describe_base(base: ProgVariableType) -> String {
    if let Some((_, name)) = BASE_NAMES.iter().find(|(ty, _)| *ty == base) {
        return (*name).to_owned();
    }
    let parts: Vec<&str> = BASE_NAMES
        .iter()
        .filter(|(ty, _)| ty.0.count_ones() == 1 && base.contains(*ty))
        .map(|(_, name)| *name)
        .collect();
    if parts.is_empty() {
        "Unknown".to_owned()
    } else {
        parts.join(" or ")
    }
}

impl fmt::Display for ProgVariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl fmt::Debug for ProgVariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProgVariableType({}", self.describe())?;
        if self.contains(Self::LITERAL) {
            f.write_str(", literal")?;
        }
        if self.contains(Self::REFERENCE_TYPE) {
            f.write_str(", reference")?;
        }
        f.write_str(")")
    }
}

impl BitOr for ProgVariableType {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ProgVariableType {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ProgVariableType {
    type Output = Self;
    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitXor for ProgVariableType {
    type Output = Self;
    #[inline]
    fn bitxor(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

impl FromStr for ProgVariableType {
    type Err = String;

    /// Parse a source type name such as `number`, `text collection` or
    /// `perceivable dictionary`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let mut words = lowered.split_whitespace();
        let base_word = words.next().ok_or_else(|| "missing type name".to_owned())?;
        let base = match base_word {
            "void" => Self::VOID,
            "number" => Self::NUMBER,
            "text" => Self::TEXT,
            "boolean" | "bool" => Self::BOOLEAN,
            "character" => Self::CHARACTER,
            "item" => Self::ITEM,
            "location" => Self::LOCATION,
            "zone" => Self::ZONE,
            "shard" => Self::SHARD,
            "exit" => Self::EXIT,
            "gender" => Self::GENDER,
            "timespan" => Self::TIMESPAN,
            "datetime" => Self::DATETIME,
            "effect" => Self::EFFECT,
            "perceiver" => Self::PERCEIVER,
            "perceivable" => Self::PERCEIVABLE,
            "anything" => Self::ANYTHING,
            other => return Err(format!("unknown type '{other}'")),
        };
        let modifier = match words.next() {
            None => Self::EMPTY,
            Some("collection") => Self::COLLECTION,
            Some("dictionary") => Self::DICTIONARY,
            Some("collectiondictionary") => Self::COLLECTION_DICTIONARY,
            Some(other) => return Err(format!("unknown type modifier '{other}'")),
        };
        if let Some(extra) = words.next() {
            return Err(format!("unexpected '{extra}' in type name"));
        }
        if base == Self::VOID && modifier != Self::EMPTY {
            return Err("void cannot be a collection or dictionary".to_owned());
        }
        Ok(base | modifier)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
