//! Compiled type representation: the result of resolving a `type`
//! statement through its full `typedef` chain with every restriction
//! tightened monotonically against its base.

use std::rc::Rc;
use std::sync::OnceLock;

use yang_core::Symbol;

use crate::expr::CompiledExpr;
use crate::identity::IdentityId;

/// The nineteen YANG built-in types plus `union`/`leafref`/`identityref`/
/// `instance-identifier`, which carry structured payloads rather than a
/// bare numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Builtin {
    Binary = 0,
    Bits = 1,
    Boolean = 2,
    Decimal64 = 3,
    Empty = 4,
    Enumeration = 5,
    Identityref = 6,
    InstanceIdentifier = 7,
    Int8 = 8,
    Int16 = 9,
    Int32 = 10,
    Int64 = 11,
    Leafref = 12,
    String = 13,
    Uint8 = 14,
    Uint16 = 15,
    Uint32 = 16,
    Uint64 = 17,
    Union = 18,
}

impl Builtin {
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            Builtin::Int8
                | Builtin::Int16
                | Builtin::Int32
                | Builtin::Int64
                | Builtin::Uint8
                | Builtin::Uint16
                | Builtin::Uint32
                | Builtin::Uint64
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Builtin::Int8 | Builtin::Int16 | Builtin::Int32 | Builtin::Int64
        )
    }
}

/// An inclusive numeric interval, generic over signed/unsigned/decimal
/// representation by storing everything as `i64`; `decimal64` values are
/// stored pre-scaled by `10^fraction_digits` the way the restriction
/// tightening arithmetic wants them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub min: i64,
    pub max: i64,
}

impl Interval {
    pub fn contains(self, other: Interval) -> bool {
        self.min <= other.min && other.max <= self.max
    }
}

/// A `range` or `length` restriction: one or more disjoint, ascending
/// intervals.
#[derive(Debug, Clone, Default)]
pub struct RestrictionSet {
    pub intervals: Vec<Interval>,
}

impl RestrictionSet {
    /// Whether `self` is a subset of (or equal to) `base` — the monotonic
    /// tightening rule every derived restriction must satisfy.
    pub fn is_tightening_of(&self, base: &RestrictionSet) -> bool {
        if base.intervals.is_empty() {
            return true;
        }
        self.intervals.iter().all(|iv| {
            base.intervals
                .iter()
                .any(|base_iv| base_iv.contains(*iv))
        })
    }

    pub fn accepts(&self, value: i64) -> bool {
        self.intervals.iter().any(|iv| iv.min <= value && value <= iv.max)
    }
}

/// A compiled `pattern` restriction: the DFA the pattern compiled to, plus
/// whether `modifier invert-match` was set.
#[derive(Clone)]
pub struct Pattern {
    pub source: String,
    pub invert_match: bool,
    dfa_bytes: Vec<u8>,
}

impl std::fmt::Debug for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pattern")
            .field("source", &self.source)
            .field("invert_match", &self.invert_match)
            .finish_non_exhaustive()
    }
}

impl Pattern {
    pub fn new(source: String, invert_match: bool, dfa_bytes: Vec<u8>) -> Self {
        Self {
            source,
            invert_match,
            dfa_bytes,
        }
    }

    pub fn is_match(&self, text: &str) -> Result<bool, String> {
        let dfa = crate::dfa::deserialize_dfa(&self.dfa_bytes)?;
        let matched = regex_automata::dfa::Automaton::try_search_fwd(
            &dfa,
            &regex_automata::Input::new(text),
        )
        .map_err(|e| e.to_string())?
        .is_some();
        Ok(matched ^ self.invert_match)
    }
}

#[derive(Debug, Clone)]
pub struct EnumItem {
    pub name: Symbol,
    pub value: i64,
}

#[derive(Debug, Clone)]
pub struct BitItem {
    pub name: Symbol,
    pub position: u32,
}

/// The fully resolved, restriction-tightened type of a leaf/leaf-list or
/// typedef. Shared (`Rc`) because many schema nodes can point at the same
/// compiled typedef.
#[derive(Debug)]
pub struct CompiledType {
    pub name: Option<Symbol>,
    pub builtin: Builtin,
    pub payload: TypePayload,
}

#[derive(Debug)]
pub enum TypePayload {
    Integral {
        range: RestrictionSet,
    },
    Decimal64 {
        fraction_digits: u8,
        range: RestrictionSet,
    },
    StringLike {
        length: RestrictionSet,
        patterns: Vec<Pattern>,
    },
    Binary {
        length: RestrictionSet,
    },
    Boolean,
    Empty,
    Enumeration(Vec<EnumItem>),
    Bits(Vec<BitItem>),
    Union(Vec<Rc<CompiledType>>),
    Leafref {
        path: Rc<CompiledExpr>,
        require_instance: bool,
        /// Resolved lazily once the referenced target node is compiled
        /// (leafref resolution is deferred to the end of a dependency
        /// set's schema-compile phase).
        target: OnceLock<Rc<CompiledType>>,
    },
    Identityref {
        bases: Vec<IdentityId>,
    },
    InstanceIdentifier {
        require_instance: bool,
    },
}

/// Parses a decimal64 lexical value (RFC 7950 §9.3.1: `[-+]?digit+('.'
/// digit+)?`) into its pre-scaled `i64` representation, i.e. the value
/// multiplied by `10^fraction_digits`. Returns `None` for malformed text or
/// a fractional part longer than `fraction_digits` allows.
pub fn parse_decimal64(value: &str, fraction_digits: u8) -> Option<i64> {
    let (negative, rest) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, f),
        None => (rest, ""),
    };
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if frac_part.len() > fraction_digits as usize {
        return None;
    }
    let scale = 10i64.checked_pow(fraction_digits as u32)?;
    let int_value: i64 = int_part.parse().ok()?;
    let frac_scale = 10i64.checked_pow(fraction_digits as u32 - frac_part.len() as u32)?;
    let frac_value: i64 = if frac_part.is_empty() {
        0
    } else {
        frac_part.parse::<i64>().ok()? * frac_scale
    };
    let magnitude = int_value.checked_mul(scale)?.checked_add(frac_value)?;
    Some(if negative { -magnitude } else { magnitude })
}

impl CompiledType {
    /// Whether `value` (as canonical lexical text) is acceptable for this
    /// type, ignoring leafref/instance-identifier/identityref referential
    /// checks (those run as a separate validator pass since they need the
    /// data tree and the identity DAG). `dict` resolves the `Symbol`s
    /// stored in enum/bits members back to text for comparison.
    pub fn accepts_lexical(&self, dict: &yang_core::Interner, value: &str) -> bool {
        match &self.payload {
            TypePayload::Integral { range } => value
                .parse::<i64>()
                .map(|v| range.accepts(v))
                .unwrap_or(false),
            TypePayload::Decimal64 {
                range,
                fraction_digits,
            } => parse_decimal64(value, *fraction_digits)
                .map(|v| range.accepts(v))
                .unwrap_or(false),
            TypePayload::StringLike { length, patterns } => {
                let len = value.chars().count() as i64;
                if !length.intervals.is_empty() && !length.accepts(len) {
                    return false;
                }
                patterns.iter().all(|p| p.is_match(value).unwrap_or(false))
            }
            TypePayload::Binary { length } => {
                let decoded_len = (value.len() as i64 * 3) / 4;
                length.intervals.is_empty() || length.accepts(decoded_len)
            }
            TypePayload::Boolean => matches!(value, "true" | "false"),
            TypePayload::Empty => false,
            TypePayload::Enumeration(items) => {
                items.iter().any(|e| dict.try_resolve(e.name) == Some(value))
            }
            TypePayload::Bits(items) => value
                .split_whitespace()
                .all(|name| items.iter().any(|b| dict.try_resolve(b.name) == Some(name))),
            TypePayload::Union(members) => {
                members.iter().any(|m| m.accepts_lexical(dict, value))
            }
            TypePayload::Leafref { .. } => true,
            TypePayload::Identityref { .. } => true,
            TypePayload::InstanceIdentifier { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tightening_subset_of_base() {
        let base = RestrictionSet {
            intervals: vec![Interval { min: 0, max: 100 }],
        };
        let tightened = RestrictionSet {
            intervals: vec![Interval { min: 10, max: 20 }],
        };
        assert!(tightened.is_tightening_of(&base));
        let not_tightened = RestrictionSet {
            intervals: vec![Interval { min: 50, max: 150 }],
        };
        assert!(!not_tightened.is_tightening_of(&base));
    }

    #[test]
    fn integral_range_accepts() {
        let range = RestrictionSet {
            intervals: vec![Interval { min: 1, max: 10 }, Interval { min: 20, max: 30 }],
        };
        assert!(range.accepts(5));
        assert!(range.accepts(25));
        assert!(!range.accepts(15));
    }

    #[test]
    fn decimal64_parses_fixed_point() {
        assert_eq!(parse_decimal64("3.14", 2), Some(314));
        assert_eq!(parse_decimal64("-3.14", 2), Some(-314));
        assert_eq!(parse_decimal64("3.1", 2), Some(310));
        assert_eq!(parse_decimal64("3", 2), Some(300));
        assert_eq!(parse_decimal64("+3", 2), Some(300));
    }

    #[test]
    fn decimal64_rejects_malformed_or_overscaled() {
        assert_eq!(parse_decimal64("3.145", 2), None);
        assert_eq!(parse_decimal64("3.1a", 2), None);
        assert_eq!(parse_decimal64("", 2), None);
        assert_eq!(parse_decimal64(".5", 2), None);
    }
}
