//! Compiles a parsed `type` statement (plus the typedef chain it derives
//! from) into a [`CompiledType`], enforcing RFC 7950 §9's rule that a
//! derived type's restrictions may only ever tighten its base type's.

use std::collections::HashMap;
use std::rc::Rc;

use regex_automata::dfa::dense;
use regex_syntax::ast;

use yang_core::{Context, Symbol};
use yang_schema::types::{
    Builtin, CompiledType, EnumItem, BitItem, Interval, Pattern, RestrictionSet, TypePayload,
};
use yang_schema::{IdentityGraph, Stmt, StmtKeyword};

#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    #[error("unknown type '{0}'")]
    UnknownType(String),
    #[error("'{0}' restriction does not tighten its base type's")]
    NotATightening(&'static str),
    #[error("invalid pattern '{0}': {1}")]
    Pattern(String, String),
    #[error("invalid leafref path '{0}': {1}")]
    Path(String, String),
    #[error("'{0}' requires a '{1}' substatement")]
    MissingSubstatement(&'static str, &'static str),
    #[error("invalid numeric literal '{0}'")]
    InvalidNumber(String),
}

/// Typedefs visible at the point a `type` statement is compiled, keyed by
/// name (prefix resolution to the defining module happens one layer up, in
/// the schema compiler, before this table is populated).
#[derive(Debug, Default)]
pub struct TypedefScope {
    typedefs: HashMap<Symbol, Rc<CompiledType>>,
}

impl TypedefScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: Symbol, ty: Rc<CompiledType>) {
        self.typedefs.insert(name, ty);
    }

    pub fn get(&self, name: Symbol) -> Option<&Rc<CompiledType>> {
        self.typedefs.get(&name)
    }
}

fn builtin_from_name(name: &str) -> Option<Builtin> {
    Some(match name {
        "binary" => Builtin::Binary,
        "bits" => Builtin::Bits,
        "boolean" => Builtin::Boolean,
        "decimal64" => Builtin::Decimal64,
        "empty" => Builtin::Empty,
        "enumeration" => Builtin::Enumeration,
        "identityref" => Builtin::Identityref,
        "instance-identifier" => Builtin::InstanceIdentifier,
        "int8" => Builtin::Int8,
        "int16" => Builtin::Int16,
        "int32" => Builtin::Int32,
        "int64" => Builtin::Int64,
        "leafref" => Builtin::Leafref,
        "string" => Builtin::String,
        "uint8" => Builtin::Uint8,
        "uint16" => Builtin::Uint16,
        "uint32" => Builtin::Uint32,
        "uint64" => Builtin::Uint64,
        "union" => Builtin::Union,
        _ => return None,
    })
}

fn builtin_default_range(builtin: Builtin) -> Option<RestrictionSet> {
    let (min, max) = match builtin {
        Builtin::Int8 => (i8::MIN as i64, i8::MAX as i64),
        Builtin::Int16 => (i16::MIN as i64, i16::MAX as i64),
        Builtin::Int32 => (i32::MIN as i64, i32::MAX as i64),
        Builtin::Int64 => (i64::MIN, i64::MAX),
        Builtin::Uint8 => (0, u8::MAX as i64),
        Builtin::Uint16 => (0, u16::MAX as i64),
        Builtin::Uint32 => (0, u32::MAX as i64),
        Builtin::Uint64 => (0, i64::MAX),
        _ => return None,
    };
    Some(RestrictionSet {
        intervals: vec![Interval { min, max }],
    })
}

/// XSD patterns are implicitly fully anchored and have no backreferences,
/// lookaround, or named captures; `regex-automata`'s DFA builder can't
/// represent any of those anyway, but parsing with `regex-syntax` first
/// gives a pattern-specific error instead of a generic DFA build failure.
fn check_pattern_syntax(source: &str) -> Result<(), TypeError> {
    let parsed = ast::parse::ParserBuilder::new().octal(false).build().parse(source);
    match parsed {
        Ok(_) => Ok(()),
        Err(e) => {
            let reason = match e.kind() {
                ast::ErrorKind::UnsupportedBackreference => "backreferences are not supported",
                ast::ErrorKind::UnsupportedLookAround => "lookaround assertions are not supported",
                kind => return Err(TypeError::Pattern(source.to_string(), kind.to_string())),
            };
            Err(TypeError::Pattern(source.to_string(), reason.to_string()))
        }
    }
}

fn compile_pattern(ctx: &Context, stmt: &Stmt) -> Result<Pattern, TypeError> {
    let source_sym = stmt
        .argument
        .ok_or_else(|| TypeError::MissingSubstatement("pattern", "argument"))?;
    let source = ctx.dict().resolve(source_sym).to_string();
    let invert_match = stmt
        .child(StmtKeyword::ModifierInvertMatch)
        .and_then(|m| m.argument)
        .map(|sym| ctx.dict().resolve(sym) == "invert-match")
        .unwrap_or(false);

    check_pattern_syntax(&source)?;

    let dense_dfa = dense::DFA::builder()
        .configure(
            dense::DFA::config()
                .start_kind(regex_automata::dfa::StartKind::Unanchored)
                .minimize(true),
        )
        .build(&source)
        .map_err(|e| TypeError::Pattern(source.clone(), e.to_string()))?;
    let sparse_dfa = dense_dfa
        .to_sparse()
        .map_err(|e| TypeError::Pattern(source.clone(), e.to_string()))?;
    let dfa_bytes = sparse_dfa.to_bytes_little_endian();

    Ok(Pattern::new(source, invert_match, dfa_bytes))
}

fn parse_bound(text: &str) -> Result<i64, TypeError> {
    match text {
        "min" => Ok(i64::MIN),
        "max" => Ok(i64::MAX),
        _ => text
            .parse::<i64>()
            .map_err(|_| TypeError::InvalidNumber(text.to_string())),
    }
}

fn compile_range_like_generic(
    ctx: &Context,
    stmt: &Stmt,
    parse: impl Fn(&str) -> Result<i64, TypeError>,
) -> Result<RestrictionSet, TypeError> {
    let arg = stmt
        .argument
        .ok_or_else(|| TypeError::MissingSubstatement("range", "argument"))?;
    let text = ctx.dict().resolve(arg).to_string();
    let mut intervals = Vec::new();
    for part in text.split('|') {
        let part = part.trim();
        let (lo, hi) = match part.split_once("..") {
            Some((a, b)) => (a.trim(), b.trim()),
            None => (part, part),
        };
        intervals.push(Interval {
            min: parse(lo)?,
            max: parse(hi)?,
        });
    }
    Ok(RestrictionSet { intervals })
}

fn compile_range_like(ctx: &Context, stmt: &Stmt) -> Result<RestrictionSet, TypeError> {
    compile_range_like_generic(ctx, stmt, parse_bound)
}

fn parse_decimal64_bound(text: &str, fraction_digits: u8) -> Result<i64, TypeError> {
    match text {
        "min" => Ok(i64::MIN),
        "max" => Ok(i64::MAX),
        _ => yang_schema::types::parse_decimal64(text, fraction_digits)
            .ok_or_else(|| TypeError::InvalidNumber(text.to_string())),
    }
}

/// Compiles a decimal64 `range` statement, whose bounds are fixed-point
/// lexical values (e.g. `"1.5..3.5"`) rather than plain integers, scaled by
/// `fraction_digits` to match how decimal64 values are stored.
fn compile_decimal64_range(ctx: &Context, stmt: &Stmt, fraction_digits: u8) -> Result<RestrictionSet, TypeError> {
    compile_range_like_generic(ctx, stmt, |text| parse_decimal64_bound(text, fraction_digits))
}

fn compile_enums(ctx: &Context, stmt: &Stmt) -> Vec<EnumItem> {
    let mut next_value = 0i64;
    stmt.children(StmtKeyword::Enum)
        .map(|e| {
            let name = e.argument.expect("enum requires an argument");
            let value = e
                .child(StmtKeyword::Value)
                .and_then(|v| v.argument)
                .map(|sym| {
                    ctx.dict()
                        .resolve(sym)
                        .parse::<i64>()
                        .unwrap_or(next_value)
                })
                .unwrap_or(next_value);
            next_value = value + 1;
            EnumItem { name, value }
        })
        .collect()
}

fn compile_bits(ctx: &Context, stmt: &Stmt) -> Vec<BitItem> {
    let mut next_position = 0u32;
    stmt.children(StmtKeyword::Bit)
        .map(|b| {
            let name = b.argument.expect("bit requires an argument");
            let position = b
                .child(StmtKeyword::Position)
                .and_then(|p| p.argument)
                .map(|sym| {
                    ctx.dict()
                        .resolve(sym)
                        .parse::<u32>()
                        .unwrap_or(next_position)
                })
                .unwrap_or(next_position);
            next_position = position + 1;
            BitItem { name, position }
        })
        .collect()
}

/// Compile a `type` statement against the typedefs and builtins visible at
/// its point of use. `identities` resolves `identityref`/`base` target
/// names against the compiling module's identity graph.
pub fn compile_type(
    ctx: &Context,
    stmt: &Stmt,
    scope: &TypedefScope,
    identities: &IdentityGraph,
) -> Result<CompiledType, TypeError> {
    let name_sym = stmt
        .argument
        .ok_or_else(|| TypeError::MissingSubstatement("type", "argument"))?;
    let name_text = ctx.dict().resolve(name_sym).to_string();

    if let Some(builtin) = builtin_from_name(&name_text) {
        return compile_builtin(ctx, stmt, name_sym, builtin, identities);
    }

    // Not a builtin name: must be a typedef already compiled into scope.
    let base = scope
        .get(name_sym)
        .ok_or_else(|| TypeError::UnknownType(name_text.clone()))?
        .clone();
    compile_derived(ctx, stmt, name_sym, &base, identities)
}

fn resolve_identity_bases(ctx: &Context, stmt: &Stmt, identities: &IdentityGraph) -> Vec<yang_schema::IdentityId> {
    stmt.children(StmtKeyword::Base)
        .filter_map(|b| b.argument)
        .filter_map(|base_sym| {
            let dict = ctx.dict();
            let text = dict.resolve(base_sym);
            let local = text.rsplit(':').next().unwrap_or(text);
            identities
                .iter()
                .find(|identity| dict.try_resolve(identity.name) == Some(local))
                .map(|identity| identity.id)
        })
        .collect()
}

fn compile_builtin(
    ctx: &Context,
    stmt: &Stmt,
    name: Symbol,
    builtin: Builtin,
    identities: &IdentityGraph,
) -> Result<CompiledType, TypeError> {
    let payload = match builtin {
        Builtin::Int8
        | Builtin::Int16
        | Builtin::Int32
        | Builtin::Int64
        | Builtin::Uint8
        | Builtin::Uint16
        | Builtin::Uint32
        | Builtin::Uint64 => {
            let range = match stmt.child(StmtKeyword::Range) {
                Some(r) => compile_range_like(ctx, r)?,
                None => builtin_default_range(builtin).unwrap(),
            };
            TypePayload::Integral { range }
        }
        Builtin::Decimal64 => {
            let fraction_digits = stmt
                .child(StmtKeyword::FractionDigits)
                .and_then(|f| f.argument)
                .map(|sym| ctx.dict().resolve(sym).parse::<u8>().unwrap_or(1))
                .ok_or_else(|| {
                    TypeError::MissingSubstatement("decimal64", "fraction-digits")
                })?;
            let range = match stmt.child(StmtKeyword::Range) {
                Some(r) => compile_decimal64_range(ctx, r, fraction_digits)?,
                None => RestrictionSet {
                    intervals: vec![Interval {
                        min: i64::MIN,
                        max: i64::MAX,
                    }],
                },
            };
            TypePayload::Decimal64 {
                fraction_digits,
                range,
            }
        }
        Builtin::String => {
            let length = match stmt.child(StmtKeyword::Length) {
                Some(l) => compile_range_like(ctx, l)?,
                None => RestrictionSet::default(),
            };
            let patterns = stmt
                .children(StmtKeyword::Pattern)
                .map(|p| compile_pattern(ctx, p))
                .collect::<Result<Vec<_>, _>>()?;
            TypePayload::StringLike { length, patterns }
        }
        Builtin::Binary => {
            let length = match stmt.child(StmtKeyword::Length) {
                Some(l) => compile_range_like(ctx, l)?,
                None => RestrictionSet::default(),
            };
            TypePayload::Binary { length }
        }
        Builtin::Boolean => TypePayload::Boolean,
        Builtin::Empty => TypePayload::Empty,
        Builtin::Enumeration => {
            let items = compile_enums(ctx, stmt);
            if items.is_empty() {
                return Err(TypeError::MissingSubstatement("enumeration", "enum"));
            }
            TypePayload::Enumeration(items)
        }
        Builtin::Bits => {
            let items = compile_bits(ctx, stmt);
            if items.is_empty() {
                return Err(TypeError::MissingSubstatement("bits", "bit"));
            }
            TypePayload::Bits(items)
        }
        Builtin::Union => {
            let members = stmt
                .children(StmtKeyword::Type)
                .map(|t| {
                    // Union members resolve against the same scope as the
                    // enclosing type; the caller threads typedefs through
                    // `compile_type` recursively for nested members.
                    compile_type(ctx, t, &TypedefScope::new(), identities).map(Rc::new)
                })
                .collect::<Result<Vec<_>, _>>()?;
            TypePayload::Union(members)
        }
        Builtin::Leafref => {
            let path = stmt
                .child(StmtKeyword::Path)
                .and_then(|p| p.argument)
                .ok_or_else(|| TypeError::MissingSubstatement("leafref", "path"))?;
            let path_text = ctx.dict().resolve(path).to_string();
            let compiled_path = crate::xpath::compile(ctx, &path_text)
                .map_err(|e| TypeError::Path(path_text.clone(), e.to_string()))?;
            let require_instance = stmt
                .child(StmtKeyword::RequireInstance)
                .and_then(|r| r.argument)
                .map(|sym| ctx.dict().resolve(sym) == "true")
                .unwrap_or(true);
            TypePayload::Leafref {
                path: Rc::new(compiled_path),
                require_instance,
                target: std::sync::OnceLock::new(),
            }
        }
        Builtin::Identityref => TypePayload::Identityref {
            bases: resolve_identity_bases(ctx, stmt, identities),
        },
        Builtin::InstanceIdentifier => {
            let require_instance = stmt
                .child(StmtKeyword::RequireInstance)
                .and_then(|r| r.argument)
                .map(|sym| ctx.dict().resolve(sym) == "true")
                .unwrap_or(true);
            TypePayload::InstanceIdentifier { require_instance }
        }
    };
    Ok(CompiledType {
        name: Some(name),
        builtin,
        payload,
    })
}

fn compile_derived(
    ctx: &Context,
    stmt: &Stmt,
    name: Symbol,
    base: &CompiledType,
    identities: &IdentityGraph,
) -> Result<CompiledType, TypeError> {
    let payload = match &base.payload {
        TypePayload::Integral { range: base_range } => {
            let range = match stmt.child(StmtKeyword::Range) {
                Some(r) => {
                    let tightened = compile_range_like(ctx, r)?;
                    if !tightened.is_tightening_of(base_range) {
                        return Err(TypeError::NotATightening("range"));
                    }
                    tightened
                }
                None => base_range.clone(),
            };
            TypePayload::Integral { range }
        }
        TypePayload::StringLike {
            length: base_length,
            patterns: base_patterns,
        } => {
            let length = match stmt.child(StmtKeyword::Length) {
                Some(l) => {
                    let tightened = compile_range_like(ctx, l)?;
                    if !tightened.is_tightening_of(base_length) {
                        return Err(TypeError::NotATightening("length"));
                    }
                    tightened
                }
                None => base_length.clone(),
            };
            let mut patterns = base_patterns.clone();
            for p in stmt.children(StmtKeyword::Pattern) {
                patterns.push(compile_pattern(ctx, p)?);
            }
            TypePayload::StringLike { length, patterns }
        }
        TypePayload::Enumeration(base_items) => {
            let restricted: Vec<Symbol> = stmt
                .children(StmtKeyword::Enum)
                .filter_map(|e| e.argument)
                .collect();
            if restricted.is_empty() {
                TypePayload::Enumeration(base_items.clone())
            } else {
                let items: Vec<EnumItem> = base_items
                    .iter()
                    .filter(|item| restricted.contains(&item.name))
                    .cloned()
                    .collect();
                if items.len() != restricted.len() {
                    return Err(TypeError::NotATightening("enum"));
                }
                TypePayload::Enumeration(items)
            }
        }
        TypePayload::Bits(base_items) => {
            let restricted: Vec<Symbol> = stmt
                .children(StmtKeyword::Bit)
                .filter_map(|b| b.argument)
                .collect();
            if restricted.is_empty() {
                TypePayload::Bits(base_items.clone())
            } else {
                let items: Vec<BitItem> = base_items
                    .iter()
                    .filter(|item| restricted.contains(&item.name))
                    .cloned()
                    .collect();
                if items.len() != restricted.len() {
                    return Err(TypeError::NotATightening("bit"));
                }
                TypePayload::Bits(items)
            }
        }
        TypePayload::Decimal64 {
            fraction_digits,
            range: base_range,
        } => {
            let range = match stmt.child(StmtKeyword::Range) {
                Some(r) => {
                    let tightened = compile_decimal64_range(ctx, r, *fraction_digits)?;
                    if !tightened.is_tightening_of(base_range) {
                        return Err(TypeError::NotATightening("range"));
                    }
                    tightened
                }
                None => base_range.clone(),
            };
            TypePayload::Decimal64 {
                fraction_digits: *fraction_digits,
                range,
            }
        }
        TypePayload::Boolean => TypePayload::Boolean,
        TypePayload::Empty => TypePayload::Empty,
        TypePayload::Union(members) => {
            // A derived union type may redeclare its full member list; an
            // empty redeclaration just inherits the base's members.
            let redeclared: Vec<&Stmt> = stmt.children(StmtKeyword::Type).collect();
            if redeclared.is_empty() {
                TypePayload::Union(members.clone())
            } else {
                let compiled = redeclared
                    .into_iter()
                    .map(|t| compile_type(ctx, t, &TypedefScope::new(), identities).map(Rc::new))
                    .collect::<Result<Vec<_>, _>>()?;
                TypePayload::Union(compiled)
            }
        }
        TypePayload::Leafref {
            path,
            require_instance,
            ..
        } => TypePayload::Leafref {
            path: path.clone(),
            require_instance: *require_instance,
            target: std::sync::OnceLock::new(),
        },
        TypePayload::Identityref { bases } => TypePayload::Identityref {
            bases: bases.clone(),
        },
        TypePayload::InstanceIdentifier { require_instance } => TypePayload::InstanceIdentifier {
            require_instance: *require_instance,
        },
        TypePayload::Binary { length: base_length } => {
            let length = match stmt.child(StmtKeyword::Length) {
                Some(l) => {
                    let tightened = compile_range_like(ctx, l)?;
                    if !tightened.is_tightening_of(base_length) {
                        return Err(TypeError::NotATightening("length"));
                    }
                    tightened
                }
                None => base_length.clone(),
            };
            TypePayload::Binary { length }
        }
    };
    Ok(CompiledType {
        name: Some(name),
        builtin: base.builtin,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use yang_core::ContextOptions;
    use yang_schema::Span;

    fn type_stmt(ctx: &Context, name: &str) -> Stmt {
        Stmt::new(StmtKeyword::Type, Some(ctx.dict().insert(name)), Span::default())
    }

    #[test]
    fn compiles_plain_uint8() {
        let ctx = Context::new(ContextOptions::empty());
        let stmt = type_stmt(&ctx, "uint8");
        let ty = compile_type(&ctx, &stmt, &TypedefScope::new(), &IdentityGraph::new()).unwrap();
        match ty.payload {
            TypePayload::Integral { range } => {
                assert_eq!(range.intervals[0], Interval { min: 0, max: 255 });
            }
            _ => panic!("expected integral"),
        }
    }

    #[test]
    fn range_must_tighten_base() {
        let ctx = Context::new(ContextOptions::empty());
        let base = CompiledType {
            name: Some(ctx.dict().insert("percent")),
            builtin: Builtin::Int32,
            payload: TypePayload::Integral {
                range: RestrictionSet {
                    intervals: vec![Interval { min: 0, max: 100 }],
                },
            },
        };
        let mut scope = TypedefScope::new();
        let name = ctx.dict().insert("percent");
        scope.define(name, Rc::new(base));

        let mut stmt = type_stmt(&ctx, "percent");
        let mut range_stmt = Stmt::new(
            StmtKeyword::Range,
            Some(ctx.dict().insert("0..200")),
            Span::default(),
        );
        range_stmt.substatements = Vec::new();
        stmt.substatements.push(range_stmt);

        let err = compile_type(&ctx, &stmt, &scope, &IdentityGraph::new()).unwrap_err();
        assert!(matches!(err, TypeError::NotATightening("range")));
    }

    #[test]
    fn identityref_resolves_base_against_identity_graph() {
        let ctx = Context::new(ContextOptions::empty());
        let mod_sym = ctx.dict().insert("m");
        let animal_sym = ctx.dict().insert("animal");
        let mut identities = IdentityGraph::new();
        let animal = identities.push(animal_sym, mod_sym, vec![]);

        let mut stmt = type_stmt(&ctx, "identityref");
        let base_stmt = Stmt::new(StmtKeyword::Base, Some(animal_sym), Span::default());
        stmt.substatements.push(base_stmt);

        let ty = compile_type(&ctx, &stmt, &TypedefScope::new(), &identities).unwrap();
        match ty.payload {
            TypePayload::Identityref { bases } => assert_eq!(bases, vec![animal]),
            other => panic!("expected identityref, got {other:?}"),
        }
    }

    #[test]
    fn pattern_backreference_is_rejected_before_dfa_build() {
        let err = check_pattern_syntax(r"(a)\1").unwrap_err();
        match err {
            TypeError::Pattern(_, reason) => assert!(reason.contains("backreference")),
            other => panic!("expected Pattern error, got {other:?}"),
        }
    }

    #[test]
    fn ordinary_pattern_passes_syntax_check() {
        assert!(check_pattern_syntax("[a-z]+[0-9]*").is_ok());
    }
}
