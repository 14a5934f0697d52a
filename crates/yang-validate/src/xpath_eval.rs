//! Evaluates a [`CompiledExpr`] (`when`, `must`, or leafref `path`) against
//! a [`DataTree`].
//!
//! The token stream is a flat array, not a tree, so the outer loop is a
//! single left-to-right scan over an explicit operand stack: every operator
//! and function call is emitted postfix (operands already on the stack by
//! the time the operator token arrives), and a whole location path is one
//! run of `Step`/`PathSeparator` tokens that collapses to a single
//! `NodeSet` operand once the run ends. The only recursion is for
//! predicate bodies (`[...]`), which are themselves complete subexpressions
//! evaluated against each candidate node in turn — that nesting mirrors
//! XPath's own grammar and never goes deeper than the predicate syntax
//! actually written. Predicate bounds are found by depth-counting over
//! `PredicateStart`/`PredicateEnd` rather than by consulting
//! `CompiledExpr::repeat`; see DESIGN.md's Open Question decisions for why.

use std::rc::Rc;

use yang_core::Context;
use yang_schema::compiled::{CompiledModule, NodeId};
use yang_schema::expr::{Axis, CompiledExpr, NodeTest, Token, XPathOp};
use yang_schema::identity::IdentityId;
use yang_schema::types::{CompiledType, TypePayload};

use crate::data::{DataId, DataTree};

/// Sentinel standing in for the document root (the parent of every
/// top-level instance) — not a real arena slot, since `DataTree` only
/// stores actual instances.
const VIRTUAL_ROOT: DataId = DataId(u32::MAX);

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("operand stack underflow")]
    StackUnderflow,
    #[error("malformed compiled expression")]
    Malformed,
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("wrong number of arguments to '{0}'")]
    Arity(&'static str),
    #[error("invalid pattern: {0}")]
    Pattern(String),
}

#[derive(Debug, Clone)]
pub enum XValue {
    NodeSet(Vec<DataId>),
    Bool(bool),
    Number(f64),
    Str(String),
}

impl XValue {
    pub fn boolean(&self, ectx: &EvalCtx<'_>) -> bool {
        match self {
            XValue::NodeSet(nodes) => !nodes.is_empty(),
            XValue::Bool(b) => *b,
            XValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XValue::Str(s) => !s.is_empty(),
            #[allow(unreachable_patterns)]
            _ => {
                let _ = ectx;
                false
            }
        }
    }

    pub fn number(&self, ectx: &EvalCtx<'_>) -> f64 {
        match self {
            XValue::Number(n) => *n,
            XValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            XValue::Str(s) => s.trim().parse().unwrap_or(f64::NAN),
            XValue::NodeSet(_) => self.string(ectx).trim().parse().unwrap_or(f64::NAN),
        }
    }

    pub fn string(&self, ectx: &EvalCtx<'_>) -> String {
        match self {
            XValue::Str(s) => s.clone(),
            XValue::Bool(b) => b.to_string(),
            XValue::Number(n) => {
                if n.is_nan() {
                    "NaN".to_string()
                } else {
                    n.to_string()
                }
            }
            XValue::NodeSet(nodes) => nodes
                .first()
                .map(|&id| node_string_value(ectx, id))
                .unwrap_or_default(),
        }
    }
}

pub struct EvalCtx<'a> {
    pub ctx: &'a Context,
    pub tree: &'a DataTree,
    pub module: &'a CompiledModule,
}

fn node_string_value(ectx: &EvalCtx<'_>, id: DataId) -> String {
    if id == VIRTUAL_ROOT {
        return String::new();
    }
    let node = ectx.tree.get(id);
    match node.value.as_leaf() {
        Some(text) => text.to_string(),
        None => {
            // Container/list/anyxml: concatenate descendant leaf text, the
            // way XPath's string-value of an element node does.
            let mut out = String::new();
            collect_text(ectx, id, &mut out);
            out
        }
    }
}

fn collect_text(ectx: &EvalCtx<'_>, id: DataId, out: &mut String) {
    let node = ectx.tree.get(id);
    if let Some(text) = node.value.as_leaf() {
        out.push_str(text);
        return;
    }
    for &child in node.value.children() {
        collect_text(ectx, child, out);
    }
}

/// Evaluate a compiled expression with `context` as the XPath context node.
pub fn eval(ectx: &EvalCtx<'_>, expr: &CompiledExpr, context: DataId) -> Result<XValue, EvalError> {
    eval_tokens(ectx, &expr.tokens, context, 1, 1)
}

pub fn eval_boolean(ectx: &EvalCtx<'_>, expr: &CompiledExpr, context: DataId) -> Result<bool, EvalError> {
    Ok(eval(ectx, expr, context)?.boolean(ectx))
}

fn eval_tokens(
    ectx: &EvalCtx<'_>,
    toks: &[Token],
    context: DataId,
    position: usize,
    size: usize,
) -> Result<XValue, EvalError> {
    let mut stack: Vec<XValue> = Vec::new();
    let mut i = 0;
    while i < toks.len() {
        match &toks[i] {
            Token::Number(n) => {
                stack.push(XValue::Number(*n));
                i += 1;
            }
            Token::Literal(sym) => {
                stack.push(XValue::Str(ectx.ctx.dict().resolve(*sym).to_string()));
                i += 1;
            }
            Token::VariableRef(_) => {
                // No variable bindings in this evaluator's environment
                // (`when`/`must`/`path` never introduce one).
                stack.push(XValue::NodeSet(Vec::new()));
                i += 1;
            }
            Token::Operator(op) => {
                let value = if op.is_unary() {
                    let a = stack.pop().ok_or(EvalError::StackUnderflow)?;
                    XValue::Number(-a.number(ectx))
                } else {
                    let b = stack.pop().ok_or(EvalError::StackUnderflow)?;
                    let a = stack.pop().ok_or(EvalError::StackUnderflow)?;
                    apply_binary(ectx, *op, a, b)
                };
                stack.push(value);
                i += 1;
            }
            Token::Union => {
                let b = stack.pop().ok_or(EvalError::StackUnderflow)?;
                let a = stack.pop().ok_or(EvalError::StackUnderflow)?;
                stack.push(apply_binary(ectx, XPathOp::Union, a, b));
                i += 1;
            }
            Token::FunctionCall { name, arg_count } => {
                let n = *arg_count as usize;
                if stack.len() < n {
                    return Err(EvalError::StackUnderflow);
                }
                let args: Vec<XValue> = stack.split_off(stack.len() - n);
                let name_text = ectx.ctx.dict().resolve(*name).to_string();
                let result = call_function(ectx, &name_text, &args, context, position, size)?;
                stack.push(result);
                i += 1;
            }
            Token::Step { .. } | Token::PathSeparator { .. } => {
                let (nodes, next_i) = eval_path(ectx, toks, i, context)?;
                stack.push(XValue::NodeSet(nodes));
                i = next_i;
            }
            Token::PredicateStart | Token::PredicateEnd => return Err(EvalError::Malformed),
        }
    }
    stack.pop().ok_or(EvalError::StackUnderflow)
}

fn apply_binary(ectx: &EvalCtx<'_>, op: XPathOp, a: XValue, b: XValue) -> XValue {
    match op {
        XPathOp::And => XValue::Bool(a.boolean(ectx) && b.boolean(ectx)),
        XPathOp::Or => XValue::Bool(a.boolean(ectx) || b.boolean(ectx)),
        XPathOp::Eq => XValue::Bool(compare_eq(ectx, &a, &b)),
        XPathOp::Ne => XValue::Bool(!compare_eq(ectx, &a, &b)),
        XPathOp::Lt => XValue::Bool(a.number(ectx) < b.number(ectx)),
        XPathOp::Le => XValue::Bool(a.number(ectx) <= b.number(ectx)),
        XPathOp::Gt => XValue::Bool(a.number(ectx) > b.number(ectx)),
        XPathOp::Ge => XValue::Bool(a.number(ectx) >= b.number(ectx)),
        XPathOp::Plus => XValue::Number(a.number(ectx) + b.number(ectx)),
        XPathOp::Minus => XValue::Number(a.number(ectx) - b.number(ectx)),
        XPathOp::Multiply => XValue::Number(a.number(ectx) * b.number(ectx)),
        XPathOp::Div => XValue::Number(a.number(ectx) / b.number(ectx)),
        XPathOp::Mod => XValue::Number(a.number(ectx) % b.number(ectx)),
        XPathOp::Union => {
            let (XValue::NodeSet(mut na), XValue::NodeSet(nb)) = (a, b) else {
                return XValue::NodeSet(Vec::new());
            };
            for id in nb {
                if !na.contains(&id) {
                    na.push(id);
                }
            }
            XValue::NodeSet(na)
        }
        XPathOp::Negate => unreachable!("unary operator reaches apply_binary"),
    }
}

/// Node-set/string/number/boolean equality per XPath 1.0 §3.4: comparing
/// two node-sets is true if any pair of string-values is equal; comparing
/// a node-set to a primitive converts the primitive's type onto the
/// node-set's string-values.
fn compare_eq(ectx: &EvalCtx<'_>, a: &XValue, b: &XValue) -> bool {
    match (a, b) {
        (XValue::NodeSet(na), XValue::NodeSet(nb)) => na
            .iter()
            .any(|&x| nb.iter().any(|&y| node_string_value(ectx, x) == node_string_value(ectx, y))),
        (XValue::NodeSet(nodes), other) | (other, XValue::NodeSet(nodes)) => match other {
            XValue::Number(n) => nodes.iter().any(|&id| node_string_value(ectx, id).trim().parse::<f64>().ok() == Some(*n)),
            XValue::Bool(bo) => !nodes.is_empty() == *bo,
            _ => {
                let s = other.string(ectx);
                nodes.iter().any(|&id| node_string_value(ectx, id) == s)
            }
        },
        (XValue::Bool(_), _) | (_, XValue::Bool(_)) => a.boolean(ectx) == b.boolean(ectx),
        (XValue::Number(_), _) | (_, XValue::Number(_)) => a.number(ectx) == b.number(ectx),
        _ => a.string(ectx) == b.string(ectx),
    }
}

fn matches_test(ectx: &EvalCtx<'_>, id: DataId, test: NodeTest) -> bool {
    if id == VIRTUAL_ROOT {
        return false;
    }
    match test {
        NodeTest::Any => true,
        NodeTest::Text => matches!(ectx.tree.get(id).value, crate::data::DataValue::Leaf(_) | crate::data::DataValue::AnyXml(_)),
        NodeTest::Named { name, .. } => {
            let dict = ectx.ctx.dict();
            dict.try_resolve(ectx.tree.get(id).name) == dict.try_resolve(name)
        }
    }
}

fn push_unique(out: &mut Vec<DataId>, id: DataId) {
    if !out.contains(&id) {
        out.push(id);
    }
}

fn collect_descendants(ectx: &EvalCtx<'_>, id: DataId, test: NodeTest, out: &mut Vec<DataId>) {
    let children: &[DataId] = if id == VIRTUAL_ROOT {
        ectx.tree.top_level()
    } else {
        ectx.tree.children(id)
    };
    for &child in children {
        if matches_test(ectx, child, test) {
            push_unique(out, child);
        }
        collect_descendants(ectx, child, test, out);
    }
}

fn step(ectx: &EvalCtx<'_>, from: &[DataId], axis: Axis, test: NodeTest) -> Vec<DataId> {
    let mut out = Vec::new();
    for &node in from {
        match axis {
            Axis::Child => {
                let children: &[DataId] = if node == VIRTUAL_ROOT {
                    ectx.tree.top_level()
                } else {
                    ectx.tree.children(node)
                };
                for &c in children {
                    if matches_test(ectx, c, test) {
                        push_unique(&mut out, c);
                    }
                }
            }
            Axis::Self_ => {
                if matches_test(ectx, node, test) {
                    push_unique(&mut out, node);
                }
            }
            Axis::Parent => match ectx.tree.parent(node) {
                Some(p) if matches_test(ectx, p, test) => push_unique(&mut out, p),
                None if node != VIRTUAL_ROOT && matches!(test, NodeTest::Any) => push_unique(&mut out, VIRTUAL_ROOT),
                _ => {}
            },
            Axis::Ancestor => {
                if node != VIRTUAL_ROOT {
                    for a in ectx.tree.ancestors(node) {
                        if matches_test(ectx, a, test) {
                            push_unique(&mut out, a);
                        }
                    }
                    if matches!(test, NodeTest::Any) {
                        push_unique(&mut out, VIRTUAL_ROOT);
                    }
                }
            }
            Axis::AncestorOrSelf => {
                if matches_test(ectx, node, test) {
                    push_unique(&mut out, node);
                }
                if node != VIRTUAL_ROOT {
                    for a in ectx.tree.ancestors(node) {
                        if matches_test(ectx, a, test) {
                            push_unique(&mut out, a);
                        }
                    }
                    if matches!(test, NodeTest::Any) {
                        push_unique(&mut out, VIRTUAL_ROOT);
                    }
                }
            }
            Axis::Descendant => collect_descendants(ectx, node, test, &mut out),
            Axis::DescendantOrSelf => {
                if matches_test(ectx, node, test) {
                    push_unique(&mut out, node);
                }
                collect_descendants(ectx, node, test, &mut out);
            }
            Axis::FollowingSibling => {
                if node != VIRTUAL_ROOT {
                    let sibs = ectx.tree.siblings(node);
                    if let Some(pos) = sibs.iter().position(|&s| s == node) {
                        for &s in &sibs[pos + 1..] {
                            if matches_test(ectx, s, test) {
                                push_unique(&mut out, s);
                            }
                        }
                    }
                }
            }
            Axis::PrecedingSibling => {
                if node != VIRTUAL_ROOT {
                    let sibs = ectx.tree.siblings(node);
                    if let Some(pos) = sibs.iter().position(|&s| s == node) {
                        for &s in sibs[..pos].iter().rev() {
                            if matches_test(ectx, s, test) {
                                push_unique(&mut out, s);
                            }
                        }
                    }
                }
            }
            Axis::Attribute => {
                // YANG instance data has no XML attributes to select.
            }
        }
    }
    out
}

/// Consume one run of `PathSeparator`/`Step` tokens (with any attached
/// predicates) starting at `start`, returning the resulting node-set and
/// the index just past the run.
fn eval_path(
    ectx: &EvalCtx<'_>,
    toks: &[Token],
    mut i: usize,
    context: DataId,
) -> Result<(Vec<DataId>, usize), EvalError> {
    let mut current = vec![context];
    while i < toks.len() {
        match &toks[i] {
            Token::PathSeparator { absolute } => {
                if *absolute {
                    current = vec![VIRTUAL_ROOT];
                }
                i += 1;
            }
            Token::Step { axis, test } => {
                current = step(ectx, &current, *axis, *test);
                i += 1;
                while i < toks.len() && matches!(toks[i], Token::PredicateStart) {
                    let (filtered, next_i) = apply_predicate(ectx, toks, i, &current)?;
                    current = filtered;
                    i = next_i;
                }
            }
            _ => break,
        }
    }
    Ok((current, i))
}

fn apply_predicate(
    ectx: &EvalCtx<'_>,
    toks: &[Token],
    i: usize,
    current: &[DataId],
) -> Result<(Vec<DataId>, usize), EvalError> {
    let body_start = i + 1;
    let mut depth = 1usize;
    let mut j = body_start;
    while j < toks.len() {
        match toks[j] {
            Token::PredicateStart => depth += 1,
            Token::PredicateEnd => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
        j += 1;
    }
    if depth != 0 {
        return Err(EvalError::Malformed);
    }
    let body = &toks[body_start..j];
    let size = current.len();
    let mut out = Vec::new();
    for (idx, &node) in current.iter().enumerate() {
        let position = idx + 1;
        let value = eval_tokens(ectx, body, node, position, size)?;
        let keep = match value {
            XValue::Number(n) => n == position as f64,
            other => other.boolean(ectx),
        };
        if keep {
            out.push(node);
        }
    }
    Ok((out, j + 1))
}

fn call_function(
    ectx: &EvalCtx<'_>,
    name: &str,
    args: &[XValue],
    context: DataId,
    position: usize,
    size: usize,
) -> Result<XValue, EvalError> {
    match name {
        "last" => Ok(XValue::Number(size as f64)),
        "position" => Ok(XValue::Number(position as f64)),
        "count" => match args.first() {
            Some(XValue::NodeSet(n)) => Ok(XValue::Number(n.len() as f64)),
            _ => Err(EvalError::Arity("count")),
        },
        "concat" => {
            let mut s = String::new();
            for a in args {
                s.push_str(&a.string(ectx));
            }
            Ok(XValue::Str(s))
        }
        "string" => Ok(XValue::Str(match args.first() {
            Some(v) => v.string(ectx),
            None => node_string_value(ectx, context),
        })),
        "boolean" => Ok(XValue::Bool(args.first().map(|v| v.boolean(ectx)).unwrap_or(false))),
        "number" => Ok(XValue::Number(match args.first() {
            Some(v) => v.number(ectx),
            None => node_string_value(ectx, context).trim().parse().unwrap_or(f64::NAN),
        })),
        "not" => Ok(XValue::Bool(!args.first().map(|v| v.boolean(ectx)).unwrap_or(false))),
        "true" => Ok(XValue::Bool(true)),
        "false" => Ok(XValue::Bool(false)),
        "starts-with" => {
            let [a, b] = args else { return Err(EvalError::Arity("starts-with")) };
            Ok(XValue::Bool(a.string(ectx).starts_with(&b.string(ectx))))
        }
        "contains" => {
            let [a, b] = args else { return Err(EvalError::Arity("contains")) };
            Ok(XValue::Bool(a.string(ectx).contains(&b.string(ectx))))
        }
        "substring" => {
            let s = args.first().ok_or(EvalError::Arity("substring"))?.string(ectx);
            let start = args.get(1).map(|v| v.number(ectx)).unwrap_or(1.0);
            let chars: Vec<char> = s.chars().collect();
            let from = (start.round() as isize - 1).max(0) as usize;
            let len = args.get(2).map(|v| v.number(ectx).round() as isize).unwrap_or(chars.len() as isize);
            let to = ((start.round() as isize - 1 + len).max(0) as usize).min(chars.len());
            Ok(XValue::Str(chars.get(from.min(chars.len())..to).map(|c| c.iter().collect()).unwrap_or_default()))
        }
        "string-length" => {
            let s = match args.first() {
                Some(v) => v.string(ectx),
                None => node_string_value(ectx, context),
            };
            Ok(XValue::Number(s.chars().count() as f64))
        }
        "normalize-space" => {
            let s = match args.first() {
                Some(v) => v.string(ectx),
                None => node_string_value(ectx, context),
            };
            Ok(XValue::Str(s.split_whitespace().collect::<Vec<_>>().join(" ")))
        }
        "current" => Ok(XValue::NodeSet(vec![context])),
        "deref" => deref_fn(ectx, args),
        "derived-from" => identity_fn(ectx, args, false),
        "derived-from-or-self" => identity_fn(ectx, args, true),
        "enum-value" => enum_value_fn(ectx, args),
        "bit-is-set" => bit_is_set_fn(ectx, args),
        "re-match" => re_match_fn(ectx, args),
        other => Err(EvalError::UnknownFunction(other.to_string())),
    }
}

fn leaf_type<'a>(module: &'a CompiledModule, schema: NodeId) -> Option<&'a Rc<CompiledType>> {
    use yang_schema::compiled::NodeKind;
    match &module.get(schema).kind {
        NodeKind::Leaf { ty, .. } | NodeKind::LeafList { ty, .. } => Some(ty),
        _ => None,
    }
}

fn deref_fn(ectx: &EvalCtx<'_>, args: &[XValue]) -> Result<XValue, EvalError> {
    let Some(XValue::NodeSet(nodes)) = args.first() else {
        return Err(EvalError::Arity("deref"));
    };
    let Some(&node) = nodes.first() else {
        return Ok(XValue::NodeSet(Vec::new()));
    };
    let schema = ectx.tree.get(node).schema;
    let Some(ty) = leaf_type(ectx.module, schema) else {
        return Ok(XValue::NodeSet(Vec::new()));
    };
    match &ty.payload {
        TypePayload::Leafref { path, .. } => {
            let target = eval(ectx, path, node)?;
            match target {
                XValue::NodeSet(mut n) => {
                    n.truncate(1);
                    Ok(XValue::NodeSet(n))
                }
                _ => Ok(XValue::NodeSet(Vec::new())),
            }
        }
        _ => Ok(XValue::NodeSet(Vec::new())),
    }
}

fn find_identity(ectx: &EvalCtx<'_>, name_text: &str) -> Option<IdentityId> {
    let local = name_text.rsplit(':').next().unwrap_or(name_text);
    let dict = ectx.ctx.dict();
    ectx.module
        .identities
        .iter()
        .find(|identity| dict.try_resolve(identity.name) == Some(local))
        .map(|identity| identity.id)
}

fn identity_fn(ectx: &EvalCtx<'_>, args: &[XValue], include_self: bool) -> Result<XValue, EvalError> {
    let [value, target] = args else {
        return Err(EvalError::Arity("derived-from"));
    };
    let value_text = match value {
        XValue::NodeSet(nodes) => match nodes.first() {
            Some(&id) => node_string_value(ectx, id),
            None => return Ok(XValue::Bool(false)),
        },
        other => other.string(ectx),
    };
    let target_text = target.string(ectx);
    let (Some(value_id), Some(target_id)) = (find_identity(ectx, &value_text), find_identity(ectx, &target_text)) else {
        return Ok(XValue::Bool(false));
    };
    if value_id == target_id {
        return Ok(XValue::Bool(include_self));
    }
    Ok(XValue::Bool(ectx.module.identities.get(target_id).derived.contains(&value_id)))
}

fn enum_value_fn(ectx: &EvalCtx<'_>, args: &[XValue]) -> Result<XValue, EvalError> {
    let Some(XValue::NodeSet(nodes)) = args.first() else {
        return Err(EvalError::Arity("enum-value"));
    };
    let Some(&node) = nodes.first() else {
        return Ok(XValue::Number(f64::NAN));
    };
    let schema = ectx.tree.get(node).schema;
    let Some(ty) = leaf_type(ectx.module, schema) else {
        return Ok(XValue::Number(f64::NAN));
    };
    let TypePayload::Enumeration(items) = &ty.payload else {
        return Ok(XValue::Number(f64::NAN));
    };
    let text = node_string_value(ectx, node);
    let dict = ectx.ctx.dict();
    match items.iter().find(|e| dict.try_resolve(e.name) == Some(text.as_str())) {
        Some(e) => Ok(XValue::Number(e.value as f64)),
        None => Ok(XValue::Number(f64::NAN)),
    }
}

fn bit_is_set_fn(ectx: &EvalCtx<'_>, args: &[XValue]) -> Result<XValue, EvalError> {
    let [nodeset, bit_name] = args else {
        return Err(EvalError::Arity("bit-is-set"));
    };
    let XValue::NodeSet(nodes) = nodeset else {
        return Err(EvalError::Arity("bit-is-set"));
    };
    let Some(&node) = nodes.first() else {
        return Ok(XValue::Bool(false));
    };
    let name = bit_name.string(ectx);
    let text = node_string_value(ectx, node);
    Ok(XValue::Bool(text.split_whitespace().any(|w| w == name)))
}

fn re_match_fn(ectx: &EvalCtx<'_>, args: &[XValue]) -> Result<XValue, EvalError> {
    let [value, pattern] = args else {
        return Err(EvalError::Arity("re-match"));
    };
    let text = value.string(ectx);
    let pattern = pattern.string(ectx);
    Ok(XValue::Bool(regex_is_match(&pattern, &text).map_err(EvalError::Pattern)?))
}

/// Build and run a pattern match directly, without caching the compiled
/// DFA — `re-match()` patterns are computed from data, not a fixed schema
/// restriction, so there's nothing stable to memoize against.
fn regex_is_match(pattern: &str, text: &str) -> Result<bool, String> {
    use regex_automata::dfa::{dense, Automaton};
    let dfa = dense::DFA::builder()
        .configure(dense::DFA::config().start_kind(regex_automata::dfa::StartKind::Unanchored))
        .build(pattern)
        .map_err(|e| e.to_string())?;
    let matched = dfa
        .try_search_fwd(&regex_automata::Input::new(text))
        .map_err(|e| e.to_string())?
        .is_some();
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use yang_core::{Context, ContextOptions};
    use yang_schema::compiled::{Cardinality, CompiledModule, CompiledNode, NodeFlags, NodeKind};
    use yang_schema::types::{Builtin, RestrictionSet};

    use crate::data::{DataNode, DataTree, DataValue};

    fn string_type() -> Rc<CompiledType> {
        Rc::new(CompiledType {
            name: None,
            builtin: Builtin::String,
            payload: TypePayload::StringLike {
                length: RestrictionSet::default(),
                patterns: Vec::new(),
            },
        })
    }

    #[test]
    fn compares_leaf_equal_to_literal() {
        let ctx = Context::new(ContextOptions::empty());
        let name_sym = ctx.dict().insert("name");
        let mut module = CompiledModule::new();
        let schema = module.push(CompiledNode {
            parent: None,
            name: name_sym,
            module: name_sym,
            flags: NodeFlags::empty(),
            when: vec![],
            must: vec![],
            ext_instances: vec![],
            kind: NodeKind::Leaf {
                ty: string_type(),
                default: None,
                units: None,
            },
        });
        module.top_level.push(schema);

        let mut tree = DataTree::new();
        let leaf = tree.push_child(None, DataNode::new(None, schema, name_sym, DataValue::Leaf("eth0".into())));

        let eth0 = ctx.dict().insert("eth0");
        let expr = CompiledExpr {
            tokens: vec![
                Token::Step {
                    axis: Axis::Child,
                    test: NodeTest::Named { prefix: None, name: name_sym },
                },
                Token::Literal(eth0),
                Token::Operator(XPathOp::Eq),
            ],
            tok_pos: vec![0, 0, 0],
            tok_len: vec![0, 0, 0],
            repeat: vec![0, 0, 1],
            prefixes: vec![],
            source: "name = 'eth0'".into(),
        };
        let ectx = EvalCtx { ctx: &ctx, tree: &tree, module: &module };
        assert!(eval_boolean(&ectx, &expr, leaf).unwrap());
    }

    #[test]
    fn count_function_counts_matched_children() {
        let ctx = Context::new(ContextOptions::empty());
        let iface_sym = ctx.dict().insert("interface");
        let mut module = CompiledModule::new();
        let list = module.push(CompiledNode {
            parent: None,
            name: iface_sym,
            module: iface_sym,
            flags: NodeFlags::empty(),
            when: vec![],
            must: vec![],
            ext_instances: vec![],
            kind: NodeKind::List {
                children: vec![],
                keys: vec![],
                unique_groups: vec![],
                cardinality: Cardinality::default(),
            },
        });
        module.top_level.push(list);

        let mut tree = DataTree::new();
        let root = tree.push_child(None, DataNode::new(None, list, iface_sym, DataValue::Inner { children: vec![] }));
        tree.push_child(Some(root), DataNode::new(Some(root), list, iface_sym, DataValue::Inner { children: vec![] }));
        tree.push_child(Some(root), DataNode::new(Some(root), list, iface_sym, DataValue::Inner { children: vec![] }));

        let count_sym = ctx.dict().insert("count");
        let expr = CompiledExpr {
            tokens: vec![
                Token::Step {
                    axis: Axis::Child,
                    test: NodeTest::Named { prefix: None, name: iface_sym },
                },
                Token::FunctionCall { name: count_sym, arg_count: 1 },
                Token::Number(2.0),
                Token::Operator(XPathOp::Eq),
            ],
            tok_pos: vec![0, 0, 0, 0],
            tok_len: vec![0, 0, 0, 0],
            repeat: vec![0, 1, 0, 1],
            prefixes: vec![],
            source: "count(interface) = 2".into(),
        };
        let ectx = EvalCtx { ctx: &ctx, tree: &tree, module: &module };
        assert!(eval_boolean(&ectx, &expr, root).unwrap());
    }
}
