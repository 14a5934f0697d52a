//! The two-pass data validator.
//!
//! Pass A walks the tree in document order checking everything that
//! doesn't depend on `when`/`must`: lexical type validity, leafref
//! existence (when `require-instance` is set), mandatory-node presence,
//! list/leaf-list cardinality, list key uniqueness, and `unique` group
//! uniqueness. Pass B evaluates `when` bottom-up, pruning any subtree whose
//! `when` is false before `must` runs top-down over what's left, then
//! inserts defaults into the pruned tree. This mirrors how the rest of the
//! toolkit keeps the core algorithm a plain tree walk rather than anything
//! resembling the bytecode-VM fetch/dispatch loop that validates a
//! completely different kind of structure.

use std::collections::HashMap;
use std::rc::Rc;

use yang_core::error::{record, ErrCode, ErrorItem, LogLevel, ValidationCode};
use yang_core::{Context, Symbol};
use yang_schema::compiled::{Cardinality, CompiledModule, NodeFlags, NodeId, NodeKind};
use yang_schema::IdentityId;

use crate::data::{DataId, DataNode, DataTree, DataValue};
use crate::mount::MountSchema;
use crate::xpath_eval::{self, EvalCtx};

fn node_label(ctx: &Context, module: &CompiledModule, id: NodeId) -> String {
    ctx.dict().resolve(module.get(id).name).to_string()
}

fn fail(ctx: &Context, module: &CompiledModule, schema: NodeId, code: ValidationCode, message: String) {
    record(
        ErrorItem::new(LogLevel::Error, ErrCode::Validation, message)
            .with_vld_code(code)
            .with_path(node_label(ctx, module, schema)),
    );
}

/// Schema children of `ids`, with any `choice` transparently replaced by
/// every one of its cases' own children — a data instance never names a
/// `choice`/`case` node directly, only what was actually chosen.
pub(crate) fn flatten_schema_children(module: &CompiledModule, ids: &[NodeId], out: &mut Vec<NodeId>) {
    for &id in ids {
        match &module.get(id).kind {
            NodeKind::Choice { cases, .. } => {
                for &case in cases {
                    if let NodeKind::Case { children } = &module.get(case).kind {
                        flatten_schema_children(module, children, out);
                    }
                }
            }
            _ => out.push(id),
        }
    }
}

fn check_cardinality(ctx: &Context, module: &CompiledModule, schema: NodeId, count: usize, card: Cardinality) -> bool {
    let mut ok = true;
    if count < card.min_elements as usize {
        fail(
            ctx,
            module,
            schema,
            ValidationCode::Mandatory,
            format!(
                "'{}' has {} instance(s), needs at least {}",
                node_label(ctx, module, schema),
                count,
                card.min_elements
            ),
        );
        ok = false;
    }
    if let Some(max) = card.max_elements {
        if count > max as usize {
            fail(
                ctx,
                module,
                schema,
                ValidationCode::Data,
                format!(
                    "'{}' has {} instance(s), allows at most {}",
                    node_label(ctx, module, schema),
                    count,
                    max
                ),
            );
            ok = false;
        }
    }
    ok
}

/// Direct (non-recursive) child leaf lookup by name, matching the same
/// "plain child-name step only" scope reduction the schema compiler
/// applies to `augment`/`deviation` path matching.
fn direct_child_leaf<'t>(tree: &'t DataTree, parent: DataId, name: Symbol) -> Option<&'t str> {
    tree.children(parent)
        .iter()
        .find(|&&id| tree.get(id).name == name)
        .and_then(|&id| tree.get(id).value.as_leaf())
}

fn check_list_uniqueness(ctx: &Context, module: &CompiledModule, tree: &DataTree, schema: NodeId, entries: &[DataId]) -> bool {
    let mut ok = true;
    let NodeKind::List { keys, unique_groups, .. } = &module.get(schema).kind else {
        return true;
    };
    if !keys.is_empty() {
        let mut seen: Vec<Vec<String>> = Vec::new();
        for &entry in entries {
            let mut tuple = Vec::with_capacity(keys.len());
            let mut complete = true;
            for &k in keys {
                match direct_child_leaf(tree, entry, k) {
                    Some(v) => tuple.push(v.to_string()),
                    None => {
                        complete = false;
                        fail(
                            ctx,
                            module,
                            schema,
                            ValidationCode::Mandatory,
                            format!("list entry missing key leaf '{}'", ctx.dict().resolve(k)),
                        );
                        ok = false;
                    }
                }
            }
            if complete {
                if seen.contains(&tuple) {
                    fail(ctx, module, schema, ValidationCode::Duplicate, format!("duplicate key {:?}", tuple));
                    ok = false;
                } else {
                    seen.push(tuple);
                }
            }
        }
    }
    for group in unique_groups {
        let mut seen: Vec<Vec<String>> = Vec::new();
        for &entry in entries {
            let mut tuple = Vec::with_capacity(group.len());
            let mut complete = true;
            for &member in group {
                match direct_child_leaf(tree, entry, member) {
                    Some(v) => tuple.push(v.to_string()),
                    None => {
                        complete = false;
                        break;
                    }
                }
            }
            if complete {
                if seen.contains(&tuple) {
                    fail(ctx, module, schema, ValidationCode::Duplicate, format!("'unique' violated: {:?}", tuple));
                    ok = false;
                } else {
                    seen.push(tuple);
                }
            }
        }
    }
    ok
}

/// Look up an identity by (optionally prefixed) name, the same local-name
/// scoping `find_identity` in `xpath_eval.rs` uses for `derived-from()`.
fn find_identity_by_name(ctx: &Context, module: &CompiledModule, name_text: &str) -> Option<IdentityId> {
    let local = name_text.rsplit(':').next().unwrap_or(name_text);
    let dict = ctx.dict();
    module
        .identities
        .iter()
        .find(|identity| dict.try_resolve(identity.name) == Some(local))
        .map(|identity| identity.id)
}

fn check_leaf_type(ctx: &Context, module: &CompiledModule, tree: &DataTree, id: DataId) -> bool {
    let schema = tree.get(id).schema;
    let Some(text) = tree.get(id).value.as_leaf() else { return true };
    let (ty, require_instance, path, identity_bases) = match &module.get(schema).kind {
        NodeKind::Leaf { ty, .. } | NodeKind::LeafList { ty, .. } => match &ty.payload {
            yang_schema::types::TypePayload::Leafref { path, require_instance, .. } => {
                (Some(ty), *require_instance, Some(path.clone()), None)
            }
            yang_schema::types::TypePayload::Identityref { bases } => (Some(ty), false, None, Some(bases.clone())),
            _ => (Some(ty), false, None, None),
        },
        _ => (None, false, None, None),
    };
    let Some(ty) = ty else { return true };
    let mut ok = {
        let dict = ctx.dict();
        ty.accepts_lexical(&dict, text)
    };
    if !ok {
        fail(
            ctx,
            module,
            schema,
            ValidationCode::Data,
            format!("value '{}' does not conform to the type of '{}'", text, node_label(ctx, module, schema)),
        );
    }
    if let Some(path) = path {
        if require_instance {
            let ectx = EvalCtx { ctx, tree, module };
            let resolved = xpath_eval::eval(&ectx, &path, id)
                .map(|v| matches!(v, xpath_eval::XValue::NodeSet(ns) if !ns.is_empty()))
                .unwrap_or(false);
            if !resolved {
                fail(
                    ctx,
                    module,
                    schema,
                    ValidationCode::Reference,
                    format!("leafref '{}' has no target instance", node_label(ctx, module, schema)),
                );
                ok = false;
            }
        }
    }
    if let Some(bases) = identity_bases {
        let value_id = find_identity_by_name(ctx, module, text);
        let accepted = value_id.is_some_and(|vid| bases.iter().any(|&base| module.identities.get(base).derived_from(vid)));
        if !accepted {
            fail(
                ctx,
                module,
                schema,
                ValidationCode::Data,
                format!("value '{}' is not derived from a permitted base identity for '{}'", text, node_label(ctx, module, schema)),
            );
            ok = false;
        }
    }
    ok
}

/// Recursively check everything Pass A covers below `schema_ids`/
/// `data_ids` (the schema children and actual instances at one tree
/// level).
fn walk_pass_a(ctx: &Context, module: &CompiledModule, tree: &DataTree, schema_ids: &[NodeId], data_ids: &[DataId]) -> bool {
    let mut flattened = Vec::new();
    flatten_schema_children(module, schema_ids, &mut flattened);
    let mut ok = true;
    for &schema in &flattened {
        let matches: Vec<DataId> = data_ids.iter().copied().filter(|&id| tree.get(id).schema == schema).collect();
        let node = module.get(schema);
        match &node.kind {
            NodeKind::Leaf { .. } => {
                if node.flags.contains(NodeFlags::MANDATORY) && matches.is_empty() {
                    fail(ctx, module, schema, ValidationCode::Mandatory, format!("mandatory leaf '{}' is missing", node_label(ctx, module, schema)));
                    ok = false;
                }
                for &id in &matches {
                    ok &= check_leaf_type(ctx, module, tree, id);
                }
            }
            NodeKind::LeafList { ty: _, cardinality, .. } => {
                ok &= check_cardinality(ctx, module, schema, matches.len(), *cardinality);
                for &id in &matches {
                    ok &= check_leaf_type(ctx, module, tree, id);
                }
            }
            NodeKind::Container { presence, children } => {
                if !presence && node.flags.contains(NodeFlags::MANDATORY) && matches.is_empty() {
                    fail(ctx, module, schema, ValidationCode::Mandatory, format!("mandatory container '{}' is missing", node_label(ctx, module, schema)));
                    ok = false;
                }
                if matches.is_empty() {
                    // Transparent: mandatory descendants still apply to an
                    // un-instantiated non-presence container.
                    ok &= walk_pass_a(ctx, module, tree, children, &[]);
                } else {
                    for &id in &matches {
                        ok &= walk_pass_a(ctx, module, tree, children, tree.children(id));
                    }
                }
            }
            NodeKind::List { children, cardinality, .. } => {
                ok &= check_cardinality(ctx, module, schema, matches.len(), *cardinality);
                ok &= check_list_uniqueness(ctx, module, tree, schema, &matches);
                for &id in &matches {
                    ok &= walk_pass_a(ctx, module, tree, children, tree.children(id));
                }
            }
            NodeKind::AnyData | NodeKind::AnyXml => {
                if node.flags.contains(NodeFlags::MANDATORY) && matches.is_empty() {
                    fail(ctx, module, schema, ValidationCode::Mandatory, format!("mandatory node '{}' is missing", node_label(ctx, module, schema)));
                    ok = false;
                }
            }
            _ => {}
        }
    }
    ok
}

type WhenMemoKey = (usize, u32);

/// Post-order `when` evaluation: a node's descendants are pruned first, so
/// a child's `when` never runs against a parent that is itself about to be
/// pruned. Returns whether `id` survives.
fn prune_when(ctx: &Context, module: &CompiledModule, tree: &mut DataTree, id: DataId, memo: &mut HashMap<WhenMemoKey, bool>) -> bool {
    let children: Vec<DataId> = tree.children(id).to_vec();
    let mut kept = Vec::with_capacity(children.len());
    for child in children {
        if prune_when(ctx, module, tree, child, memo) {
            kept.push(child);
        }
    }
    if let Some(list) = tree.get_mut(id).value.children_mut() {
        *list = kept;
    }

    let schema = tree.get(id).schema;
    let whens: Vec<Rc<yang_schema::expr::CompiledExpr>> = module.get(schema).when.clone();
    for w in &whens {
        let key = (Rc::as_ptr(w) as *const () as usize, id.0);
        let result = match memo.get(&key) {
            Some(&r) => r,
            None => {
                let ectx = EvalCtx { ctx, tree, module };
                let r = xpath_eval::eval_boolean(&ectx, w, id).unwrap_or(false);
                memo.insert(key, r);
                r
            }
        };
        if !result {
            return false;
        }
    }
    true
}

/// Top-down `must` evaluation over whatever survived pruning.
fn run_must(ctx: &Context, module: &CompiledModule, tree: &DataTree, id: DataId) -> bool {
    let mut ok = true;
    let schema = tree.get(id).schema;
    for m in &module.get(schema).must {
        let ectx = EvalCtx { ctx, tree, module };
        let satisfied = xpath_eval::eval_boolean(&ectx, m, id).unwrap_or(false);
        if !satisfied {
            fail(
                ctx,
                module,
                schema,
                ValidationCode::WhenMustFalse,
                format!("'must' expression '{}' evaluated to false for '{}'", m.source, node_label(ctx, module, schema)),
            );
            ok = false;
        }
    }
    for child in tree.children(id).to_vec() {
        ok &= run_must(ctx, module, tree, child);
    }
    ok
}

/// Insert missing leaf/leaf-list defaults under `parent_data` (or at the
/// top level, for `parent_data: None`) after pruning, per `schema_ids`.
/// The choice/default-case rule only fires when none of the choice's
/// cases contributed any data at all.
fn insert_defaults(ctx: &Context, module: &CompiledModule, tree: &mut DataTree, parent_data: Option<DataId>, schema_ids: &[NodeId]) {
    for &schema in schema_ids {
        let node = module.get(schema);
        match &node.kind {
            NodeKind::Leaf { default: Some(default), .. } => {
                let present = data_children(tree, parent_data).iter().any(|&id| tree.get(id).schema == schema);
                if !present {
                    insert_default_leaf(ctx, tree, parent_data, schema, node.name, *default);
                }
            }
            NodeKind::LeafList { defaults, .. } if !defaults.is_empty() => {
                let present = data_children(tree, parent_data).iter().any(|&id| tree.get(id).schema == schema);
                if !present {
                    let defaults = defaults.clone();
                    for d in defaults {
                        insert_default_leaf(ctx, tree, parent_data, schema, node.name, d);
                    }
                }
            }
            NodeKind::Container { presence: false, children } => {
                let matches: Vec<DataId> = data_children(tree, parent_data).iter().copied().filter(|&id| tree.get(id).schema == schema).collect();
                if let Some(&inst) = matches.first() {
                    insert_defaults(ctx, module, tree, Some(inst), children);
                }
            }
            NodeKind::List { children, .. } => {
                let matches: Vec<DataId> = data_children(tree, parent_data).iter().copied().filter(|&id| tree.get(id).schema == schema).collect();
                for inst in matches {
                    insert_defaults(ctx, module, tree, Some(inst), children);
                }
            }
            NodeKind::Choice { cases, default_case } => {
                let any_case_present = cases.iter().any(|&case| {
                    if let NodeKind::Case { children } = &module.get(case).kind {
                        let mut flat = Vec::new();
                        flatten_schema_children(module, children, &mut flat);
                        flat.iter().any(|&s| data_children(tree, parent_data).iter().any(|&id| tree.get(id).schema == s))
                    } else {
                        false
                    }
                });
                if !any_case_present {
                    if let Some(default_case) = default_case {
                        if let NodeKind::Case { children } = &module.get(*default_case).kind {
                            insert_defaults(ctx, module, tree, parent_data, children);
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn data_children(tree: &DataTree, parent: Option<DataId>) -> Vec<DataId> {
    match parent {
        Some(id) => tree.children(id).to_vec(),
        None => tree.top_level().to_vec(),
    }
}

fn insert_default_leaf(ctx: &Context, tree: &mut DataTree, parent: Option<DataId>, schema: NodeId, name: Symbol, value: Symbol) {
    let text = ctx.dict().resolve(value).to_string();
    let mut node = DataNode::new(parent, schema, name, DataValue::Leaf(text));
    node.is_default = true;
    tree.push_child(parent, node);
}

/// Run the full validator: Pass A, then `when` pruning, `must`, and
/// default insertion.
pub fn validate<R: MountSchema>(ctx: &Context, module: &CompiledModule, tree: &mut DataTree, mounts: &R) -> Result<(), ErrCode> {
    let mut ok = walk_pass_a(ctx, module, tree, &module.top_level, &tree.top_level().to_vec());

    let mut memo = HashMap::new();
    let mut kept_roots = Vec::new();
    for root in tree.top_level().to_vec() {
        if prune_when(ctx, module, tree, root, &mut memo) {
            kept_roots.push(root);
        }
    }
    tree.set_top_level(kept_roots);

    insert_defaults(ctx, module, tree, None, &module.top_level);

    for root in tree.top_level().to_vec() {
        ok &= run_must(ctx, module, tree, root);
    }

    if crate::mount::validate_mounts(ctx, module, tree, mounts).is_err() {
        ok = false;
    }

    if ok {
        Ok(())
    } else {
        Err(ErrCode::Validation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yang_core::ContextOptions;
    use yang_schema::compiled::{CompiledNode, NodeFlags};
    use yang_schema::types::{Builtin, CompiledType, RestrictionSet, TypePayload};

    use crate::mount::NoMounts;

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
    fn missing_mandatory_leaf_is_reported() {
        let ctx = Context::new(ContextOptions::empty());
        let mod_sym = ctx.dict().insert("m");
        let root_sym = ctx.dict().insert("top");
        let leaf_sym = ctx.dict().insert("required");

        let mut module = CompiledModule::new();
        let leaf = module.push(CompiledNode {
            parent: None,
            name: leaf_sym,
            module: mod_sym,
            flags: NodeFlags::MANDATORY,
            when: vec![],
            must: vec![],
            ext_instances: vec![],
            kind: NodeKind::Leaf { ty: string_type(), default: None, units: None },
        });
        let root = module.push(CompiledNode {
            parent: None,
            name: root_sym,
            module: mod_sym,
            flags: NodeFlags::empty(),
            when: vec![],
            must: vec![],
            ext_instances: vec![],
            kind: NodeKind::Container { children: vec![leaf], presence: false },
        });
        module.top_level.push(root);

        let mut tree = DataTree::new();
        tree.push_child(None, DataNode::new(None, root, root_sym, DataValue::Inner { children: vec![] }));

        let result = validate(&ctx, &module, &mut tree, &NoMounts);
        assert!(result.is_err());
    }

    #[test]
    fn present_mandatory_leaf_passes() {
        let ctx = Context::new(ContextOptions::empty());
        let mod_sym = ctx.dict().insert("m");
        let root_sym = ctx.dict().insert("top");
        let leaf_sym = ctx.dict().insert("required");

        let mut module = CompiledModule::new();
        let leaf = module.push(CompiledNode {
            parent: None,
            name: leaf_sym,
            module: mod_sym,
            flags: NodeFlags::MANDATORY,
            when: vec![],
            must: vec![],
            ext_instances: vec![],
            kind: NodeKind::Leaf { ty: string_type(), default: None, units: None },
        });
        let root = module.push(CompiledNode {
            parent: None,
            name: root_sym,
            module: mod_sym,
            flags: NodeFlags::empty(),
            when: vec![],
            must: vec![],
            ext_instances: vec![],
            kind: NodeKind::Container { children: vec![leaf], presence: false },
        });
        module.top_level.push(root);

        let mut tree = DataTree::new();
        let root_id = tree.push_child(None, DataNode::new(None, root, root_sym, DataValue::Inner { children: vec![] }));
        tree.push_child(Some(root_id), DataNode::new(Some(root_id), leaf, leaf_sym, DataValue::Leaf("x".into())));

        let result = validate(&ctx, &module, &mut tree, &NoMounts);
        assert!(result.is_ok());
    }

    #[test]
    fn identityref_accepts_derived_and_rejects_unrelated() {
        let ctx = Context::new(ContextOptions::empty());
        let mod_sym = ctx.dict().insert("m");
        let animal_sym = ctx.dict().insert("animal");
        let mammal_sym = ctx.dict().insert("mammal");
        let dog_sym = ctx.dict().insert("dog");
        let plant_sym = ctx.dict().insert("plant");
        let leaf_sym = ctx.dict().insert("kind");

        let mut module = CompiledModule::new();
        let animal = module.identities.push(animal_sym, mod_sym, vec![]);
        let mammal = module.identities.push(mammal_sym, mod_sym, vec![animal]);
        let _dog = module.identities.push(dog_sym, mod_sym, vec![mammal]);
        let _plant = module.identities.push(plant_sym, mod_sym, vec![]);
        module.identities.materialize_derived();

        let ty = Rc::new(CompiledType {
            name: None,
            builtin: Builtin::Identityref,
            payload: TypePayload::Identityref { bases: vec![animal] },
        });
        let leaf = module.push(CompiledNode {
            parent: None,
            name: leaf_sym,
            module: mod_sym,
            flags: NodeFlags::empty(),
            when: vec![],
            must: vec![],
            ext_instances: vec![],
            kind: NodeKind::Leaf { ty, default: None, units: None },
        });
        module.top_level.push(leaf);

        let mut ok_tree = DataTree::new();
        ok_tree.push_child(None, DataNode::new(None, leaf, leaf_sym, DataValue::Leaf("dog".into())));
        assert!(validate(&ctx, &module, &mut ok_tree, &NoMounts).is_ok());

        let mut bad_tree = DataTree::new();
        bad_tree.push_child(None, DataNode::new(None, leaf, leaf_sym, DataValue::Leaf("plant".into())));
        assert!(validate(&ctx, &module, &mut bad_tree, &NoMounts).is_err());
    }
}
