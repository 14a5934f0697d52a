//! RFC 7951-shaped JSON instance-data codec.
//!
//! Only as much of the wire format as driving the validator against test
//! fixtures and the CLI `validate` subcommand needs: module-prefixed object
//! keys are reduced to their local name (cross-module disambiguation of two
//! same-named siblings is left to the schema lookup, which already runs
//! module-local), and scalars are read with their plain JSON text rather
//! than `accepts_lexical`'s later, stricter check duplicated up front. A
//! full encoder/printer pair, and the XML/LYB instance forms, are out of
//! scope — see `DESIGN.md`.

use serde_json::Value as Json;

use yang_core::{Context, Symbol};
use yang_schema::compiled::{CompiledModule, NodeId, NodeKind};

use crate::data::{DataId, DataNode, DataTree, DataValue};
use crate::validate::flatten_schema_children;

fn local_name(key: &str) -> &str {
    key.rsplit(':').next().unwrap_or(key)
}

fn find_by_name(ctx: &Context, module: &CompiledModule, candidates: &[NodeId], name: &str) -> Option<NodeId> {
    let dict = ctx.dict();
    candidates
        .iter()
        .copied()
        .find(|&id| dict.try_resolve(module.get(id).name) == Some(name))
}

fn json_scalar_to_text(value: &Json) -> Option<String> {
    match value {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        Json::Null | Json::Array(_) | Json::Object(_) => None,
    }
}

fn push_leaf(tree: &mut DataTree, parent: Option<DataId>, schema: NodeId, name: Symbol, text: String) {
    tree.push_child(parent, DataNode::new(parent, schema, name, DataValue::Leaf(text)));
}

fn build_inner(
    ctx: &Context,
    module: &CompiledModule,
    candidates: &[NodeId],
    object: &serde_json::Map<String, Json>,
    tree: &mut DataTree,
    parent: Option<DataId>,
) {
    let mut flat = Vec::new();
    flatten_schema_children(module, candidates, &mut flat);
    for (key, value) in object {
        let Some(schema) = find_by_name(ctx, module, &flat, local_name(key)) else {
            continue;
        };
        let name = module.get(schema).name;
        match &module.get(schema).kind {
            NodeKind::Leaf { .. } => {
                if let Some(text) = json_scalar_to_text(value) {
                    push_leaf(tree, parent, schema, name, text);
                }
            }
            NodeKind::LeafList { .. } => {
                if let Json::Array(items) = value {
                    for item in items {
                        if let Some(text) = json_scalar_to_text(item) {
                            push_leaf(tree, parent, schema, name, text);
                        }
                    }
                }
            }
            NodeKind::Container { children, .. } => {
                if let Json::Object(inner) = value {
                    let children = children.clone();
                    let id = tree.push_child(
                        parent,
                        DataNode::new(parent, schema, name, DataValue::Inner { children: Vec::new() }),
                    );
                    build_inner(ctx, module, &children, inner, tree, Some(id));
                }
            }
            NodeKind::List { children, .. } => {
                if let Json::Array(entries) = value {
                    let children = children.clone();
                    for entry in entries {
                        if let Json::Object(inner) = entry {
                            let id = tree.push_child(
                                parent,
                                DataNode::new(parent, schema, name, DataValue::Inner { children: Vec::new() }),
                            );
                            build_inner(ctx, module, &children, inner, tree, Some(id));
                        }
                    }
                }
            }
            NodeKind::AnyXml => {
                tree.push_child(parent, DataNode::new(parent, schema, name, DataValue::AnyXml(value.to_string())));
            }
            NodeKind::AnyData => {
                tree.push_child(parent, DataNode::new(parent, schema, name, DataValue::AnyData(value.to_string())));
            }
            _ => {}
        }
    }
}

/// Build a [`DataTree`] from a top-level RFC 7951 instance document object.
/// Unrecognized keys and shape mismatches (e.g. a scalar where a list was
/// expected) are skipped rather than rejected outright; Pass A's mandatory/
/// cardinality checks catch what a malformed document leaves out.
pub fn from_json(ctx: &Context, module: &CompiledModule, root: &Json) -> DataTree {
    let mut tree = DataTree::new();
    if let Json::Object(object) = root {
        build_inner(ctx, module, &module.top_level, object, &mut tree, None);
    }
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use yang_core::ContextOptions;
    use yang_schema::compiled::{CompiledNode, NodeFlags};
    use yang_schema::types::{Builtin, CompiledType, RestrictionSet, TypePayload};

    fn string_type() -> std::rc::Rc<CompiledType> {
        std::rc::Rc::new(CompiledType {
            name: None,
            builtin: Builtin::String,
            payload: TypePayload::StringLike {
                length: RestrictionSet::default(),
                patterns: Vec::new(),
            },
        })
    }

    #[test]
    fn builds_container_with_leaf_from_json() {
        let ctx = Context::new(ContextOptions::empty());
        let mod_sym = ctx.dict().insert("m");
        let leaf_sym = ctx.dict().insert("name");
        let top_sym = ctx.dict().insert("top");

        let mut module = CompiledModule::new();
        let leaf = module.push(CompiledNode {
            parent: None,
            name: leaf_sym,
            module: mod_sym,
            flags: NodeFlags::empty(),
            when: Vec::new(),
            must: Vec::new(),
            ext_instances: Vec::new(),
            kind: NodeKind::Leaf { ty: string_type(), default: None, units: None },
        });
        let top = module.push(CompiledNode {
            parent: None,
            name: top_sym,
            module: mod_sym,
            flags: NodeFlags::empty(),
            when: Vec::new(),
            must: Vec::new(),
            ext_instances: Vec::new(),
            kind: NodeKind::Container { children: vec![leaf], presence: false },
        });
        module.top_level.push(top);

        let json: Json = serde_json::json!({ "m:top": { "name": "hello" } });
        let tree = from_json(&ctx, &module, &json);

        assert_eq!(tree.top_level().len(), 1);
        let top_node = tree.get(tree.top_level()[0]);
        assert_eq!(ctx.dict().resolve(top_node.name), "top");
        let children = tree.children(tree.top_level()[0]);
        assert_eq!(children.len(), 1);
        assert_eq!(tree.get(children[0]).value.as_leaf(), Some("hello"));
    }

    #[test]
    fn builds_repeated_list_entries() {
        let ctx = Context::new(ContextOptions::empty());
        let mod_sym = ctx.dict().insert("m");
        let key_sym = ctx.dict().insert("id");
        let list_sym = ctx.dict().insert("entries");

        let mut module = CompiledModule::new();
        let key_leaf = module.push(CompiledNode {
            parent: None,
            name: key_sym,
            module: mod_sym,
            flags: NodeFlags::empty(),
            when: Vec::new(),
            must: Vec::new(),
            ext_instances: Vec::new(),
            kind: NodeKind::Leaf { ty: string_type(), default: None, units: None },
        });
        let list = module.push(CompiledNode {
            parent: None,
            name: list_sym,
            module: mod_sym,
            flags: NodeFlags::empty(),
            when: Vec::new(),
            must: Vec::new(),
            ext_instances: Vec::new(),
            kind: NodeKind::List {
                children: vec![key_leaf],
                keys: vec![key_sym],
                unique_groups: Vec::new(),
                cardinality: Default::default(),
            },
        });
        module.top_level.push(list);

        let json: Json = serde_json::json!({ "entries": [ { "id": "a" }, { "id": "b" } ] });
        let tree = from_json(&ctx, &module, &json);
        assert_eq!(tree.top_level().len(), 2);
    }
}
