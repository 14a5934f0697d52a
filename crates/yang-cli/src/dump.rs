//! Plain-text dump of a compiled schema tree, for `yang dump`.

use std::fmt::Write as _;

use yang_core::Context;
use yang_schema::compiled::{CompiledModule, NodeId, NodeKind};

fn kind_name(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Container { .. } => "container",
        NodeKind::Leaf { .. } => "leaf",
        NodeKind::LeafList { .. } => "leaf-list",
        NodeKind::List { .. } => "list",
        NodeKind::Choice { .. } => "choice",
        NodeKind::Case { .. } => "case",
        NodeKind::AnyData => "anydata",
        NodeKind::AnyXml => "anyxml",
        NodeKind::Rpc { .. } => "rpc",
        NodeKind::Action { .. } => "action",
        NodeKind::Notification { .. } => "notification",
        NodeKind::Input { .. } => "input",
        NodeKind::Output { .. } => "output",
    }
}

fn dump_node(ctx: &Context, module: &CompiledModule, id: NodeId, depth: usize, out: &mut String) {
    let node = module.get(id);
    let _ = writeln!(
        out,
        "{}{} ({})",
        "  ".repeat(depth),
        ctx.dict().resolve(node.name),
        kind_name(&node.kind)
    );
    match &node.kind {
        NodeKind::Rpc { input, output } | NodeKind::Action { input, output } => {
            if let Some(input) = input {
                dump_node(ctx, module, *input, depth + 1, out);
            }
            if let Some(output) = output {
                dump_node(ctx, module, *output, depth + 1, out);
            }
        }
        kind => {
            for &child in kind.children() {
                dump_node(ctx, module, child, depth + 1, out);
            }
        }
    }
}

pub fn dump_module(ctx: &Context, module: &CompiledModule) -> String {
    let mut out = String::new();
    for &id in &module.top_level {
        dump_node(ctx, module, id, 0, &mut out);
    }
    for &id in &module.rpcs {
        dump_node(ctx, module, id, 0, &mut out);
    }
    for &id in &module.notifications {
        dump_node(ctx, module, id, 0, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use yang_core::ContextOptions;
    use yang_schema::compiled::{CompiledNode, NodeFlags};
    use yang_schema::types::{Builtin, CompiledType, RestrictionSet, TypePayload};

    #[test]
    fn dumps_nested_container_and_leaf() {
        let ctx = Context::new(ContextOptions::empty());
        let mod_sym = ctx.dict().insert("m");
        let leaf_name = ctx.dict().insert("name");
        let top_name = ctx.dict().insert("top");

        let mut module = CompiledModule::new();
        let leaf = module.push(CompiledNode {
            parent: None,
            name: leaf_name,
            module: mod_sym,
            flags: NodeFlags::empty(),
            when: Vec::new(),
            must: Vec::new(),
            ext_instances: Vec::new(),
            kind: NodeKind::Leaf {
                ty: std::rc::Rc::new(CompiledType {
                    name: None,
                    builtin: Builtin::String,
                    payload: TypePayload::StringLike {
                        length: RestrictionSet::default(),
                        patterns: Vec::new(),
                    },
                }),
                default: None,
                units: None,
            },
        });
        let top = module.push(CompiledNode {
            parent: None,
            name: top_name,
            module: mod_sym,
            flags: NodeFlags::empty(),
            when: Vec::new(),
            must: Vec::new(),
            ext_instances: Vec::new(),
            kind: NodeKind::Container { children: vec![leaf], presence: false },
        });
        module.top_level.push(top);

        let text = dump_module(&ctx, &module);
        assert_eq!(text, "top (container)\n  name (leaf)\n");
    }
}
