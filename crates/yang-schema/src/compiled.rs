//! The compiled schema graph: an arena of [`CompiledNode`]s linked by index
//! rather than by `Rc`/`RefCell`, mirroring how this toolkit's other
//! ID-indexed analysis layers (node tables keyed by a small integer handle)
//! avoid interior mutability for structure that is built once and then only
//! read.

use std::rc::Rc;

use yang_core::Symbol;

use crate::expr::CompiledExpr;
use crate::identity::IdentityGraph;
use crate::types::CompiledType;

/// Index into a [`CompiledModule`]'s node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u16 {
        const CONFIG_FALSE = 0b0000_0001;
        const MANDATORY = 0b0000_0010;
        const STATUS_DEPRECATED = 0b0000_0100;
        const STATUS_OBSOLETE = 0b0000_1000;
        const ORDERED_BY_USER = 0b0001_0000;
        /// Set on a node copied in by `uses` expansion, so augment/deviate
        /// targeting the original grouping path can find it post-copy.
        const FROM_USES = 0b0010_0000;
        /// Set on a node introduced by `augment`, for `augmented_by`
        /// back-reference bookkeeping.
        const AUGMENTED = 0b0100_0000;
        const DEVIATED = 0b1000_0000;
    }
}

/// An attached but unrecognized (to this crate) extension statement
/// instance, keyed by `(module, extension name)`. The mount-point
/// extension is the one instance this toolkit interprets itself; anything
/// else just carries its argument text through for introspection.
#[derive(Debug, Clone)]
pub struct ExtInstance {
    pub module: Symbol,
    pub name: Symbol,
    pub argument: Option<Symbol>,
    pub payload: ExtPayload,
}

#[derive(Debug, Clone)]
pub enum ExtPayload {
    Opaque,
    MountPoint(MountPointData),
}

/// Compile-time payload attached to a mount-point extension instance.
#[derive(Debug, Clone)]
pub struct MountPointData {
    pub label: Symbol,
    /// `true` for `inline`, `false` for `shared` mount points (YANG 1.1
    /// mount-point extension's two config flavors).
    pub shared: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Cardinality {
    pub min_elements: u32,
    pub max_elements: Option<u32>,
}

#[derive(Debug)]
pub enum NodeKind {
    Container {
        children: Vec<NodeId>,
        presence: bool,
    },
    Leaf {
        ty: Rc<CompiledType>,
        default: Option<Symbol>,
        units: Option<Symbol>,
    },
    LeafList {
        ty: Rc<CompiledType>,
        defaults: Vec<Symbol>,
        cardinality: Cardinality,
        units: Option<Symbol>,
    },
    List {
        children: Vec<NodeId>,
        keys: Vec<Symbol>,
        unique_groups: Vec<Vec<Symbol>>,
        cardinality: Cardinality,
    },
    Choice {
        cases: Vec<NodeId>,
        default_case: Option<NodeId>,
    },
    Case {
        children: Vec<NodeId>,
    },
    AnyData,
    AnyXml,
    Rpc {
        input: Option<NodeId>,
        output: Option<NodeId>,
    },
    Action {
        input: Option<NodeId>,
        output: Option<NodeId>,
    },
    Notification {
        children: Vec<NodeId>,
    },
    Input {
        children: Vec<NodeId>,
    },
    Output {
        children: Vec<NodeId>,
    },
}

impl NodeKind {
    pub fn children(&self) -> &[NodeId] {
        match self {
            NodeKind::Container { children, .. }
            | NodeKind::List { children, .. }
            | NodeKind::Case { children }
            | NodeKind::Notification { children }
            | NodeKind::Input { children }
            | NodeKind::Output { children } => children,
            _ => &[],
        }
    }
}

#[derive(Debug)]
pub struct CompiledNode {
    pub parent: Option<NodeId>,
    pub name: Symbol,
    pub module: Symbol,
    pub flags: NodeFlags,
    pub when: Vec<Rc<CompiledExpr>>,
    pub must: Vec<Rc<CompiledExpr>>,
    pub ext_instances: Vec<ExtInstance>,
    pub kind: NodeKind,
}

impl CompiledNode {
    pub fn is_config_false(&self, ancestors: impl Iterator<Item = NodeFlags>) -> bool {
        self.flags.contains(NodeFlags::CONFIG_FALSE)
            || ancestors.into_iter().any(|f| f.contains(NodeFlags::CONFIG_FALSE))
    }

    pub fn mount_point(&self) -> Option<&MountPointData> {
        self.ext_instances.iter().find_map(|e| match &e.payload {
            ExtPayload::MountPoint(data) => Some(data),
            ExtPayload::Opaque => None,
        })
    }
}

/// The compiled schema tree for one module, plus the dependency set's
/// identity graph (identities are set-scoped, not per-module, since `base`
/// can cross module boundaries within one compiled set).
#[derive(Debug)]
pub struct CompiledModule {
    pub nodes: Vec<CompiledNode>,
    /// Top-level data-definition nodes (direct children of the module).
    pub top_level: Vec<NodeId>,
    pub rpcs: Vec<NodeId>,
    pub notifications: Vec<NodeId>,
    pub identities: IdentityGraph,
    pub augmented_by: Vec<Symbol>,
    pub deviated_by: Vec<Symbol>,
}

impl CompiledModule {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            top_level: Vec::new(),
            rpcs: Vec::new(),
            notifications: Vec::new(),
            identities: IdentityGraph::new(),
            augmented_by: Vec::new(),
            deviated_by: Vec::new(),
        }
    }

    pub fn push(&mut self, node: CompiledNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> &CompiledNode {
        &self.nodes[id.0 as usize]
    }

    /// Walk from `id` up through `parent` links, innermost first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = &CompiledNode> {
        let mut current = self.get(id).parent;
        std::iter::from_fn(move || {
            let id = current?;
            let node = self.get(id);
            current = node.parent;
            Some(node)
        })
    }
}

impl Default for CompiledModule {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestors_walks_up_to_root() {
        let mut m = CompiledModule::new();
        let root = m.push(CompiledNode {
            parent: None,
            name: Symbol::from_raw(0),
            module: Symbol::from_raw(0),
            flags: NodeFlags::empty(),
            when: vec![],
            must: vec![],
            ext_instances: vec![],
            kind: NodeKind::Container {
                children: vec![],
                presence: false,
            },
        });
        let child = m.push(CompiledNode {
            parent: Some(root),
            name: Symbol::from_raw(1),
            module: Symbol::from_raw(0),
            flags: NodeFlags::empty(),
            when: vec![],
            must: vec![],
            ext_instances: vec![],
            kind: NodeKind::AnyData,
        });
        let ancestors: Vec<_> = m.ancestors(child).collect();
        assert_eq!(ancestors.len(), 1);
        assert_eq!(ancestors[0].name, Symbol::from_raw(0));
    }

    #[test]
    fn config_false_inherits_from_ancestor() {
        let mut m = CompiledModule::new();
        let root = m.push(CompiledNode {
            parent: None,
            name: Symbol::from_raw(0),
            module: Symbol::from_raw(0),
            flags: NodeFlags::CONFIG_FALSE,
            when: vec![],
            must: vec![],
            ext_instances: vec![],
            kind: NodeKind::Container {
                children: vec![],
                presence: false,
            },
        });
        let child_flags = NodeFlags::empty();
        let ancestors = m.ancestors(root).map(|n| n.flags);
        assert!(!child_flags.contains(NodeFlags::CONFIG_FALSE));
        let root_node = m.get(root);
        assert!(root_node.is_config_false(ancestors));
    }
}
