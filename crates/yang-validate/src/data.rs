//! The data tree: instance data validated against a [`CompiledModule`].
//!
//! Mirrors `yang_schema::compiled`'s arena-of-indices shape rather than
//! `Rc<RefCell<_>>`: nodes are pushed once and linked by [`DataId`], read
//! during validation, occasionally mutated in place (default insertion)
//! but never reparented or freed mid-walk.

use yang_core::Symbol;
use yang_schema::compiled::NodeId;

/// Index into a [`DataTree`]'s node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataId(pub u32);

/// One instance's value. Every list entry and every leaf-list entry is its
/// own [`DataNode`] sharing the schema [`NodeId`] of its siblings — there is
/// no separate "the whole list" node, matching how an actual instance
/// document never has one either.
#[derive(Debug)]
pub enum DataValue {
    Leaf(String),
    Inner { children: Vec<DataId> },
    AnyXml(String),
    AnyData(String),
}

impl DataValue {
    pub fn children(&self) -> &[DataId] {
        match self {
            DataValue::Inner { children } => children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<DataId>> {
        match self {
            DataValue::Inner { children } => Some(children),
            _ => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&str> {
        match self {
            DataValue::Leaf(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct DataNode {
    pub parent: Option<DataId>,
    /// The schema node this instance conforms to. `List`/`LeafList` schema
    /// nodes are shared across every entry.
    pub schema: NodeId,
    pub name: Symbol,
    pub value: DataValue,
    /// Set while this subtree is a duplicate constructed to validate a
    /// mount-point's inner content; never set on the tree the caller built.
    pub ext: bool,
    /// Set by default insertion (Pass B) so a caller can tell an inserted
    /// default apart from data the instance document actually carried.
    pub is_default: bool,
}

impl DataNode {
    pub fn new(parent: Option<DataId>, schema: NodeId, name: Symbol, value: DataValue) -> Self {
        Self {
            parent,
            schema,
            name,
            value,
            ext: false,
            is_default: false,
        }
    }
}

/// An arena of [`DataNode`]s plus the set of top-level (document-root)
/// instances.
#[derive(Debug, Default)]
pub struct DataTree {
    nodes: Vec<DataNode>,
    top_level: Vec<DataId>,
}

impl DataTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: DataNode) -> DataId {
        let id = DataId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Push a node and link it as a child of `parent`, or as a new
    /// top-level root if `parent` is `None`.
    pub fn push_child(&mut self, parent: Option<DataId>, node: DataNode) -> DataId {
        let id = self.push(node);
        match parent {
            Some(p) => self.nodes[p.0 as usize]
                .value
                .children_mut()
                .expect("parent is not an inner node")
                .push(id),
            None => self.top_level.push(id),
        }
        id
    }

    pub fn get(&self, id: DataId) -> &DataNode {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: DataId) -> &mut DataNode {
        &mut self.nodes[id.0 as usize]
    }

    pub fn top_level(&self) -> &[DataId] {
        &self.top_level
    }

    /// Replace the top-level instance set, e.g. after `when`-pruning drops
    /// some of them.
    pub fn set_top_level(&mut self, ids: Vec<DataId>) {
        self.top_level = ids;
    }

    pub fn children(&self, id: DataId) -> &[DataId] {
        self.get(id).value.children()
    }

    pub fn parent(&self, id: DataId) -> Option<DataId> {
        self.get(id).parent
    }

    /// Siblings of `id`, `id` included — the set this instance's own
    /// schema-equal siblings must be checked for cardinality/uniqueness
    /// against.
    pub fn siblings(&self, id: DataId) -> &[DataId] {
        match self.parent(id) {
            Some(p) => self.children(p),
            None => &self.top_level,
        }
    }

    pub fn ancestors(&self, id: DataId) -> impl Iterator<Item = DataId> + '_ {
        let mut current = self.parent(id);
        std::iter::from_fn(move || {
            let id = current?;
            current = self.parent(id);
            Some(id)
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_child_links_into_parent() {
        let mut tree = DataTree::new();
        let root = tree.push_child(
            None,
            DataNode::new(None, NodeId(0), Symbol::from_raw(0), DataValue::Inner { children: vec![] }),
        );
        let leaf = tree.push_child(
            Some(root),
            DataNode::new(Some(root), NodeId(1), Symbol::from_raw(1), DataValue::Leaf("5".into())),
        );
        assert_eq!(tree.children(root), &[leaf]);
        assert_eq!(tree.parent(leaf), Some(root));
        assert_eq!(tree.top_level(), &[root]);
    }

    #[test]
    fn ancestors_walks_to_root() {
        let mut tree = DataTree::new();
        let root = tree.push_child(
            None,
            DataNode::new(None, NodeId(0), Symbol::from_raw(0), DataValue::Inner { children: vec![] }),
        );
        let mid = tree.push_child(
            Some(root),
            DataNode::new(Some(root), NodeId(1), Symbol::from_raw(1), DataValue::Inner { children: vec![] }),
        );
        let leaf = tree.push_child(
            Some(mid),
            DataNode::new(Some(mid), NodeId(2), Symbol::from_raw(2), DataValue::Leaf("x".into())),
        );
        let chain: Vec<_> = tree.ancestors(leaf).collect();
        assert_eq!(chain, vec![mid, root]);
    }
}
