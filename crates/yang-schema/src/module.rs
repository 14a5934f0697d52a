//! Module identity and the container tying a module's parsed and compiled
//! trees together.

use std::sync::Arc;

use yang_core::Symbol;

use crate::compiled::CompiledModule;
use crate::parsed::ParsedModule;

/// Identifies one module (or submodule) by name and optional revision.
/// Revision is `None` until a `revision` statement has been seen; two
/// modules with the same name and different (or absent) revisions are
/// distinct entries in a module store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleKey {
    pub name: Symbol,
    pub revision: Option<Symbol>,
}

impl ModuleKey {
    pub fn new(name: Symbol, revision: Option<Symbol>) -> Self {
        Self { name, revision }
    }
}

/// A loaded module: its identity, namespace, parsed tree, and — once the
/// schema compiler has run — its compiled tree.
#[derive(Debug)]
pub struct Module {
    pub key: ModuleKey,
    pub namespace: Symbol,
    pub prefix: Symbol,
    pub is_submodule: bool,
    /// `belongs-to` target, set only for submodules.
    pub belongs_to: Option<Symbol>,
    pub parsed: ParsedModule,
    pub compiled: Option<CompiledModule>,
    /// Whether this module is "implemented" (its data-definition statements
    /// participate in validation) as opposed to merely imported for its
    /// typedefs/groupings/identities.
    pub implemented: bool,
}

impl Module {
    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }
}

/// In-memory module table, owned by whatever composes the compiler and
/// validator together (kept out of `yang-core::Context` to avoid that
/// crate depending on the compiled schema types).
#[derive(Debug, Default)]
pub struct ModuleStore {
    modules: indexmap::IndexMap<ModuleKey, Arc<Module>>,
}

impl ModuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module: Module) -> Arc<Module> {
        let key = module.key;
        let arc = Arc::new(module);
        self.modules.insert(key, arc.clone());
        arc
    }

    pub fn get(&self, key: &ModuleKey) -> Option<&Arc<Module>> {
        self.modules.get(key)
    }

    /// Find the latest-revision entry for a module name (the default when
    /// a reference doesn't pin a revision).
    pub fn get_latest(&self, name: Symbol) -> Option<&Arc<Module>> {
        self.modules
            .values()
            .filter(|m| m.key.name == name)
            .max_by_key(|m| m.key.revision.map(|s| s.as_u32()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Module>> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
