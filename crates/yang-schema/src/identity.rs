//! The identity DAG: `identity`/`base` statements compiled into a graph
//! with materialized "derived from" sets so `derived-from(-or-self)()` is
//! an O(1) set lookup instead of a graph walk at evaluation time.

use yang_core::Symbol;

/// Index into a [`crate::compiled::CompiledModule`]'s identity table,
/// unique within one compiled dependency set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityId(pub u32);

#[derive(Debug)]
pub struct Identity {
    pub id: IdentityId,
    pub name: Symbol,
    pub module: Symbol,
    pub bases: Vec<IdentityId>,
    /// Every identity that directly or transitively derives from this one,
    /// materialized once the whole dependency set's identities are known
    /// (identity statements can forward-reference a base declared later in
    /// the same or another module in the set).
    pub derived: Vec<IdentityId>,
}

impl Identity {
    pub fn derived_from(&self, other: IdentityId) -> bool {
        self.id == other || self.derived.contains(&other)
    }
}

/// The identity table for one compiled dependency set.
#[derive(Debug, Default)]
pub struct IdentityGraph {
    identities: Vec<Identity>,
}

impl IdentityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: Symbol, module: Symbol, bases: Vec<IdentityId>) -> IdentityId {
        let id = IdentityId(self.identities.len() as u32);
        self.identities.push(Identity {
            id,
            name,
            module,
            bases,
            derived: Vec::new(),
        });
        id
    }

    pub fn get(&self, id: IdentityId) -> &Identity {
        &self.identities[id.0 as usize]
    }

    /// Materialize every identity's `derived` set by propagating along
    /// `bases` edges until a fixed point. Must run once after every
    /// identity in the dependency set has been pushed, since `base` may
    /// forward-reference an identity declared later.
    pub fn materialize_derived(&mut self) {
        let n = self.identities.len();
        let bases: Vec<Vec<IdentityId>> = self.identities.iter().map(|i| i.bases.clone()).collect();
        let mut changed = true;
        while changed {
            changed = false;
            for derived_idx in 0..n {
                let derived_id = IdentityId(derived_idx as u32);
                for &base_id in &bases[derived_idx] {
                    let base = &mut self.identities[base_id.0 as usize];
                    if !base.derived.contains(&derived_id) {
                        base.derived.push(derived_id);
                        changed = true;
                    }
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.identities.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materialize_propagates_transitively() {
        let mut g = IdentityGraph::new();
        let a = g.push(Symbol::from_raw(0), Symbol::from_raw(99), vec![]);
        let b = g.push(Symbol::from_raw(1), Symbol::from_raw(99), vec![a]);
        let c = g.push(Symbol::from_raw(2), Symbol::from_raw(99), vec![b]);
        g.materialize_derived();
        assert!(g.get(a).derived_from(a));
        assert!(g.get(c).derived_from(c));
        assert!(g.get(a).derived.contains(&b));
        assert!(g.get(a).derived.contains(&c));
        assert!(!g.get(c).derived.contains(&a));
    }

    #[test]
    fn forward_reference_base_still_materializes() {
        let mut g = IdentityGraph::new();
        // child declared (and pushed) before its base
        let child = g.push(Symbol::from_raw(0), Symbol::from_raw(99), vec![IdentityId(1)]);
        let _base = g.push(Symbol::from_raw(1), Symbol::from_raw(99), vec![]);
        g.materialize_derived();
        assert!(g.get(IdentityId(1)).derived.contains(&child));
    }
}
