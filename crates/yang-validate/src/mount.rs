//! Validate-time mount-point resolution.
//!
//! `yang-validate` never depends on `yang-compiler`, so it has no way to
//! compile a mount point's inner schema itself. [`MountSchema`] is the seam:
//! the facade crate that does own a compiler implements it on top of a real
//! module store, and everything here only ever calls through the trait.

use std::sync::Arc;

use yang_core::error::{record, ErrCode, ErrorItem, LogLevel, ValidationCode};
use yang_core::context::MountResolver;
use yang_core::{Context, Symbol};
use yang_schema::compiled::{CompiledModule, NodeId};

use crate::data::{DataId, DataNode, DataTree, DataValue};
use crate::validate::{flatten_schema_children, validate};

/// Extends [`MountResolver`] with the one extra thing the validator needs
/// beyond an inner [`Context`]: the compiled schema to check a mount's
/// inner content against.
pub trait MountSchema: MountResolver {
    fn schema_for(&self, label: Symbol, ext_data: &Self::ExtData) -> Result<Arc<CompiledModule>, ErrCode>;

    /// Identifies the mount's schema content, so a cache hit under a
    /// changed schema can be told apart from a genuine cache hit.
    fn content_id(&self, ext_data: &Self::ExtData) -> u64;
}

/// No-op implementor for contexts with no mount points compiled in.
pub struct NoMounts;

impl MountResolver for NoMounts {
    type ExtData = ();

    fn get_ext_data(&self, _label: Symbol) -> Option<Self::ExtData> {
        None
    }

    fn resolve(&self, _label: Symbol, _ext_data: &Self::ExtData) -> Result<Arc<Context>, ErrCode> {
        Err(ErrCode::NotImplemented)
    }
}

impl MountSchema for NoMounts {
    fn schema_for(&self, _label: Symbol, _ext_data: &Self::ExtData) -> Result<Arc<CompiledModule>, ErrCode> {
        Err(ErrCode::NotImplemented)
    }

    fn content_id(&self, _ext_data: &Self::ExtData) -> u64 {
        0
    }
}

fn find_schema_by_name(ctx: &Context, module: &CompiledModule, candidates: &[NodeId], name: Symbol) -> Option<NodeId> {
    let dict = ctx.dict();
    candidates.iter().copied().find(|&id| dict.try_resolve(module.get(id).name) == dict.try_resolve(name))
}

/// Copy one data subtree into a freshly built inner tree, remapping each
/// node to the inner module's schema by name. Only the mount node's own
/// children are duplicated — a parent document's ancestor chain above the
/// mount point is discarded rather than reconstructed, since nothing in the
/// inner schema can reference outside the mount anyway.
fn duplicate_subtree(ctx: &Context, src: &DataTree, src_id: DataId, module: &CompiledModule, candidates: &[NodeId], dst: &mut DataTree, dst_parent: Option<DataId>) {
    let mut flat = Vec::new();
    flatten_schema_children(module, candidates, &mut flat);
    let name = src.get(src_id).name;
    let Some(schema) = find_schema_by_name(ctx, module, &flat, name) else {
        return;
    };
    let value = match &src.get(src_id).value {
        DataValue::Leaf(s) => DataValue::Leaf(s.clone()),
        DataValue::AnyXml(s) => DataValue::AnyXml(s.clone()),
        DataValue::AnyData(s) => DataValue::AnyData(s.clone()),
        DataValue::Inner { .. } => DataValue::Inner { children: Vec::new() },
    };
    let mut node = DataNode::new(dst_parent, schema, name, value);
    node.ext = true;
    let new_id = dst.push_child(dst_parent, node);
    let child_candidates = module.get(schema).kind.children().to_vec();
    for &child in src.children(src_id) {
        duplicate_subtree(ctx, src, child, module, &child_candidates, dst, Some(new_id));
    }
}

/// Validate one mount point's inner content: fetch its schema, check the
/// shared-context cache for a stale entry (spec scenario S6 — a
/// `content_id` mismatch under a live cache entry is a validation error,
/// not silently recompiled), duplicate the mount node's children into a
/// fresh tree, and run the full validator against the inner schema.
fn validate_one_mount<R: MountSchema>(ctx: &Context, mounts: &R, src: &DataTree, mount_id: DataId, label: Symbol) -> Result<(), ErrCode> {
    let Some(ext_data) = mounts.get_ext_data(label) else {
        return Ok(());
    };
    let content_id = mounts.content_id(&ext_data);

    if let Some((cached_id, weak)) = ctx.mount_cache_get(label) {
        if cached_id != content_id {
            record(
                ErrorItem::new(
                    LogLevel::Error,
                    ErrCode::Validation,
                    format!("mount point '{}' content changed under a live shared context", ctx.dict().resolve(label)),
                )
                .with_vld_code(ValidationCode::Semantics),
            );
            return Err(ErrCode::Validation);
        }
        if weak.upgrade().is_none() {
            let inner_ctx: Arc<dyn std::any::Any + Send + Sync> = mounts.resolve(label, &ext_data)?;
            ctx.mount_cache_put(label, content_id, Arc::downgrade(&inner_ctx));
        }
    } else {
        let inner_ctx: Arc<dyn std::any::Any + Send + Sync> = mounts.resolve(label, &ext_data)?;
        ctx.mount_cache_put(label, content_id, Arc::downgrade(&inner_ctx));
    }

    let inner_module = mounts.schema_for(label, &ext_data)?;
    let mut inner_tree = DataTree::new();
    for &child in src.children(mount_id) {
        duplicate_subtree(ctx, src, child, &inner_module, &inner_module.top_level, &mut inner_tree, None);
    }
    validate(ctx, &inner_module, &mut inner_tree, mounts)
}

/// Walk the whole tree looking for data nodes whose schema carries a
/// mount-point extension instance, validating each one's inner content in
/// turn.
pub fn validate_mounts<R: MountSchema>(ctx: &Context, module: &CompiledModule, tree: &DataTree, mounts: &R) -> Result<(), ErrCode> {
    let mut ok = true;
    let mut stack: Vec<DataId> = tree.top_level().to_vec();
    while let Some(id) = stack.pop() {
        let schema = tree.get(id).schema;
        if let Some(data) = module.get(schema).mount_point() {
            if validate_one_mount(ctx, mounts, tree, id, data.label).is_err() {
                ok = false;
            }
        }
        stack.extend(tree.children(id));
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
    use std::cell::Cell;

    use yang_schema::compiled::{CompiledNode, ExtInstance, ExtPayload, MountPointData, NodeFlags, NodeKind};

    #[test]
    fn no_mounts_reports_nothing_to_resolve() {
        let ctx = Context::new(yang_core::ContextOptions::empty());
        let label = ctx.dict().insert("mnt");
        assert!(NoMounts.get_ext_data(label).is_none());
        assert_eq!(NoMounts.content_id(&()), 0);
    }

    struct TestMounts {
        content_id: Cell<u64>,
    }

    impl MountResolver for TestMounts {
        type ExtData = u64;

        fn get_ext_data(&self, _label: Symbol) -> Option<u64> {
            Some(self.content_id.get())
        }

        fn resolve(&self, _label: Symbol, _ext_data: &u64) -> Result<Arc<Context>, ErrCode> {
            Ok(Arc::new(Context::new(yang_core::ContextOptions::empty())))
        }
    }

    impl MountSchema for TestMounts {
        fn schema_for(&self, _label: Symbol, _ext_data: &u64) -> Result<Arc<CompiledModule>, ErrCode> {
            Ok(Arc::new(CompiledModule::new()))
        }

        fn content_id(&self, ext_data: &u64) -> u64 {
            *ext_data
        }
    }

    /// Spec scenario S6: two validation passes sharing one live context under
    /// one content id succeed, but a third pass under a changed content id is
    /// a validation error rather than a silent recompile.
    #[test]
    fn content_id_mismatch_under_live_cache_is_an_error() {
        let ctx = Context::new(yang_core::ContextOptions::empty());
        let mod_sym = ctx.dict().insert("m");
        let label = ctx.dict().insert("mnt");

        let mut module = CompiledModule::new();
        let mount = module.push(CompiledNode {
            parent: None,
            name: label,
            module: mod_sym,
            flags: NodeFlags::empty(),
            when: Vec::new(),
            must: Vec::new(),
            ext_instances: vec![ExtInstance {
                module: mod_sym,
                name: label,
                argument: Some(label),
                payload: ExtPayload::MountPoint(MountPointData { label, shared: true }),
            }],
            kind: NodeKind::Container { children: Vec::new(), presence: true },
        });
        module.top_level.push(mount);

        let mut tree = DataTree::new();
        tree.push_child(None, DataNode::new(None, mount, label, DataValue::Inner { children: Vec::new() }));

        let mounts = TestMounts { content_id: Cell::new(1) };
        assert!(validate_mounts(&ctx, &module, &tree, &mounts).is_ok());

        mounts.content_id.set(2);
        assert!(validate_mounts(&ctx, &module, &tree, &mounts).is_err());
    }
}
