//! The shared per-process schema/data context.
//!
//! `Context` here is deliberately thin: it owns exactly the state every
//! layer needs regardless of which modules are loaded — the dictionary, the
//! context-wide option flags, search directories, and the mount-point
//! shared-context cache. The *module table* (parsed/compiled schema trees)
//! is owned one layer up, by `yang-schema`'s module store, so that
//! `yang-core` stays free of a dependency on the compiled schema types and
//! the crate graph stays acyclic (`yang-core` is the bottom of the stack).

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use crate::error::{with_thread_state, with_thread_state_mut, ErrCode, LogLevel, LogOptions, ValidationCode};
use crate::interner::{Interner, Symbol};
use crate::log::LogCallback;

bitflags::bitflags! {
    /// Options controlling context-wide behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ContextOptions: u16 {
        /// Mark every imported module as implemented, not just explicitly
        /// loaded ones.
        const ALL_IMPLEMENTED = 0b0001;
        /// Implement every module referenced (leafref/augment/deviation/
        /// when/must/default target) from an implemented module.
        const REF_IMPLEMENTED = 0b0010;
        /// Do not implicitly compile `ietf-yang-library`.
        const NO_YANGLIBRARY = 0b0100;
        /// Never consult `searchdirs` to resolve an import/include.
        const DISABLE_SEARCHDIRS = 0b1000;
        /// Prefer `searchdirs` over a caller-supplied module source
        /// callback when both could resolve an import.
        const PREFER_SEARCHDIRS = 0b0001_0000;
    }
}

/// A cache entry for one mount-point label's shared inner context.
pub struct MountCacheEntry {
    pub content_id: u64,
    pub context: Weak<dyn Any + Send + Sync>,
}

/// Shared schema/data context.
///
/// Mutating methods (`dict_mut`, `set_options`, module loading performed by
/// higher layers that hold a `&mut Context`) are not safe to call
/// concurrently with any other access — by design the borrow checker is the
/// enforcement mechanism, matching the "callers serialize mutation" rule.
/// Read-only methods (`dict`, `options`, mount cache lookups) are safe from
/// any number of threads because the dictionary is internally
/// mutex-guarded and the mount cache only ever grows monotonically while
/// shared.
pub struct Context {
    dict: Mutex<Interner>,
    options: ContextOptions,
    searchdirs: Vec<std::path::PathBuf>,
    mount_cache: Mutex<HashMap<Symbol, MountCacheEntry>>,
}

impl Context {
    pub fn new(options: ContextOptions) -> Self {
        Self {
            dict: Mutex::new(Interner::new()),
            options,
            searchdirs: Vec::new(),
            mount_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> ContextOptions {
        self.options
    }

    pub fn set_options(&mut self, options: ContextOptions) {
        self.options = options;
    }

    pub fn searchdirs(&self) -> &[std::path::PathBuf] {
        &self.searchdirs
    }

    /// Add a search directory. Resolution against these directories is a
    /// caller/CLI concern; the context only remembers the list.
    pub fn add_searchdir(&mut self, dir: impl Into<std::path::PathBuf>) {
        self.searchdirs.push(dir.into());
    }

    pub fn dict(&self) -> std::sync::MutexGuard<'_, Interner> {
        self.dict.lock().expect("dictionary mutex poisoned")
    }

    /// Look up, or lazily populate, the shared inner context cached for a
    /// mount-point label. `build` runs only on a cache miss or a
    /// `content_id` mismatch (content_id changing under a live cache entry
    /// is itself a validation error surfaced by the caller, not retried
    /// here).
    pub fn mount_cache_get(&self, label: Symbol) -> Option<(u64, Weak<dyn Any + Send + Sync>)> {
        let cache = self.mount_cache.lock().expect("mount cache mutex poisoned");
        cache
            .get(&label)
            .map(|entry| (entry.content_id, entry.context.clone()))
    }

    pub fn mount_cache_put(&self, label: Symbol, content_id: u64, context: Weak<dyn Any + Send + Sync>) {
        let mut cache = self.mount_cache.lock().expect("mount cache mutex poisoned");
        cache.insert(label, MountCacheEntry { content_id, context });
    }

    // -- Error retrieval --------------------------------------------------
    //
    // The thread-local chain is the source of truth (see `yang_core::error`
    // module docs); these are thin accessors over the current thread's last
    // recorded entry / full chain, matching the toolkit's `ly_err_*` shape.

    pub fn last_error(&self) -> Option<String> {
        with_thread_state(|s| s.last().map(|i| i.message.clone()))
    }

    pub fn last_path(&self) -> Option<String> {
        with_thread_state(|s| s.last().and_then(|i| i.path.clone()))
    }

    pub fn last_err_code(&self) -> ErrCode {
        with_thread_state(|s| s.last().map(|i| i.err_code).unwrap_or(ErrCode::Success))
    }

    pub fn last_vld_code(&self) -> Option<ValidationCode> {
        with_thread_state(|s| s.last().and_then(|i| i.vld_code))
    }

    pub fn last_app_tag(&self) -> Option<String> {
        with_thread_state(|s| s.last().and_then(|i| i.app_tag.clone()))
    }

    /// The full chain recorded on this thread (only more than one entry
    /// deep when `LogOptions::STORE` is set; `STORE_LAST` keeps at most one).
    pub fn errors(&self) -> Vec<crate::error::ErrorItem> {
        with_thread_state(|s| s.items().to_vec())
    }

    /// Truncate this thread's chain back to its first `len` entries.
    pub fn clear_from(&self, len: usize) {
        with_thread_state_mut(|s| s.clear_from(len));
    }

    /// Print the full chain to the registered log sink (stderr by default).
    pub fn print(&self) {
        with_thread_state(|s| {
            for item in s.items() {
                crate::log::dispatch(item, LogOptions::LOG);
            }
        });
    }

    // -- Log control --------------------------------------------------
    //
    // Named distinctly from the context-flags `set_options` above to avoid
    // ambiguity: these all act on this thread's `ErrorState`, not on
    // `ContextOptions`.

    pub fn set_level(&self, level: LogLevel) {
        with_thread_state_mut(|s| s.set_level(level));
    }

    /// Equivalent of the toolkit's thread-wide log option override; since
    /// the error chain here is already thread-local rather than per-context
    /// (see DESIGN.md Open Questions), this and `set_thread_options` are the
    /// same operation.
    pub fn set_log_options(&self, options: LogOptions) {
        with_thread_state_mut(|s| s.set_options(options));
    }

    pub fn set_thread_options(&self, options: LogOptions) {
        self.set_log_options(options);
    }

    pub fn set_callback(&self, cb: Option<LogCallback>) {
        crate::log::set_callback(cb);
    }

    #[cfg(debug_assertions)]
    pub fn set_debug_groups(&self, groups: crate::log::DebugGroups) {
        crate::log::set_debug_groups(groups);
    }
}

/// Trait implemented by whatever owns mount-point resolution (the facade
/// crate at the top of the stack), injected into the validator so
/// `yang-validate` never needs to depend on `yang-compiler`.
pub trait MountResolver {
    /// Opaque compile-time payload attached to a mount-point's extension
    /// instance (produced by the schema compiler, consumed here verbatim).
    type ExtData;

    /// Fetch the compile-time payload for a mount-point instance at the
    /// given data node, if one is attached.
    fn get_ext_data(&self, label: Symbol) -> Option<Self::ExtData>;

    /// Resolve (parsing/compiling as needed) the inner context for a
    /// mount-point instance. `content_id` identifies the schema content so
    /// a cache hit can be distinguished from a stale one.
    fn resolve(
        &self,
        label: Symbol,
        ext_data: &Self::ExtData,
    ) -> Result<Arc<Context>, crate::error::ErrCode>;
}

/// General extension-plugin callback shape: `compile` attaches a payload to
/// an extension instance at schema-compile time, `parse`/`validate` handle
/// instance data carried under it, `free` releases anything `compile` or
/// `parse` allocated beyond what `Drop` already covers. Every method
/// defaults to a no-op / `NotImplemented`, so an implementor overrides only
/// the subset its extension actually uses.
///
/// The one extension implemented by this toolkit (mount-point) does not
/// route through this trait: its compile hook lives directly in
/// `yang-compiler::schema`, and its validate-time resolution goes through
/// the narrower `MountResolver`/`MountSchema` split above, which is enough
/// to describe mount-point's specific needs without forcing `yang-core` (or
/// `yang-validate`) to depend on `yang-compiler`. This trait exists as the
/// general-purpose shape the taxonomy's `ErrCode::Plugin` code implies any
/// *other* extension would implement.
pub trait MountHooks: Send + Sync {
    fn compile(&self, _argument: &str) -> Result<Box<dyn Any + Send + Sync>, ErrCode> {
        Err(ErrCode::NotImplemented)
    }

    fn free(&self, _payload: Box<dyn Any + Send + Sync>) {}

    fn parse(&self, _raw: &str) -> Result<Box<dyn Any + Send + Sync>, ErrCode> {
        Err(ErrCode::NotImplemented)
    }

    fn validate(&self, _payload: &dyn Any) -> Result<(), ErrCode> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dict_is_shared_through_context() {
        let ctx = Context::new(ContextOptions::empty());
        let sym = ctx.dict().insert("foo");
        assert_eq!(ctx.dict().resolve(sym), "foo");
    }

    #[test]
    fn error_retrieval_forwards_to_thread_state() {
        use crate::error::{record, ErrorItem};

        let ctx = Context::new(ContextOptions::empty());
        ctx.set_log_options(LogOptions::STORE);
        ctx.clear_from(0);

        record(
            ErrorItem::new(LogLevel::Error, ErrCode::Validation, "bad leaf")
                .with_path("/top/x")
                .with_vld_code(ValidationCode::Data)
                .with_app_tag("must-violation"),
        );

        assert_eq!(ctx.last_error().as_deref(), Some("bad leaf"));
        assert_eq!(ctx.last_path().as_deref(), Some("/top/x"));
        assert_eq!(ctx.last_err_code(), ErrCode::Validation);
        assert_eq!(ctx.last_vld_code(), Some(ValidationCode::Data));
        assert_eq!(ctx.last_app_tag().as_deref(), Some("must-violation"));
        assert_eq!(ctx.errors().len(), 1);

        ctx.clear_from(0);
        assert!(ctx.errors().is_empty());
    }

    #[test]
    fn mount_hooks_defaults_are_inert() {
        struct Noop;
        impl MountHooks for Noop {}

        let hooks = Noop;
        assert_eq!(hooks.compile("x").unwrap_err(), crate::error::ErrCode::NotImplemented);
        assert_eq!(hooks.parse("x").unwrap_err(), crate::error::ErrCode::NotImplemented);
        assert!(hooks.validate(&()).is_ok());
        hooks.free(Box::new(()));
    }

    #[test]
    fn mount_cache_round_trips() {
        let ctx = Context::new(ContextOptions::empty());
        let sym = ctx.dict().insert("mnt");
        assert!(ctx.mount_cache_get(sym).is_none());
        let inner: Arc<dyn Any + Send + Sync> = Arc::new(42i32);
        ctx.mount_cache_put(sym, 7, Arc::downgrade(&inner));
        let (content_id, weak) = ctx.mount_cache_get(sym).unwrap();
        assert_eq!(content_id, 7);
        assert!(weak.upgrade().is_some());
    }
}
