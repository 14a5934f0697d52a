//! Log level/option control and the registered sink callback.
//!
//! Sink *configuration* (what the callback actually does: write to stderr,
//! forward to a tracing subscriber, etc.) is a caller concern; this module
//! only owns the level/options bitfield and invokes whatever callback is
//! registered. The default sink prints to stderr, matching the toolkit's
//! out-of-the-box behavior.

use std::sync::{Mutex, OnceLock};

use crate::error::{ErrorItem, LogLevel, LogOptions};

pub type LogCallback = Box<dyn Fn(&ErrorItem) + Send + Sync>;

fn default_callback(item: &ErrorItem) {
    eprintln!("[{:?}] {}", item.level, item.message);
}

static CALLBACK: OnceLock<Mutex<LogCallback>> = OnceLock::new();

fn callback_slot() -> &'static Mutex<LogCallback> {
    CALLBACK.get_or_init(|| Mutex::new(Box::new(default_callback)))
}

/// Replace the process-wide log sink. `None` restores the default
/// stderr sink.
pub fn set_callback(cb: Option<LogCallback>) {
    let mut slot = callback_slot().lock().expect("log callback mutex poisoned");
    *slot = cb.unwrap_or_else(|| Box::new(default_callback));
}

pub(crate) fn dispatch(item: &ErrorItem, options: LogOptions) {
    if options.contains(LogOptions::LOG) {
        let slot = callback_slot().lock().expect("log callback mutex poisoned");
        (slot)(item);
    }
}

#[cfg(debug_assertions)]
bitflags::bitflags! {
    /// Compile-time-gated debug message groups.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DebugGroups: u8 {
        const DICT = 0b001;
        const XPATH = 0b010;
        const DEP_SETS = 0b100;
    }
}

#[cfg(debug_assertions)]
impl Default for DebugGroups {
    fn default() -> Self {
        DebugGroups::empty()
    }
}

#[cfg(debug_assertions)]
thread_local! {
    static DEBUG_GROUPS: std::cell::Cell<DebugGroups> = std::cell::Cell::new(DebugGroups::empty());
}

#[cfg(debug_assertions)]
pub fn set_debug_groups(groups: DebugGroups) {
    DEBUG_GROUPS.with(|cell| cell.set(groups));
}

#[cfg(debug_assertions)]
pub fn debug_groups() -> DebugGroups {
    DEBUG_GROUPS.with(|cell| cell.get())
}

/// Log a message to both the thread-local chain and the registered sink,
/// honoring the chain's stored level/option state.
pub fn log(item: ErrorItem) {
    let options = crate::error::with_thread_state(|state| state.options());
    let level = crate::error::with_thread_state(|state| state.level());
    if item.level <= level {
        dispatch(&item, options);
    }
    crate::error::record(item);
}

/// Convenience constructor mirroring the taxonomy's common case: an error
/// with no validation subcode.
pub fn error(err_code: crate::error::ErrCode, message: impl Into<String>) {
    log(ErrorItem::new(LogLevel::Error, err_code, message));
}

pub fn warning(message: impl Into<String>) {
    log(ErrorItem::new(
        LogLevel::Warning,
        crate::error::ErrCode::Success,
        message,
    ));
}
