//! Error taxonomy and the thread-local error/log chain.
//!
//! A [`Context`](crate::Context) does not return rich errors "up the stack"
//! the way a typical Rust library would; callers get a coarse [`ErrCode`]
//! from each fallible operation and can then walk the full diagnostic chain
//! recorded in thread-local storage via [`ErrorState`]. This mirrors how the
//! system this toolkit reimplements reports errors to embedders that are not
//! themselves written in Rust, and is kept here (rather than replaced with a
//! conventional `Result<T, E>` chain) because several components — the
//! parser, the schema compiler, the validator — all need to append to the
//! *same* error list for the duration of one context-scoped operation.

use std::cell::RefCell;
use thiserror::Error;

/// Coarse result code returned by `Context`-owning operations.
///
/// Mirrors the small fixed set of outcomes a caller needs to branch on;
/// the detailed cause lives in the matching [`ErrorItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrCode {
    #[error("success")]
    Success,
    #[error("memory allocation failed")]
    Memory,
    #[error("system call failed")]
    System,
    #[error("invalid argument")]
    Invalid,
    #[error("item already exists")]
    Exist,
    #[error("item not found")]
    NotFound,
    #[error("internal error")]
    Internal,
    #[error("not implemented")]
    NotImplemented,
    #[error("plugin error")]
    Plugin,
    #[error("validation failed")]
    Validation,
    #[error("recompilation required")]
    Recompile,
    #[error("operation incomplete, more data needed")]
    Incomplete,
}

/// Fine-grained validation error subcode, set only when [`ErrCode::Validation`]
/// (or a parse failure) is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationCode {
    /// Generic syntax error (either format).
    Syntax,
    /// Canonical YANG syntax error.
    SyntaxYang,
    /// YIN (XML) syntax error.
    SyntaxYin,
    /// Well-formed but semantically invalid (e.g. conflicting deviations).
    Semantics,
    /// Reference to an undefined identifier (typedef, grouping, identity,
    /// feature, leafref target).
    Reference,
    /// Data instance violates a schema constraint.
    Data,
    /// A `when`/`must` XPath expression evaluated to false.
    WhenMustFalse,
    /// Duplicate instance / key / `unique` violation.
    Duplicate,
    /// Mandatory node missing.
    Mandatory,
    /// `when`/`must` expression itself was malformed.
    XPathSyntax,
}

/// Severity of a logged/recorded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Verbose = 2,
    Debug = 3,
}

/// One entry in the error/log chain.
#[derive(Debug, Clone)]
pub struct ErrorItem {
    pub level: LogLevel,
    pub err_code: ErrCode,
    pub vld_code: Option<ValidationCode>,
    pub message: String,
    /// Schema or data path the error occurred at, if known.
    pub path: Option<String>,
    /// YANG `error-app-tag`, when the failing `must`/`when` supplied one.
    pub app_tag: Option<String>,
}

impl ErrorItem {
    pub fn new(level: LogLevel, err_code: ErrCode, message: impl Into<String>) -> Self {
        Self {
            level,
            err_code,
            vld_code: None,
            message: message.into(),
            path: None,
            app_tag: None,
        }
    }

    pub fn with_vld_code(mut self, code: ValidationCode) -> Self {
        self.vld_code = Some(code);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_app_tag(mut self, app_tag: impl Into<String>) -> Self {
        self.app_tag = Some(app_tag.into());
        self
    }
}

bitflags::bitflags! {
    /// Per-context / per-thread logging option bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LogOptions: u8 {
        /// Forward messages to the registered log callback.
        const LOG = 0b001;
        /// Keep every message in the chain until explicitly cleared.
        const STORE = 0b010;
        /// Keep only the most recent message (truncates the chain to length
        /// <= 1 on every push). Takes priority over `STORE` when both set.
        const STORE_LAST = 0b100;
    }
}

impl Default for LogOptions {
    fn default() -> Self {
        LogOptions::LOG | LogOptions::STORE_LAST
    }
}

/// The error/log chain for one context, one thread.
///
/// Plain `Vec` append rather than the circular-tail linked list this is
/// grounded on: `Vec::push` is already amortized O(1), and the chain is
/// never aliased outside of one `ErrorState`, so the circular-tail
/// technique (which exists to avoid reallocating a shared structure) buys
/// nothing here.
#[derive(Debug, Default)]
pub struct ErrorState {
    items: Vec<ErrorItem>,
    level: LogLevel,
    options: LogOptions,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Warning
    }
}

impl ErrorState {
    pub fn push(&mut self, item: ErrorItem) {
        if item.level > self.level {
            return;
        }
        if self.options.contains(LogOptions::LOG) {
            // Callback dispatch happens at the Context level, which owns
            // the registered sink; ErrorState only owns storage.
        }
        if self.options.contains(LogOptions::STORE_LAST) {
            self.items.clear();
            self.items.push(item);
        } else if self.options.contains(LogOptions::STORE) {
            self.items.push(item);
        }
    }

    pub fn last(&self) -> Option<&ErrorItem> {
        self.items.last()
    }

    pub fn items(&self) -> &[ErrorItem] {
        &self.items
    }

    /// Truncate the chain to `len`, keeping the oldest `len` entries.
    pub fn clear_from(&mut self, len: usize) {
        self.items.truncate(len);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn set_options(&mut self, options: LogOptions) {
        self.options = options;
    }

    pub fn options(&self) -> LogOptions {
        self.options
    }
}

thread_local! {
    static THREAD_ERROR_STATE: RefCell<ErrorState> = RefCell::new(ErrorState::default());
}

/// Record an error/log entry in this thread's chain, applying the
/// thread-local level/option overrides.
pub fn record(item: ErrorItem) {
    THREAD_ERROR_STATE.with(|state| state.borrow_mut().push(item));
}

pub fn with_thread_state<R>(f: impl FnOnce(&ErrorState) -> R) -> R {
    THREAD_ERROR_STATE.with(|state| f(&state.borrow()))
}

pub fn with_thread_state_mut<R>(f: impl FnOnce(&mut ErrorState) -> R) -> R {
    THREAD_ERROR_STATE.with(|state| f(&mut state.borrow_mut()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_last_truncates_to_one() {
        let mut state = ErrorState::default();
        state.set_options(LogOptions::STORE_LAST);
        state.push(ErrorItem::new(LogLevel::Error, ErrCode::Validation, "a"));
        state.push(ErrorItem::new(LogLevel::Error, ErrCode::Validation, "b"));
        assert_eq!(state.items().len(), 1);
        assert_eq!(state.last().unwrap().message, "b");
    }

    #[test]
    fn store_keeps_full_chain() {
        let mut state = ErrorState::default();
        state.set_options(LogOptions::STORE);
        state.push(ErrorItem::new(LogLevel::Error, ErrCode::Validation, "a"));
        state.push(ErrorItem::new(LogLevel::Error, ErrCode::Validation, "b"));
        assert_eq!(state.items().len(), 2);
    }

    #[test]
    fn level_filters_messages_above_threshold() {
        let mut state = ErrorState::default();
        state.set_options(LogOptions::STORE);
        state.set_level(LogLevel::Error);
        state.push(ErrorItem::new(LogLevel::Warning, ErrCode::Validation, "dropped"));
        assert!(state.items().is_empty());
    }
}
