#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Foundational types shared across the yang toolkit: the dictionary
//! (string interner), the error taxonomy and thread-local error chain, the
//! log level/option surface, and the shared [`Context`].
//!
//! Everything above this crate (`yang-schema`, `yang-compiler`,
//! `yang-validate`) builds on these without needing to agree on anything
//! else, which is what keeps the workspace's crate graph acyclic.

pub mod context;
pub mod error;
pub mod interner;
pub mod log;

pub use context::{Context, ContextOptions, MountHooks, MountResolver};
pub use error::{ErrCode, ErrorItem, LogLevel, LogOptions, ValidationCode};
pub use interner::{Interner, Symbol};
