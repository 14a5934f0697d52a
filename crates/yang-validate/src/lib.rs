//! Validates instance data against a compiled YANG schema.
//!
//! The data model (`data`), the non-recursive XPath evaluator it needs for
//! `when`/`must`/leafref checks (`xpath_eval`), the two-pass validator
//! itself (`validate`), and the validate-time mount-point driver (`mount`)
//! are kept as separate modules the way `yang-schema`'s own compiled-graph
//! submodules are split by concern rather than piled into one file.

pub mod codec;
pub mod data;
pub mod mount;
pub mod validate;
pub mod xpath_eval;

pub use codec::from_json;
pub use data::{DataId, DataNode, DataTree, DataValue};
pub use mount::{MountSchema, NoMounts};
pub use validate::validate;
pub use xpath_eval::{EvalCtx, EvalError, XValue};
