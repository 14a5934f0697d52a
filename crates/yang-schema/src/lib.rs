//! The parsed and compiled schema data model shared between the compiler
//! and the validator: statement trees, compiled schema nodes, compiled
//! types, the identity DAG, and compiled XPath expressions.

pub mod compiled;
pub mod dfa;
pub mod expr;
pub mod identity;
pub mod module;
pub mod parsed;
pub mod types;

#[cfg(feature = "snapshot")]
pub mod snapshot;

pub use compiled::{CompiledModule, CompiledNode, NodeFlags, NodeId, NodeKind};
pub use expr::{CompiledExpr, Token, XPathOp};
pub use identity::{Identity, IdentityGraph, IdentityId};
pub use module::{Module, ModuleKey, ModuleStore};
pub use parsed::{ParsedModule, Span, Stmt, StmtKeyword};
pub use types::{Builtin, CompiledType, TypePayload};
