//! YANG compiler: lexer, statement parser (canonical and YIN), XPath
//! expression compiler, type-derivation compiler, and the schema compiler
//! that ties them together into a [`yang_schema::CompiledModule`].
//!
//! - `lexer`/`parser` - canonical YANG statement syntax (RFC 7950 §6)
//! - `yin` - the YIN (XML) equivalent syntax (RFC 7950 §13)
//! - `xpath` - XPath 1.0 + YANG extension functions, compiled to a flat
//!   postfix token array
//! - `types` - `type`/`typedef` compilation with monotonic restriction
//!   tightening (RFC 7950 §9)
//! - `schema` - module-level compilation: `uses`/grouping expansion,
//!   `augment`/`deviation`, the identity DAG
//! - `diagnostics` - error reporting with source-context rendering

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod schema;
pub mod types;
pub mod xpath;
pub mod yin;

pub use diagnostics::{DiagnosticMessage, Diagnostics, Severity};
pub use parser::{ParseError, Parser};
pub use schema::{compile_module, SchemaError};
pub use types::TypeError;
pub use xpath::XPathError;
pub use yin::YinParser;

/// The two concrete source syntaxes a module can be compiled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Yang,
    Yin,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Parse and schema-compile one module from source text, in either
/// concrete syntax.
pub fn compile_source(
    ctx: &yang_core::Context,
    source: &str,
    format: SourceFormat,
) -> Result<(yang_schema::ParsedModule, yang_schema::CompiledModule, Diagnostics), Error> {
    let (parsed, mut diagnostics) = match format {
        SourceFormat::Yang => Parser::new(source, ctx).parse_module()?,
        SourceFormat::Yin => YinParser::new(ctx).parse(source)?,
    };
    let (compiled, schema_diagnostics) = compile_module(ctx, &parsed)?;
    diagnostics.extend(schema_diagnostics);
    Ok((parsed, compiled, diagnostics))
}
