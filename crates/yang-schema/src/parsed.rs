//! The parsed node: a plain tagged-variant tree over the YANG statement set.
//!
//! This is intentionally not a lossless/incremental-editing CST — there is
//! no requirement to round-trip comments or whitespace, so every statement
//! is a `Stmt { keyword, argument, substatements, span }` node regardless of
//! source format (canonical YANG or YIN). The span type is a plain byte
//! range rather than `rowan::TextRange` so this crate doesn't need to
//! depend on `rowan`; the parser (which does) converts at the boundary.

use yang_core::Symbol;

/// A byte range in the original source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

/// The YANG statement keyword, either a built-in keyword or an extension
/// statement identified by `(prefix, name)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StmtKeyword {
    Module,
    Submodule,
    Namespace,
    Prefix,
    Import,
    Include,
    Revision,
    RevisionDate,
    YangVersion,
    BelongsTo,
    Organization,
    Contact,
    Description,
    Reference,
    Typedef,
    Type,
    Grouping,
    Uses,
    Refine,
    Augment,
    Deviation,
    Deviate,
    Container,
    Leaf,
    LeafList,
    List,
    Choice,
    Case,
    AnyData,
    AnyXml,
    Rpc,
    Action,
    Input,
    Output,
    Notification,
    Identity,
    Base,
    Feature,
    IfFeature,
    Extension,
    Argument,
    YinElement,
    Must,
    When,
    Default,
    Mandatory,
    MinElements,
    MaxElements,
    OrderedBy,
    Key,
    Unique,
    Config,
    Status,
    Units,
    Presence,
    Range,
    Length,
    Pattern,
    ModifierInvertMatch,
    Enum,
    Bit,
    Value,
    Position,
    Path,
    RequireInstance,
    FractionDigits,
    ErrorMessage,
    ErrorAppTag,
    /// A statement whose keyword is `prefix:name`, bound to an extension
    /// defined in the module identified by `prefix`.
    Extended(Symbol, Symbol),
}

/// One parsed statement and its substatements, in source order.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub keyword: StmtKeyword,
    /// The statement's quoted/unquoted argument string, if it takes one.
    pub argument: Option<Symbol>,
    pub substatements: Vec<Stmt>,
    pub span: Span,
}

impl Stmt {
    pub fn new(keyword: StmtKeyword, argument: Option<Symbol>, span: Span) -> Self {
        Self {
            keyword,
            argument,
            substatements: Vec::new(),
            span,
        }
    }

    pub fn children(&self, keyword: StmtKeyword) -> impl Iterator<Item = &Stmt> {
        self.substatements
            .iter()
            .filter(move |s| s.keyword == keyword)
    }

    pub fn child(&self, keyword: StmtKeyword) -> Option<&Stmt> {
        self.children(keyword).next()
    }
}

/// A fully parsed module or submodule, before schema compilation.
#[derive(Debug, Clone)]
pub struct ParsedModule {
    /// The top-level `module`/`submodule` statement; everything else hangs
    /// off its `substatements`.
    pub root: Stmt,
}

impl ParsedModule {
    pub fn is_submodule(&self) -> bool {
        matches!(self.root.keyword, StmtKeyword::Submodule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_filters_by_keyword() {
        let mut root = Stmt::new(StmtKeyword::Container, None, Span::default());
        root.substatements.push(Stmt::new(StmtKeyword::Leaf, None, Span::default()));
        root.substatements.push(Stmt::new(StmtKeyword::Leaf, None, Span::default()));
        root.substatements.push(Stmt::new(StmtKeyword::Config, None, Span::default()));
        assert_eq!(root.children(StmtKeyword::Leaf).count(), 2);
        assert!(root.child(StmtKeyword::Config).is_some());
        assert!(root.child(StmtKeyword::Presence).is_none());
    }
}
