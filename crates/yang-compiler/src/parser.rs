//! Recursive-descent parser for canonical YANG syntax.
//!
//! YANG's statement grammar is uniform enough (RFC 7950 §6.3:
//! `keyword [argument] (';' | '{' *statement '}')`) that one generic
//! `parse_stmt` handles every statement kind; only the keyword→argument
//! presence distinction (`input`/`output` take none) and prefixed
//! extension keywords need special-casing.

use rowan::{TextRange, TextSize};

use yang_core::{Context, Symbol};
use yang_schema::{Span, Stmt, StmtKeyword};

use crate::diagnostics::Diagnostics;
use crate::lexer::{self, RawToken, Token};

/// Statement keywords that never take an argument.
const NO_ARGUMENT: &[&str] = &["input", "output"];

pub(crate) fn keyword_from_text_pub(text: &str) -> Option<StmtKeyword> {
    keyword_from_text(text)
}

fn keyword_from_text(text: &str) -> Option<StmtKeyword> {
    use StmtKeyword::*;
    Some(match text {
        "module" => Module,
        "submodule" => Submodule,
        "namespace" => Namespace,
        "prefix" => Prefix,
        "import" => Import,
        "include" => Include,
        "revision" => Revision,
        "revision-date" => RevisionDate,
        "yang-version" => YangVersion,
        "belongs-to" => BelongsTo,
        "organization" => Organization,
        "contact" => Contact,
        "description" => Description,
        "reference" => Reference,
        "typedef" => Typedef,
        "type" => Type,
        "grouping" => Grouping,
        "uses" => Uses,
        "refine" => Refine,
        "augment" => Augment,
        "deviation" => Deviation,
        "deviate" => Deviate,
        "container" => Container,
        "leaf" => Leaf,
        "leaf-list" => LeafList,
        "list" => List,
        "choice" => Choice,
        "case" => Case,
        "anydata" => AnyData,
        "anyxml" => AnyXml,
        "rpc" => Rpc,
        "action" => Action,
        "input" => Input,
        "output" => Output,
        "notification" => Notification,
        "identity" => Identity,
        "base" => Base,
        "feature" => Feature,
        "if-feature" => IfFeature,
        "extension" => Extension,
        "argument" => Argument,
        "yin-element" => YinElement,
        "must" => Must,
        "when" => When,
        "default" => Default,
        "mandatory" => Mandatory,
        "min-elements" => MinElements,
        "max-elements" => MaxElements,
        "ordered-by" => OrderedBy,
        "key" => Key,
        "unique" => Unique,
        "config" => Config,
        "status" => Status,
        "units" => Units,
        "presence" => Presence,
        "range" => Range,
        "length" => Length,
        "pattern" => Pattern,
        "modifier" => ModifierInvertMatch,
        "enum" => Enum,
        "bit" => Bit,
        "value" => Value,
        "position" => Position,
        "path" => Path,
        "require-instance" => RequireInstance,
        "fraction-digits" => FractionDigits,
        "error-message" => ErrorMessage,
        "error-app-tag" => ErrorAppTag,
        _ => return None,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("syntax error: {0}")]
    Syntax(String),
}

/// Default cap on nested statement blocks; pathological input (e.g. a
/// generated module with thousands of nested `container`s) hits this
/// instead of overflowing the stack. `Parser::with_recursion_limit` can
/// raise or disable it.
const DEFAULT_RECURSION_LIMIT: u32 = 1000;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'a str,
    ctx: &'a Context,
    diagnostics: Diagnostics,
    depth: u32,
    recursion_limit: Option<u32>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, ctx: &'a Context) -> Self {
        Self {
            tokens: lexer::lex(source),
            pos: 0,
            source,
            ctx,
            diagnostics: Diagnostics::new(),
            depth: 0,
            recursion_limit: Some(DEFAULT_RECURSION_LIMIT),
        }
    }

    /// Override the nested-statement-block depth cap. `None` disables it.
    pub fn with_recursion_limit(mut self, limit: Option<u32>) -> Self {
        self.recursion_limit = limit;
        self
    }

    fn enter_recursion(&mut self) -> bool {
        if let Some(limit) = self.recursion_limit
            && self.depth >= limit
        {
            return false;
        }
        self.depth += 1;
        true
    }

    fn exit_recursion(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn text(&self, token: &Token) -> &'a str {
        &self.source[token.text_start as usize..token.text_end as usize]
    }

    fn range_at(&self, start: u32, end: u32) -> TextRange {
        TextRange::new(TextSize::from(start), TextSize::from(end))
    }

    fn error(&mut self, message: impl Into<String>, start: u32, end: u32) {
        self.diagnostics
            .error(message, self.range_at(start, end))
            .emit();
    }

    /// Parse the whole module/submodule.
    pub fn parse_module(mut self) -> Result<(yang_schema::ParsedModule, Diagnostics), ParseError> {
        let root = match self.parse_stmt() {
            Some(stmt) => stmt,
            None => return Err(ParseError::Syntax("empty input".into())),
        };
        if !matches!(root.keyword, StmtKeyword::Module | StmtKeyword::Submodule) {
            self.error(
                "expected 'module' or 'submodule' at top level",
                root.span.start,
                root.span.end,
            );
        }
        Ok((yang_schema::ParsedModule { root }, self.diagnostics))
    }

    fn intern(&self, text: &str) -> Symbol {
        self.ctx.dict().insert(text)
    }

    /// Resolve a bare or `prefix:` keyword string to a `StmtKeyword`.
    fn resolve_keyword(&mut self, text: &str) -> StmtKeyword {
        if let Some(colon) = text.find(':') {
            let (prefix, name) = (&text[..colon], &text[colon + 1..]);
            return StmtKeyword::Extended(self.intern(prefix), self.intern(name));
        }
        keyword_from_text(text).unwrap_or_else(|| {
            StmtKeyword::Extended(self.intern(""), self.intern(text))
        })
    }

    /// Parse one statement: keyword, optional argument (possibly a `+`
    /// concatenation of quoted strings), then either `;` or a `{ ... }`
    /// block.
    fn parse_stmt(&mut self) -> Option<Stmt> {
        let kw_token = self.bump()?;
        let kw_text = self.text(&kw_token).to_string();
        let keyword = self.resolve_keyword(&kw_text);
        let start = kw_token.text_start;

        let takes_argument = !NO_ARGUMENT.contains(&kw_text.as_str());
        let argument = if takes_argument {
            self.parse_argument()
        } else {
            None
        };

        let mut end = self.peek().map(|t| t.text_end).unwrap_or(start);
        let mut substatements = Vec::new();
        match self.peek().map(|t| t.kind) {
            Some(RawToken::Semicolon) => {
                let semi = self.bump().unwrap();
                end = semi.text_end;
            }
            Some(RawToken::LBrace) => {
                let lbrace = self.bump().unwrap();
                end = lbrace.text_end;
                if !self.enter_recursion() {
                    self.error("statement nesting exceeded the recursion limit", start, end);
                    while !matches!(self.peek().map(|t| t.kind), Some(RawToken::RBrace) | None) {
                        self.bump();
                    }
                    if let Some(rbrace) = self.bump() {
                        end = rbrace.text_end;
                    }
                    let mut stmt = Stmt::new(keyword, argument, Span::new(start, end));
                    stmt.substatements = substatements;
                    return Some(stmt);
                }
                loop {
                    match self.peek().map(|t| t.kind) {
                        Some(RawToken::RBrace) => {
                            let rbrace = self.bump().unwrap();
                            end = rbrace.text_end;
                            break;
                        }
                        None => {
                            self.error("unterminated statement block", start, end);
                            break;
                        }
                        _ => {
                            if let Some(child) = self.parse_stmt() {
                                end = child.span.end;
                                substatements.push(child);
                            } else {
                                break;
                            }
                        }
                    }
                }
                self.exit_recursion();
            }
            _ => {
                self.error("expected ';' or '{' after statement argument", start, end);
            }
        }

        let mut stmt = Stmt::new(keyword, argument, Span::new(start, end));
        stmt.substatements = substatements;
        Some(stmt)
    }

    /// Parse an argument: one quoted/unquoted string, possibly concatenated
    /// with `+` (RFC 7950 §6.1.3).
    fn parse_argument(&mut self) -> Option<Symbol> {
        let first = self.peek()?;
        if matches!(first.kind, RawToken::LBrace | RawToken::Semicolon) {
            return None;
        }
        let token = self.bump()?;
        let mut text = lexer::unquote(self.text(&token));
        while matches!(self.peek().map(|t| t.kind), Some(RawToken::Plus)) {
            self.bump();
            if let Some(next) = self.bump() {
                text.push_str(&lexer::unquote(self.text(&next)));
            } else {
                self.error("expected string after '+'", token.text_start, token.text_end);
                break;
            }
        }
        Some(self.intern(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yang_core::ContextOptions;

    #[test]
    fn parses_minimal_module() {
        let ctx = Context::new(ContextOptions::empty());
        let src = r#"
            module example {
              namespace "urn:example";
              prefix ex;

              container top {
                leaf name {
                  type string;
                }
              }
            }
        "#;
        let parser = Parser::new(src, &ctx);
        let (parsed, diags) = parser.parse_module().unwrap();
        assert!(diags.is_empty(), "{:?}", diags.messages());
        assert_eq!(parsed.root.keyword, StmtKeyword::Module);
        let container = parsed.root.child(StmtKeyword::Container).unwrap();
        assert_eq!(ctx.dict().resolve(container.argument.unwrap()), "top");
        let leaf = container.child(StmtKeyword::Leaf).unwrap();
        assert_eq!(ctx.dict().resolve(leaf.argument.unwrap()), "name");
    }

    #[test]
    fn concatenates_plus_joined_strings() {
        let ctx = Context::new(ContextOptions::empty());
        let src = r#"module m { namespace "a" + "b"; prefix m; }"#;
        let parser = Parser::new(src, &ctx);
        let (parsed, _diags) = parser.parse_module().unwrap();
        let ns = parsed.root.child(StmtKeyword::Namespace).unwrap();
        assert_eq!(ctx.dict().resolve(ns.argument.unwrap()), "ab");
    }

    #[test]
    fn recursion_limit_stops_pathological_nesting() {
        let ctx = Context::new(ContextOptions::empty());
        let mut src = String::from("module m { namespace \"a\"; prefix m; ");
        for _ in 0..10 {
            src.push_str("container c { ");
        }
        for _ in 0..10 {
            src.push('}');
        }
        src.push('}');
        let parser = Parser::new(&src, &ctx).with_recursion_limit(Some(3));
        let (_parsed, diags) = parser.parse_module().unwrap();
        assert!(!diags.is_empty());
        assert!(diags
            .messages()
            .iter()
            .any(|m| m.message.contains("recursion limit")));
    }

    #[test]
    fn extension_keyword_with_prefix() {
        let ctx = Context::new(ContextOptions::empty());
        let src = r#"module m { namespace "a"; prefix m; ext:mount-point "mnt"; }"#;
        let parser = Parser::new(src, &ctx);
        let (parsed, _diags) = parser.parse_module().unwrap();
        let ext = parsed
            .root
            .substatements
            .iter()
            .find(|s| matches!(s.keyword, StmtKeyword::Extended(_, _)))
            .unwrap();
        match ext.keyword {
            StmtKeyword::Extended(prefix, name) => {
                assert_eq!(ctx.dict().resolve(prefix), "ext");
                assert_eq!(ctx.dict().resolve(name), "mount-point");
            }
            _ => unreachable!(),
        }
    }
}
