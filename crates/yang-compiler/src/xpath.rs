//! XPath 1.0 (+ YANG's `current()` and derived-from family of extension
//! functions) expression compiler.
//!
//! Parses with a small hand-rolled precedence-climbing recursive descent
//! and emits directly in postfix (RPN) order into [`CompiledExpr`], so the
//! non-recursive evaluator in `yang-validate` only ever needs a single
//! explicit operand stack — no recursion back through a parse tree at
//! evaluation time. Each operator token, by construction of postfix
//! emission, closes exactly one level at its own position; `repeat` records
//! that (and predicate-group closes) so the evaluator knows how many times
//! to reduce the operand stack after consuming a token.

use yang_core::{Context, Symbol};
use yang_schema::expr::{Axis, CompiledExpr, NodeTest, Token, XPathOp};

#[derive(Debug, thiserror::Error)]
pub enum XPathError {
    #[error("unexpected end of expression")]
    UnexpectedEof,
    #[error("unexpected character {0:?} at offset {1}")]
    UnexpectedChar(char, usize),
    #[error("expected {0}")]
    Expected(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
enum Lex {
    Ident(String),
    Number(f64),
    Str(String),
    Slash,
    DoubleSlash,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    At,
    Dot,
    DotDot,
    Colon,
    Op(XPathOp),
    Pipe,
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
            self.bump_char();
        }
    }

    fn next(&mut self) -> Result<Option<(Lex, usize, usize)>, XPathError> {
        self.skip_ws();
        let start = self.pos;
        let c = match self.peek_char() {
            None => return Ok(None),
            Some(c) => c,
        };
        let lex = match c {
            '/' => {
                self.bump_char();
                if self.peek_char() == Some('/') {
                    self.bump_char();
                    Lex::DoubleSlash
                } else {
                    Lex::Slash
                }
            }
            '(' => {
                self.bump_char();
                Lex::LParen
            }
            ')' => {
                self.bump_char();
                Lex::RParen
            }
            '[' => {
                self.bump_char();
                Lex::LBracket
            }
            ']' => {
                self.bump_char();
                Lex::RBracket
            }
            ',' => {
                self.bump_char();
                Lex::Comma
            }
            '@' => {
                self.bump_char();
                Lex::At
            }
            '|' => {
                self.bump_char();
                Lex::Pipe
            }
            ':' => {
                self.bump_char();
                Lex::Colon
            }
            '.' => {
                self.bump_char();
                if self.peek_char() == Some('.') {
                    self.bump_char();
                    Lex::DotDot
                } else {
                    Lex::Dot
                }
            }
            '=' => {
                self.bump_char();
                Lex::Op(XPathOp::Eq)
            }
            '!' => {
                self.bump_char();
                if self.bump_char() != Some('=') {
                    return Err(XPathError::Expected("'=' after '!'"));
                }
                Lex::Op(XPathOp::Ne)
            }
            '<' => {
                self.bump_char();
                if self.peek_char() == Some('=') {
                    self.bump_char();
                    Lex::Op(XPathOp::Le)
                } else {
                    Lex::Op(XPathOp::Lt)
                }
            }
            '>' => {
                self.bump_char();
                if self.peek_char() == Some('=') {
                    self.bump_char();
                    Lex::Op(XPathOp::Ge)
                } else {
                    Lex::Op(XPathOp::Gt)
                }
            }
            '+' => {
                self.bump_char();
                Lex::Op(XPathOp::Plus)
            }
            '-' => {
                self.bump_char();
                Lex::Op(XPathOp::Minus)
            }
            '*' => {
                self.bump_char();
                Lex::Op(XPathOp::Multiply)
            }
            '\'' | '"' => {
                let quote = c;
                self.bump_char();
                let mut s = String::new();
                loop {
                    match self.bump_char() {
                        Some(ch) if ch == quote => break,
                        Some(ch) => s.push(ch),
                        None => return Err(XPathError::UnexpectedEof),
                    }
                }
                Lex::Str(s)
            }
            c if c.is_ascii_digit() => {
                let mut s = String::new();
                while matches!(self.peek_char(), Some(c) if c.is_ascii_digit() || c == '.') {
                    s.push(self.bump_char().unwrap());
                }
                Lex::Number(s.parse().map_err(|_| XPathError::Expected("number"))?)
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut s = String::new();
                while matches!(self.peek_char(), Some(c) if c.is_alphanumeric() || c == '_' || c == '-' || c == '.') {
                    s.push(self.bump_char().unwrap());
                }
                match s.as_str() {
                    "and" => Lex::Op(XPathOp::And),
                    "or" => Lex::Op(XPathOp::Or),
                    "div" => Lex::Op(XPathOp::Div),
                    "mod" => Lex::Op(XPathOp::Mod),
                    _ => Lex::Ident(s),
                }
            }
            c => return Err(XPathError::UnexpectedChar(c, start)),
        };
        Ok(Some((lex, start, self.pos)))
    }
}

pub struct Compiler<'a> {
    ctx: &'a Context,
    lexer: Lexer<'a>,
    lookahead: Option<(Lex, usize, usize)>,
    lookahead2: Option<(Lex, usize, usize)>,
    tokens: Vec<Token>,
    tok_pos: Vec<u32>,
    tok_len: Vec<u32>,
    repeat: Vec<u8>,
    prefixes: Vec<Symbol>,
}

impl<'a> Compiler<'a> {
    pub fn new(ctx: &'a Context, source: &'a str) -> Self {
        Self {
            ctx,
            lexer: Lexer::new(source),
            lookahead: None,
            lookahead2: None,
            tokens: Vec::new(),
            tok_pos: Vec::new(),
            tok_len: Vec::new(),
            repeat: Vec::new(),
            prefixes: Vec::new(),
        }
    }

    fn advance(&mut self) -> Result<(), XPathError> {
        self.lookahead = self.lookahead2.take();
        self.lookahead2 = self.lexer.next()?;
        Ok(())
    }

    fn peek(&self) -> Option<&Lex> {
        self.lookahead.as_ref().map(|(l, _, _)| l)
    }

    fn peek2(&self) -> Option<&Lex> {
        self.lookahead2.as_ref().map(|(l, _, _)| l)
    }

    fn take(&mut self) -> Result<Option<Lex>, XPathError> {
        let cur = self.lookahead.take();
        self.advance()?;
        Ok(cur.map(|(l, _, _)| l))
    }

    fn emit(&mut self, token: Token, start: usize, end: usize, repeat: u8) {
        self.tokens.push(token);
        self.tok_pos.push(start as u32);
        self.tok_len.push((end - start) as u32);
        self.repeat.push(repeat);
    }

    fn intern(&self, s: &str) -> Symbol {
        self.ctx.dict().insert(s)
    }

    /// Find-or-insert `prefix` in the expression's prefix table, returning
    /// its index — `NodeTest::Named` stores this instead of `prefix`
    /// itself so the same compiled expression resolves it per instantiation
    /// site rather than fixing it to whatever module compiled it.
    fn prefix_index(&mut self, prefix: Symbol) -> u16 {
        if let Some(pos) = self.prefixes.iter().position(|p| *p == prefix) {
            pos as u16
        } else {
            self.prefixes.push(prefix);
            (self.prefixes.len() - 1) as u16
        }
    }

    pub fn compile(mut self, source_for_text: &str) -> Result<CompiledExpr, XPathError> {
        self.advance()?;
        self.advance()?;
        self.parse_or()?;
        if self.peek().is_some() {
            return Err(XPathError::Expected("end of expression"));
        }
        Ok(CompiledExpr {
            tokens: self.tokens,
            tok_pos: self.tok_pos,
            tok_len: self.tok_len,
            repeat: self.repeat,
            prefixes: self.prefixes,
            source: source_for_text.to_string(),
        })
    }

    // Precedence-climbing over binary operators, emitting postfix.
    fn parse_or(&mut self) -> Result<(), XPathError> {
        self.parse_binary(1)
    }

    fn op_precedence(op: XPathOp) -> u8 {
        op.precedence()
    }

    fn peek_binary_op(&self) -> Option<XPathOp> {
        match self.peek()? {
            Lex::Op(op) if !op.is_unary() => Some(*op),
            Lex::Pipe => Some(XPathOp::Union),
            _ => None,
        }
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<(), XPathError> {
        self.parse_unary()?;
        loop {
            let Some(op) = self.peek_binary_op() else { break };
            if Self::op_precedence(op) < min_prec {
                break;
            }
            let (_, start, end) = self.lookahead.clone().unwrap();
            self.take()?;
            self.parse_binary(Self::op_precedence(op) + 1)?;
            self.emit(Token::Operator(op), start, end, 1);
        }
        Ok(())
    }

    fn parse_unary(&mut self) -> Result<(), XPathError> {
        if matches!(self.peek(), Some(Lex::Op(XPathOp::Minus))) {
            let (_, start, end) = self.lookahead.clone().unwrap();
            self.take()?;
            self.parse_unary()?;
            self.emit(Token::Operator(XPathOp::Negate), start, end, 1);
            return Ok(());
        }
        self.parse_path()
    }

    /// A location path, function call, literal, or parenthesized
    /// subexpression.
    fn parse_path(&mut self) -> Result<(), XPathError> {
        match self.peek() {
            Some(Lex::Number(n)) => {
                let n = *n;
                let (_, start, end) = self.lookahead.clone().unwrap();
                self.take()?;
                self.emit(Token::Number(n), start, end, 0);
                Ok(())
            }
            Some(Lex::Str(s)) => {
                let s = s.clone();
                let (_, start, end) = self.lookahead.clone().unwrap();
                self.take()?;
                let sym = self.intern(&s);
                self.emit(Token::Literal(sym), start, end, 0);
                Ok(())
            }
            Some(Lex::LParen) => {
                self.take()?;
                self.parse_or()?;
                self.expect(Lex::RParen)?;
                Ok(())
            }
            Some(Lex::Slash) | Some(Lex::DoubleSlash) | Some(Lex::Dot) | Some(Lex::DotDot)
            | Some(Lex::At) | Some(Lex::Ident(_)) => self.parse_location_path(),
            other => Err(match other {
                None => XPathError::UnexpectedEof,
                _ => XPathError::Expected("expression"),
            }),
        }
    }

    fn expect(&mut self, want: Lex) -> Result<(), XPathError> {
        if self.peek() == Some(&want) {
            self.take()?;
            Ok(())
        } else {
            Err(XPathError::Expected("expected token"))
        }
    }

    fn parse_location_path(&mut self) -> Result<(), XPathError> {
        let absolute = matches!(self.peek(), Some(Lex::Slash) | Some(Lex::DoubleSlash));
        if absolute {
            let (lex, start, end) = self.lookahead.clone().unwrap();
            self.take()?;
            self.emit(
                Token::PathSeparator { absolute: true },
                start,
                end,
                0,
            );
            if matches!(lex, Lex::DoubleSlash) {
                self.emit(
                    Token::Step {
                        axis: Axis::DescendantOrSelf,
                        test: NodeTest::Any,
                    },
                    start,
                    end,
                    0,
                );
            }
            if self.peek().is_none() {
                return Ok(());
            }
        }
        loop {
            self.parse_step()?;
            match self.peek() {
                Some(Lex::Slash) | Some(Lex::DoubleSlash) => {
                    let (lex, start, end) = self.lookahead.clone().unwrap();
                    self.take()?;
                    self.emit(
                        Token::PathSeparator { absolute: false },
                        start,
                        end,
                        0,
                    );
                    if matches!(lex, Lex::DoubleSlash) {
                        self.emit(
                            Token::Step {
                                axis: Axis::DescendantOrSelf,
                                test: NodeTest::Any,
                            },
                            start,
                            end,
                            0,
                        );
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn parse_step(&mut self) -> Result<(), XPathError> {
        let (axis, test, start, end) = match self.peek().cloned() {
            Some(Lex::Dot) => {
                let (_, s, e) = self.lookahead.clone().unwrap();
                self.take()?;
                (Axis::Self_, NodeTest::Any, s, e)
            }
            Some(Lex::DotDot) => {
                let (_, s, e) = self.lookahead.clone().unwrap();
                self.take()?;
                (Axis::Parent, NodeTest::Any, s, e)
            }
            Some(Lex::At) => {
                let (_, s, _e) = self.lookahead.clone().unwrap();
                self.take()?;
                let name = match self.peek() {
                    Some(Lex::Ident(name)) => name.clone(),
                    _ => return Err(XPathError::Expected("attribute name after '@'")),
                };
                let (_, _, e2) = self.lookahead.clone().unwrap();
                let (test, s2, e2) = self.parse_named_test(name, s, e2)?;
                (Axis::Attribute, test, s2, e2)
            }
            Some(Lex::Ident(name)) => {
                // A name step immediately followed by `(` is a function
                // call (`current()`, `deref(..)`, the derived-from family,
                // ...), never a node test with that spelling in YANG.
                let (_, s, e) = self.lookahead.clone().unwrap();
                if self.peek2() == Some(&Lex::LParen) {
                    return self.parse_function_call(name, s, e);
                }
                let (test, s2, e2) = self.parse_named_test(name, s, e)?;
                (Axis::Child, test, s2, e2)
            }
            _ => return Err(XPathError::Expected("location step")),
        };
        self.emit(Token::Step { axis, test }, start, end, 0);
        self.parse_predicates()?;
        Ok(())
    }

    fn parse_named_test(
        &mut self,
        first: String,
        start: usize,
        end: usize,
    ) -> Result<(NodeTest, usize, usize), XPathError> {
        self.take()?; // consume the identifier already peeked
        if first == "*" {
            return Ok((NodeTest::Any, start, end));
        }
        if self.peek() == Some(&Lex::Colon) {
            self.take()?;
            match self.take()? {
                Some(Lex::Ident(name)) => {
                    let prefix = self.intern(&first);
                    let prefix_idx = self.prefix_index(prefix);
                    let name_sym = self.intern(&name);
                    return Ok((
                        NodeTest::Named {
                            prefix: Some(prefix_idx),
                            name: name_sym,
                        },
                        start,
                        end,
                    ));
                }
                _ => return Err(XPathError::Expected("name after ':'")),
            }
        }
        if self.peek() == Some(&Lex::LParen) && first == "text" {
            self.take()?;
            self.expect(Lex::RParen)?;
            return Ok((NodeTest::Text, start, end));
        }
        let name = self.intern(&first);
        Ok((
            NodeTest::Named {
                prefix: None,
                name,
            },
            start,
            end,
        ))
    }

    fn parse_predicates(&mut self) -> Result<(), XPathError> {
        while self.peek() == Some(&Lex::LBracket) {
            let (_, start, _) = self.lookahead.clone().unwrap();
            self.take()?;
            self.emit(Token::PredicateStart, start, start, 0);
            self.parse_or()?;
            let (_, _, end) = self.lookahead.clone().unwrap_or((Lex::RBracket, start, start));
            self.expect(Lex::RBracket)?;
            self.emit(Token::PredicateEnd, start, end, 1);
        }
        Ok(())
    }

    fn parse_function_call(
        &mut self,
        name: String,
        start: usize,
        mut end: usize,
    ) -> Result<(), XPathError> {
        self.take()?; // identifier
        self.expect(Lex::LParen)?;
        let mut arg_count = 0u16;
        if self.peek() != Some(&Lex::RParen) {
            loop {
                self.parse_or()?;
                arg_count += 1;
                if self.peek() == Some(&Lex::Comma) {
                    self.take()?;
                } else {
                    break;
                }
            }
        }
        if let Some((_, _, e)) = &self.lookahead {
            end = *e;
        }
        self.expect(Lex::RParen)?;
        let name_sym = self.intern(&name);
        self.emit(
            Token::FunctionCall {
                name: name_sym,
                arg_count,
            },
            start,
            end,
            1,
        );
        self.parse_predicates()?;
        Ok(())
    }
}

/// Compile a `when`/`must`/leafref `path` expression string.
pub fn compile(ctx: &Context, source: &str) -> Result<CompiledExpr, XPathError> {
    Compiler::new(ctx, source).compile(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use yang_core::ContextOptions;

    #[test]
    fn compiles_simple_comparison() {
        let ctx = Context::new(ContextOptions::empty());
        let expr = compile(&ctx, "../name = 'foo'").unwrap();
        assert!(!expr.is_empty());
        assert!(matches!(
            expr.tokens.last(),
            Some(Token::Operator(XPathOp::Eq))
        ));
    }

    #[test]
    fn compiles_current_function() {
        let ctx = Context::new(ContextOptions::empty());
        let expr = compile(&ctx, "current()").unwrap();
        assert!(matches!(expr.tokens[0], Token::FunctionCall { arg_count: 0, .. }));
    }

    #[test]
    fn compiles_predicate() {
        let ctx = Context::new(ContextOptions::empty());
        let expr = compile(&ctx, "../list[key='a']").unwrap();
        assert!(expr.tokens.iter().any(|t| matches!(t, Token::PredicateStart)));
        assert!(expr.tokens.iter().any(|t| matches!(t, Token::PredicateEnd)));
    }
}
