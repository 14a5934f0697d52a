//! Lexer for canonical YANG syntax (RFC 7950 §6.1).

use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*[^/])*\*/")]
pub enum RawToken {
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(";")]
    Semicolon,
    #[token("+")]
    Plus,
    #[regex(r#""([^"\\]|\\.)*""#)]
    DoubleQuoted,
    #[regex(r"'[^']*'")]
    SingleQuoted,
    /// An unquoted string: keyword, identifier, or bare argument. YANG's
    /// unquoted-string grammar excludes whitespace and the structural
    /// characters above.
    #[regex(r#"[^\s{};'"+][^\s{};]*"#)]
    Unquoted,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: RawToken,
    pub text_start: u32,
    pub text_end: u32,
}

/// Lex `source` into a flat token list. Lexer errors (characters matching
/// no rule) are reported as zero-length `Unquoted` tokens at the offending
/// byte so the parser can still produce a `Garbage`-style diagnostic
/// instead of aborting the whole lex.
pub fn lex(source: &str) -> Vec<Token> {
    let mut lexer = RawToken::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(kind) => tokens.push(Token {
                kind,
                text_start: span.start as u32,
                text_end: span.end as u32,
            }),
            Err(()) => tokens.push(Token {
                kind: RawToken::Unquoted,
                text_start: span.start as u32,
                text_end: span.end as u32,
            }),
        }
    }
    tokens
}

/// Strip a quoted string's delimiters and, for double-quoted strings,
/// resolve YANG's escape sequences (`\n`, `\t`, `\"`, `\\`).
pub fn unquote(raw: &str) -> String {
    if let Some(inner) = raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return inner.to_string();
    }
    if let Some(inner) = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => out.push('\\'),
                }
            } else {
                out.push(c);
            }
        }
        return out;
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_simple_statement() {
        let tokens = lex(r#"leaf name { type string; }"#);
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RawToken::Unquoted,
                RawToken::Unquoted,
                RawToken::LBrace,
                RawToken::Unquoted,
                RawToken::Unquoted,
                RawToken::Semicolon,
                RawToken::RBrace,
            ]
        );
    }

    #[test]
    fn unquote_resolves_escapes() {
        assert_eq!(unquote(r#""a\nb""#), "a\nb");
        assert_eq!(unquote("'literal \\n'"), "literal \\n");
    }
}
