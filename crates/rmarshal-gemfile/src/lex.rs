//! Tokenizer for the Gemfile mini-DSL.
//!
//! Line comments start with `#` and run to end of line. A newline ends a
//! statement (`Eol`) unless it falls inside a bracketed or parenthesized
//! expression, where it is suppressed so a call's arguments can be wrapped
//! across lines. Identifiers, strings, and symbols are capped at
//! [`MAX_TOKEN_LEN`] bytes to keep a malformed file from growing one token
//! without bound.

use crate::error::{GemfileError, Result};

pub const MAX_TOKEN_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier(String),
    Symbol(String),
    StringLit(String),
    Comma,
    Colon,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Operator(String),
    Eol,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

pub struct Lexer<'a> {
    file: String,
    src: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
    bracket_depth: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, file: impl Into<String>) -> Self {
        Self { file: file.into(), src: src.as_bytes(), pos: 0, line: 1, column: 1, bracket_depth: 0 }
    }

    fn span(&self) -> Span {
        Span { line: self.line, column: self.column }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    fn err(&self, message: impl Into<String>) -> GemfileError {
        GemfileError::Syntax { file: self.file.clone(), line: self.line, column: self.column, message: message.into() }
    }

    fn skip_inline_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') => {
                    self.bump();
                }
                Some(b'#') => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    /// Produces the next token, including `Eol`/`Eof`.
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_inline_whitespace_and_comments();
        let start = self.span();

        let Some(b) = self.peek() else {
            return Ok(Token { kind: TokenKind::Eof, span: start });
        };

        if b == b'\n' {
            self.bump();
            if self.bracket_depth > 0 {
                return self.next_token();
            }
            return Ok(Token { kind: TokenKind::Eol, span: start });
        }

        if b == b',' {
            self.bump();
            return Ok(Token { kind: TokenKind::Comma, span: start });
        }
        if b == b'[' {
            self.bump();
            self.bracket_depth += 1;
            return Ok(Token { kind: TokenKind::LBracket, span: start });
        }
        if b == b']' {
            self.bump();
            self.bracket_depth = self.bracket_depth.saturating_sub(1);
            return Ok(Token { kind: TokenKind::RBracket, span: start });
        }
        if b == b'(' {
            self.bump();
            self.bracket_depth += 1;
            return Ok(Token { kind: TokenKind::LParen, span: start });
        }
        if b == b')' {
            self.bump();
            self.bracket_depth = self.bracket_depth.saturating_sub(1);
            return Ok(Token { kind: TokenKind::RParen, span: start });
        }

        if b == b':' {
            if matches!(self.peek_at(1), Some(c) if is_ident_start(c)) {
                self.bump();
                let name = self.lex_ident_chars()?;
                return Ok(Token { kind: TokenKind::Symbol(name), span: start });
            }
            self.bump();
            return Ok(Token { kind: TokenKind::Colon, span: start });
        }

        if b == b'"' || b == b'\'' {
            return self.lex_string(start, b);
        }

        if is_ident_start(b) {
            let name = self.lex_ident_chars()?;
            return Ok(Token { kind: TokenKind::Identifier(name), span: start });
        }

        if is_operator_char(b) {
            return self.lex_operator(start);
        }

        Err(self.err(format!("unexpected character {:?}", b as char)))
    }

    fn lex_ident_chars(&mut self) -> Result<String> {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                s.push(c as char);
                self.bump();
                if s.len() > MAX_TOKEN_LEN {
                    return Err(self.err(format!("identifier exceeds {MAX_TOKEN_LEN} bytes")));
                }
            } else {
                break;
            }
        }
        // Ruby allows a trailing `?` or `!` on identifiers (predicate/bang methods).
        if matches!(self.peek(), Some(b'?') | Some(b'!')) {
            s.push(self.bump().unwrap() as char);
        }
        Ok(s)
    }

    fn lex_string(&mut self, start: Span, quote: u8) -> Result<Token> {
        self.bump(); // opening quote
        let mut s = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.err("unterminated string literal"));
            };
            if c == quote {
                break;
            }
            if c == b'\\' && quote == b'"' {
                match self.bump() {
                    Some(b'n') => s.push('\n'),
                    Some(b't') => s.push('\t'),
                    Some(b'\\') => s.push('\\'),
                    Some(b'"') => s.push('"'),
                    Some(other) => s.push(other as char),
                    None => return Err(self.err("unterminated escape in string literal")),
                }
            } else if c == b'\\' && quote == b'\'' && matches!(self.peek(), Some(b'\'') | Some(b'\\')) {
                s.push(self.bump().unwrap() as char);
            } else {
                s.push(c as char);
            }
            if s.len() > MAX_TOKEN_LEN {
                return Err(self.err(format!("string literal exceeds {MAX_TOKEN_LEN} bytes")));
            }
        }
        Ok(Token { kind: TokenKind::StringLit(s), span: start })
    }
}

fn is_percent_opener(b: Option<u8>) -> bool {
    matches!(b, Some(b'[') | Some(b'(') | Some(b'{') | Some(b'<'))
}

fn closing_for(opener: u8) -> u8 {
    match opener {
        b'[' => b']',
        b'(' => b')',
        b'{' => b'}',
        b'<' => b'>',
        _ => unreachable!(),
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_operator_char(b: u8) -> bool {
    matches!(b, b'=' | b'>' | b'<' | b'~' | b'!' | b'.' | b'-' | b'+' | b'*' | b'/')
}

impl<'a> Lexer<'a> {
    fn lex_operator(&mut self, start: Span) -> Result<Token> {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if is_operator_char(c) {
                s.push(c as char);
                self.bump();
            } else {
                break;
            }
        }
        Ok(Token { kind: TokenKind::Operator(s), span: start })
    }
}

/// A token stream that expands `%w[...]`/`%i[...]` literals inline, since
/// that expansion needs to scan raw source text rather than go through
/// `Lexer::next_token`'s single-character dispatch.
pub struct TokenStream<'a> {
    lexer: Lexer<'a>,
    pending: std::collections::VecDeque<Token>,
}

impl<'a> TokenStream<'a> {
    pub fn new(src: &'a str, file: impl Into<String>) -> Self {
        Self { lexer: Lexer::new(src, file), pending: std::collections::VecDeque::new() }
    }

    pub fn next(&mut self) -> Result<Token> {
        if let Some(tok) = self.pending.pop_front() {
            return Ok(tok);
        }
        self.skip_and_expand()
    }

    fn skip_and_expand(&mut self) -> Result<Token> {
        self.lexer.skip_inline_whitespace_and_comments();
        let start = self.lexer.span();
        if self.lexer.peek() == Some(b'%')
            && matches!(self.lexer.peek_at(1), Some(b'w') | Some(b'i'))
            && is_percent_opener(self.lexer.peek_at(2))
        {
            return self.expand_percent_literal(start);
        }
        self.lexer.next_token()
    }

    fn expand_percent_literal(&mut self, start: Span) -> Result<Token> {
        self.lexer.bump(); // '%'
        let as_symbols = self.lexer.bump() == Some(b'i');
        let opener = self.lexer.bump().expect("checked by caller");
        let closer = closing_for(opener);

        let mut word = String::new();
        let mut words: Vec<String> = Vec::new();
        loop {
            let Some(c) = self.lexer.bump() else {
                return Err(self.lexer.err("unterminated %w/%i literal"));
            };
            if c == closer {
                if !word.is_empty() {
                    words.push(std::mem::take(&mut word));
                }
                break;
            }
            if c.is_ascii_whitespace() {
                if !word.is_empty() {
                    words.push(std::mem::take(&mut word));
                }
            } else {
                word.push(c as char);
                if word.len() > MAX_TOKEN_LEN {
                    return Err(self.lexer.err(format!("%w/%i word exceeds {MAX_TOKEN_LEN} bytes")));
                }
            }
        }

        self.pending.push_back(Token { kind: TokenKind::LBracket, span: start });
        for w in words {
            let kind = if as_symbols { TokenKind::Symbol(w) } else { TokenKind::StringLit(w) };
            self.pending.push_back(Token { kind, span: start });
            self.pending.push_back(Token { kind: TokenKind::Comma, span: start });
        }
        self.pending.push_back(Token { kind: TokenKind::RBracket, span: start });
        Ok(self.pending.pop_front().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut ts = TokenStream::new(src, "Gemfile");
        let mut out = Vec::new();
        loop {
            let tok = ts.next().unwrap();
            let done = tok.kind == TokenKind::Eof;
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn identifiers_and_strings() {
        let k = kinds("gem \"rails\"");
        assert_eq!(
            k,
            vec![
                TokenKind::Identifier("gem".into()),
                TokenKind::StringLit("rails".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comment_then_eol() {
        let k = kinds("gem 'a' # comment\ngem 'b'");
        assert!(k.contains(&TokenKind::Eol));
        assert!(k.contains(&TokenKind::StringLit("a".into())));
        assert!(k.contains(&TokenKind::StringLit("b".into())));
    }

    #[test]
    fn eol_suppressed_inside_brackets() {
        let k = kinds("gem 'a', [\n  1,\n  2\n]");
        // No bare Eol between the bracket pair.
        let between = &k[k.iter().position(|t| *t == TokenKind::LBracket).unwrap()
            ..k.iter().position(|t| *t == TokenKind::RBracket).unwrap()];
        assert!(!between.contains(&TokenKind::Eol));
    }

    #[test]
    fn percent_w_expands_to_bracketed_strings() {
        let k = kinds("%w[a b c]");
        assert_eq!(
            k,
            vec![
                TokenKind::LBracket,
                TokenKind::StringLit("a".into()),
                TokenKind::Comma,
                TokenKind::StringLit("b".into()),
                TokenKind::Comma,
                TokenKind::StringLit("c".into()),
                TokenKind::Comma,
                TokenKind::RBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn symbol_and_colon() {
        let k = kinds(":development => true");
        assert_eq!(
            k,
            vec![
                TokenKind::Symbol("development".into()),
                TokenKind::Operator("=>".into()),
                TokenKind::Identifier("true".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn overlong_identifier_is_an_error() {
        let src = "a".repeat(MAX_TOKEN_LEN + 1);
        let mut ts = TokenStream::new(&src, "Gemfile");
        assert!(ts.next().is_err());
    }
}
