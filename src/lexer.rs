//! Tokenize schema source text.
//!
//! Splitting is done by the PEST grammar in `proto.pest`; this module turns the
//! resulting pairs into [`Token`]s one at a time. Whitespace and comments never
//! surface as tokens: comments are folded into the `doc` of the token that follows
//! them (or its `trailing_doc` when the comment sits on the same line as the
//! previous token).

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "proto.pest"]
struct TokenGrammar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Int,
    Float,
    Str,
    Symbol,
}

/// Byte offset plus 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token; for string literals, the unescaped contents
    /// (bytes that are not UTF-8 show as U+FFFD, see `bytes`).
    pub text: String,
    /// Unescaped contents of a string literal, byte for byte. Empty for other kinds.
    pub bytes: Vec<u8>,
    pub position: Position,
    /// Comments immediately preceding this token, markers stripped.
    pub doc: Option<String>,
    /// Comment found on the same line as the previous token.
    pub trailing_doc: Option<String>,
}

impl Token {
    pub fn is_symbol(&self, s: &str) -> bool {
        self.kind == TokenKind::Symbol && self.text == s
    }

    pub fn is_ident(&self, s: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == s
    }
}

/// Malformed token or grammar violation, located in its file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}:{line}:{column}: {message}")]
pub struct SyntaxError {
    pub path: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(path: &str, position: Position, message: impl Into<String>) -> Self {
        SyntaxError {
            path: path.to_string(),
            line: position.line,
            column: position.column,
            message: message.into(),
        }
    }
}

/// Token stream over one source file.
///
/// Iteration yields `Err` at most once; after an error the stream is exhausted.
/// [`Lexer::restart`] rewinds to the first token.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    path: String,
    start: Pairs<'a, Rule>,
    pairs: Pairs<'a, Rule>,
    last_line: usize,
    failed: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(path: &str, source: &'a str) -> Result<Self, SyntaxError> {
        let mut file = TokenGrammar::parse(Rule::file, source).map_err(|e| {
            let (line, column) = match e.line_col {
                pest::error::LineColLocation::Pos(p) => p,
                pest::error::LineColLocation::Span(p, _) => p,
            };
            SyntaxError {
                path: path.to_string(),
                line,
                column,
                message: e.variant.message().to_string(),
            }
        })?;
        let pairs = file
            .next()
            .map(Pair::into_inner)
            .ok_or_else(|| SyntaxError::new(path, Position::default(), "empty token stream"))?;
        Ok(Lexer {
            path: path.to_string(),
            start: pairs.clone(),
            pairs,
            last_line: 0,
            failed: false,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Rewind to the first token.
    pub fn restart(&mut self) {
        self.pairs = self.start.clone();
        self.last_line = 0;
        self.failed = false;
    }

    fn fail(&mut self, position: Position, message: impl Into<String>) -> SyntaxError {
        self.failed = true;
        SyntaxError::new(&self.path, position, message)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, SyntaxError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let mut doc: Vec<String> = Vec::new();
        let mut trailing_doc = None;
        loop {
            let pair = self.pairs.next()?;
            let span = pair.as_span();
            let (line, column) = span.start_pos().line_col();
            let position = Position {
                offset: span.start(),
                line,
                column,
            };
            let kind = match pair.as_rule() {
                Rule::line_comment | Rule::block_comment => {
                    let text = comment_text(pair.as_str());
                    if line == self.last_line && doc.is_empty() && trailing_doc.is_none() {
                        trailing_doc = Some(text);
                    } else {
                        doc.push(text);
                    }
                    continue;
                }
                Rule::ident => TokenKind::Ident,
                Rule::integer => TokenKind::Int,
                Rule::float => TokenKind::Float,
                Rule::string => TokenKind::Str,
                Rule::symbol => TokenKind::Symbol,
                Rule::unterminated_string => {
                    return Some(Err(self.fail(position, "unterminated string")));
                }
                Rule::unterminated_comment => {
                    return Some(Err(self.fail(position, "unterminated comment")));
                }
                Rule::invalid => {
                    let message = format!("unexpected character '{}'", pair.as_str());
                    return Some(Err(self.fail(position, message)));
                }
                Rule::EOI => return None,
                _ => continue,
            };
            let (text, bytes) = if kind == TokenKind::Str {
                match unescape(pair.as_str(), position) {
                    Ok(b) => (String::from_utf8_lossy(&b).into_owned(), b),
                    Err((at, message)) => return Some(Err(self.fail(at, message))),
                }
            } else {
                (pair.as_str().to_string(), Vec::new())
            };
            self.last_line = line;
            let doc = if doc.is_empty() {
                None
            } else {
                Some(doc.join("\n"))
            };
            return Some(Ok(Token {
                kind,
                text,
                bytes,
                position,
                doc,
                trailing_doc,
            }));
        }
    }
}

/// Strip comment markers: `//` (and a following space), `/* */`, and the leading
/// `*` of each block comment line.
fn comment_text(raw: &str) -> String {
    if let Some(rest) = raw.strip_prefix("//") {
        let rest = rest.strip_prefix('/').unwrap_or(rest);
        return rest.strip_prefix(' ').unwrap_or(rest).trim_end().to_string();
    }
    let body = raw
        .trim_start_matches("/*")
        .trim_start_matches('*')
        .trim_end_matches("*/");
    let lines: Vec<&str> = body
        .lines()
        .map(|l| {
            let l = l.trim();
            let l = l.strip_prefix('*').unwrap_or(l);
            l.strip_prefix(' ').unwrap_or(l).trim_end()
        })
        .collect();
    let first = lines.iter().position(|l| !l.is_empty()).unwrap_or(lines.len());
    let last = lines.iter().rposition(|l| !l.is_empty()).map_or(first, |i| i + 1);
    lines[first..last].join("\n")
}

/// Resolve escapes inside a quoted literal. Byte escapes (`\xHH`, octal) emit that
/// byte as is; unicode escapes emit UTF-8.
fn unescape(raw: &str, at: Position) -> Result<Vec<u8>, (Position, String)> {
    let inner = &raw[1..raw.len() - 1];
    let mut out = Vec::with_capacity(inner.len());
    let mut utf8 = [0u8; 4];
    let mut chars = inner.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '\\' {
            out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
            continue;
        }
        let escape_pos = Position {
            offset: at.offset + 1 + i,
            line: at.line,
            column: at.column + 1 + inner[..i].chars().count(),
        };
        let Some((_, e)) = chars.next() else {
            return Err((escape_pos, "invalid escape sequence at end of string".to_string()));
        };
        match e {
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0c),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            'v' => out.push(0x0b),
            '\\' | '\'' | '"' | '?' => out.push(e as u8),
            'x' | 'X' => {
                let mut value = 0u32;
                let mut digits = 0;
                while digits < 2 {
                    match chars.peek().and_then(|&(_, d)| d.to_digit(16)) {
                        Some(d) => {
                            value = value * 16 + d;
                            digits += 1;
                            chars.next();
                        }
                        None => break,
                    }
                }
                if digits == 0 {
                    return Err((escape_pos, "invalid escape sequence '\\x' without hex digits".to_string()));
                }
                out.push(value as u8);
            }
            '0'..='7' => {
                let mut value = e.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|&(_, d)| d.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                if value > 0xff {
                    return Err((escape_pos, format!("octal escape out of range: {}", value)));
                }
                out.push(value as u8);
            }
            'u' | 'U' => {
                let width = if e == 'u' { 4 } else { 8 };
                let mut value = 0u32;
                for _ in 0..width {
                    let d = chars
                        .next()
                        .and_then(|(_, d)| d.to_digit(16))
                        .ok_or_else(|| (escape_pos, format!("invalid escape sequence '\\{}'", e)))?;
                    value = value * 16 + d;
                }
                let ch = char::from_u32(value)
                    .ok_or_else(|| (escape_pos, format!("invalid unicode escape U+{:X}", value)))?;
                out.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
            }
            other => {
                return Err((escape_pos, format!("invalid escape sequence '\\{}'", other)));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        Lexer::new("test.proto", src)
            .expect("lexer")
            .collect::<Result<Vec<_>, _>>()
            .expect("tokens")
    }

    #[test]
    fn lex_basic_kinds() {
        let toks = tokens("message Foo { int32 x = 0x1F; float y = 1.5e3; }");
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(kinds[0], TokenKind::Ident);
        assert_eq!(kinds[2], TokenKind::Symbol);
        let hex = toks.iter().find(|t| t.kind == TokenKind::Int).expect("int");
        assert_eq!(hex.text, "0x1F");
        let float = toks.iter().find(|t| t.kind == TokenKind::Float).expect("float");
        assert_eq!(float.text, "1.5e3");
    }

    #[test]
    fn lex_positions_are_one_based() {
        let toks = tokens("syntax = \"proto3\";\n  package a;");
        let package = toks.iter().find(|t| t.is_ident("package")).expect("package");
        assert_eq!(package.position.line, 2);
        assert_eq!(package.position.column, 3);
    }

    #[test]
    fn lex_doc_comments_attach_to_next_token() {
        let toks = tokens("// The thing.\n/** More\n * detail. */\nmessage Thing {}");
        assert_eq!(toks[0].doc.as_deref(), Some("The thing.\nMore\ndetail."));
    }

    #[test]
    fn lex_trailing_comment_is_separate() {
        let toks = tokens("int32 a = 1; // about a\nint32 b = 2;");
        let b_type = toks.iter().filter(|t| t.is_ident("int32")).nth(1).expect("second field");
        assert_eq!(b_type.trailing_doc.as_deref(), Some("about a"));
        assert_eq!(b_type.doc, None);
    }

    #[test]
    fn lex_string_escapes() {
        let toks = tokens(r#""a\n\x41\101\"b" 'single'"#);
        assert_eq!(toks[0].text, "a\nAA\"b");
        assert_eq!(toks[1].text, "single");
        assert_eq!(toks[0].bytes, b"a\nAA\"b".to_vec());
    }

    #[test]
    fn lex_byte_escapes_stay_raw() {
        let toks = tokens(r#""\xff\000\377\u00e9""#);
        assert_eq!(toks[0].bytes, vec![0xff, 0x00, 0xff, 0xc3, 0xa9]);
    }

    #[test]
    fn lex_unterminated_string_fails() {
        let err = Lexer::new("t.proto", "option x = \"abc;\n")
            .expect("lexer")
            .find_map(Result::err)
            .expect("error");
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 12);
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn lex_invalid_escape_fails() {
        let err = Lexer::new("t.proto", "\"ab\\qc\"")
            .expect("lexer")
            .find_map(Result::err)
            .expect("error");
        assert_eq!(err.column, 4);
        assert!(err.message.contains("\\q"));
    }

    #[test]
    fn lex_invalid_character_fails() {
        let err = Lexer::new("t.proto", "message @ {}")
            .expect("lexer")
            .find_map(Result::err)
            .expect("error");
        assert!(err.message.contains('@'));
    }

    #[test]
    fn lex_restart_replays_stream() {
        let mut lexer = Lexer::new("t.proto", "a b c").expect("lexer");
        let first: Vec<_> = lexer.by_ref().map(|t| t.expect("token").text).collect();
        lexer.restart();
        let second: Vec<_> = lexer.map(|t| t.expect("token").text).collect();
        assert_eq!(first, vec!["a", "b", "c"]);
        assert_eq!(first, second);
    }
}
