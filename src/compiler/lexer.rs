//! Tokenizer for the component language.
//!
//! The lexer is position-based and cheap to clone so the parser can look ahead
//! and switch into raw JSX scanning at any offset.

use super::error::CompileError;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(Rc<str>),
    Number(f64),
    Str(Rc<str>),
    Template(TemplateParts),
    Punct(&'static str),
    Eof,
}

/// Cooked text chunks of a template literal and the byte ranges of its
/// `${...}` expressions. There is always one more quasi than expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateParts {
    pub quasis: Vec<String>,
    pub exprs: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    /// A line terminator appeared between the previous token and this one.
    pub newline_before: bool,
}

impl Token {
    pub fn is_punct(&self, p: &str) -> bool {
        matches!(&self.kind, TokenKind::Punct(q) if *q == p)
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(n) if &**n == name)
    }

    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Ident(n) => format!("'{}'", n),
            TokenKind::Number(n) => format!("number {}", n),
            TokenKind::Str(_) => "string".to_string(),
            TokenKind::Template(_) => "template literal".to_string(),
            TokenKind::Punct(p) => format!("'{}'", p),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

// Longest first.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-",
    "*", "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".",
];

#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    end: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self::with_range(src, 0, src.len())
    }

    /// Lex only `src[start..end]`, keeping offsets absolute.
    pub fn with_range(src: &'a str, start: usize, end: usize) -> Self {
        Self {
            src,
            pos: start,
            end,
        }
    }

    pub fn src(&self) -> &'a str {
        self.src
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.end);
    }

    pub fn peek_char(&self) -> Option<char> {
        self.src[self.pos..self.end].chars().next()
    }

    fn peek_char_at(&self, skip: usize) -> Option<char> {
        self.src[self.pos..self.end].chars().nth(skip)
    }

    pub fn bump_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.end
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> CompileError {
        CompileError::syntax(self.src, offset, message)
    }

    /// Skip whitespace and comments; report whether a newline was crossed.
    fn skip_trivia(&mut self) -> Result<bool, CompileError> {
        let mut newline = false;
        loop {
            match self.peek_char() {
                Some('\n') | Some('\r') | Some('\u{2028}') | Some('\u{2029}') => {
                    newline = true;
                    self.bump_char();
                }
                Some(c) if c.is_whitespace() || c == '\u{feff}' => {
                    self.bump_char();
                }
                Some('/') if self.peek_char_at(1) == Some('/') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.bump_char();
                    }
                }
                Some('/') if self.peek_char_at(1) == Some('*') => {
                    let start = self.pos;
                    self.pos += 2;
                    match self.src[self.pos..self.end].find("*/") {
                        Some(close) => {
                            if self.src[self.pos..self.pos + close].contains('\n') {
                                newline = true;
                            }
                            self.pos += close + 2;
                        }
                        None => return Err(self.error(start, "Unterminated comment")),
                    }
                }
                _ => return Ok(newline),
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token, CompileError> {
        let newline_before = self.skip_trivia()?;
        let start = self.pos;
        let Some(c) = self.peek_char() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                start,
                end: start,
                newline_before,
            });
        };

        let kind = if is_ident_start(c) {
            TokenKind::Ident(self.scan_identifier().into())
        } else if c.is_ascii_digit()
            || (c == '.' && self.peek_char_at(1).is_some_and(|d| d.is_ascii_digit()))
        {
            TokenKind::Number(self.scan_number()?)
        } else if c == '"' || c == '\'' {
            TokenKind::Str(self.scan_string(c)?.into())
        } else if c == '`' {
            TokenKind::Template(self.scan_template()?)
        } else {
            TokenKind::Punct(self.scan_punct()?)
        };

        Ok(Token {
            kind,
            start,
            end: self.pos,
            newline_before,
        })
    }

    fn scan_identifier(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek_char() {
            if is_ident_part(c) {
                out.push(c);
                self.bump_char();
            } else {
                break;
            }
        }
        out
    }

    fn scan_number(&mut self) -> Result<f64, CompileError> {
        let start = self.pos;
        if self.peek_char() == Some('0') {
            let radix = match self.peek_char_at(1) {
                Some('x') | Some('X') => Some(16),
                Some('o') | Some('O') => Some(8),
                Some('b') | Some('B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                let digits_start = self.pos;
                while self
                    .peek_char()
                    .is_some_and(|c| c.is_digit(radix) || c == '_')
                {
                    self.bump_char();
                }
                let digits: String = self.src[digits_start..self.pos]
                    .chars()
                    .filter(|c| *c != '_')
                    .collect();
                return u64::from_str_radix(&digits, radix)
                    .map(|n| n as f64)
                    .map_err(|_| self.error(start, "Invalid number literal"));
            }
        }

        let mut seen_dot = false;
        let mut seen_exp = false;
        while let Some(c) = self.peek_char() {
            match c {
                '0'..='9' | '_' => {
                    self.bump_char();
                }
                '.' if !seen_dot && !seen_exp => {
                    seen_dot = true;
                    self.bump_char();
                }
                'e' | 'E' if !seen_exp => {
                    seen_exp = true;
                    self.bump_char();
                    if matches!(self.peek_char(), Some('+') | Some('-')) {
                        self.bump_char();
                    }
                }
                _ => break,
            }
        }
        if self.peek_char().is_some_and(is_ident_start) {
            return Err(self.error(self.pos, "Invalid or unexpected token after number"));
        }
        let text: String = self.src[start..self.pos]
            .chars()
            .filter(|c| *c != '_')
            .collect();
        text.parse::<f64>()
            .map_err(|_| self.error(start, "Invalid number literal"))
    }

    fn scan_escape(&mut self, out: &mut String) -> Result<(), CompileError> {
        let at = self.pos;
        let Some(c) = self.bump_char() else {
            return Err(self.error(at, "Invalid escape sequence"));
        };
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            '\r' => {
                if self.peek_char() == Some('\n') {
                    self.bump_char();
                }
            }
            '\n' => {}
            'x' => {
                let hex: String = (0..2).filter_map(|_| self.bump_char()).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| self.error(at, "Invalid hexadecimal escape sequence"))?;
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            'u' => {
                let hex: String = if self.peek_char() == Some('{') {
                    self.bump_char();
                    let mut hex = String::new();
                    while let Some(h) = self.bump_char() {
                        if h == '}' {
                            break;
                        }
                        hex.push(h);
                    }
                    hex
                } else {
                    (0..4).filter_map(|_| self.bump_char()).collect()
                };
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| self.error(at, "Invalid Unicode escape sequence"))?;
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            other => out.push(other),
        }
        Ok(())
    }

    fn scan_string(&mut self, quote: char) -> Result<String, CompileError> {
        let start = self.pos;
        self.bump_char();
        let mut out = String::new();
        loop {
            match self.bump_char() {
                None | Some('\n') => return Err(self.error(start, "Unterminated string literal")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => self.scan_escape(&mut out)?,
                Some(c) => out.push(c),
            }
        }
    }

    fn scan_template(&mut self) -> Result<TemplateParts, CompileError> {
        let start = self.pos;
        self.bump_char();
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        let mut current = String::new();
        loop {
            match self.bump_char() {
                None => return Err(self.error(start, "Unterminated template literal")),
                Some('`') => {
                    quasis.push(current);
                    return Ok(TemplateParts { quasis, exprs });
                }
                Some('\\') => self.scan_escape(&mut current)?,
                Some('$') if self.peek_char() == Some('{') => {
                    self.bump_char();
                    quasis.push(std::mem::take(&mut current));
                    let expr_start = self.pos;
                    let expr_end = self.skip_balanced_braces(expr_start)?;
                    exprs.push((expr_start, expr_end));
                    // past the closing brace
                    self.pos = expr_end + 1;
                }
                Some(c) => current.push(c),
            }
        }
    }

    /// Find the `}` closing a `${` opened just before `from`, skipping strings,
    /// comments and nested templates.
    fn skip_balanced_braces(&mut self, from: usize) -> Result<usize, CompileError> {
        self.pos = from;
        let mut depth = 0usize;
        loop {
            self.skip_trivia()?;
            match self.peek_char() {
                None => return Err(self.error(from, "Unterminated template expression")),
                Some('}') if depth == 0 => return Ok(self.pos),
                Some('}') => {
                    depth -= 1;
                    self.bump_char();
                }
                Some('{') => {
                    depth += 1;
                    self.bump_char();
                }
                Some(q @ ('"' | '\'')) => {
                    self.scan_string(q)?;
                }
                Some('`') => {
                    self.scan_template()?;
                }
                Some(_) => {
                    self.bump_char();
                }
            }
        }
    }

    fn scan_punct(&mut self) -> Result<&'static str, CompileError> {
        let rest = &self.src[self.pos..self.end];
        for p in PUNCTUATORS {
            if rest.starts_with(p) {
                // `a?.5:1` is a conditional, not optional chaining
                if *p == "?." && rest[2..].starts_with(|c: char| c.is_ascii_digit()) {
                    continue;
                }
                self.pos += p.len();
                return Ok(p);
            }
        }
        let c = rest.chars().next().unwrap_or(' ');
        Err(self.error(self.pos, format!("Invalid or unexpected token '{}'", c)))
    }

    // Raw JSX scanning. These operate on characters, not tokens.

    pub fn skip_jsx_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.bump_char();
        }
    }

    /// Tag or attribute name: identifier characters plus `-`, `.` and `:`.
    pub fn scan_jsx_name(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek_char() {
            if is_ident_part(c) || matches!(c, '-' | '.' | ':') {
                out.push(c);
                self.bump_char();
            } else {
                break;
            }
        }
        out
    }

    /// Quoted attribute value; no escapes, entities decoded.
    pub fn scan_jsx_attr_string(&mut self) -> Result<String, CompileError> {
        let start = self.pos;
        let Some(quote) = self.bump_char() else {
            return Err(self.error(start, "Expected attribute value"));
        };
        let mut raw = String::new();
        loop {
            match self.bump_char() {
                None => return Err(self.error(start, "Unterminated JSX attribute string")),
                Some(c) if c == quote => return Ok(decode_entities(&raw)),
                Some(c) => raw.push(c),
            }
        }
    }

    /// Text up to the next `<` or `{`.
    pub fn scan_jsx_text(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c == '<' || c == '{' {
                break;
            }
            self.bump_char();
        }
        self.src[start..self.pos].to_string()
    }
}

pub fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

pub fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Decode the HTML entities commonly found in JSX text.
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|semi| *semi <= 10).and_then(|semi| {
            let entity = &rest[1..semi];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                "middot" => Some('·'),
                "bull" => Some('•'),
                "deg" => Some('°'),
                "times" => Some('×'),
                "hellip" => Some('…'),
                "copy" => Some('©'),
                "mdash" => Some('\u{2014}'),
                "ndash" => Some('\u{2013}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token().unwrap();
            if tok.kind == TokenKind::Eof {
                return out;
            }
            out.push(tok.kind);
        }
    }

    #[test]
    fn lexes_operators_longest_first() {
        assert_eq!(
            kinds("a ??= b?.c === 1"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Punct("??="),
                TokenKind::Ident("b".into()),
                TokenKind::Punct("?."),
                TokenKind::Ident("c".into()),
                TokenKind::Punct("==="),
                TokenKind::Number(1.0),
            ]
        );
        assert_eq!(
            kinds("x?.5:1"),
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Punct("?"),
                TokenKind::Number(0.5),
                TokenKind::Punct(":"),
                TokenKind::Number(1.0),
            ]
        );
    }

    #[test]
    fn strings_numbers_and_comments() {
        assert_eq!(
            kinds("'a\\n' /* c */ 0x1F 1_000 .5 // tail"),
            vec![
                TokenKind::Str("a\n".into()),
                TokenKind::Number(31.0),
                TokenKind::Number(1000.0),
                TokenKind::Number(0.5),
            ]
        );
    }

    #[test]
    fn template_records_expression_ranges() {
        let src = "`a${ {b: 1}.b }c${`in${x}`}`";
        let kinds = kinds(src);
        let TokenKind::Template(parts) = &kinds[0] else {
            panic!("expected template");
        };
        assert_eq!(parts.quasis, vec!["a", "c", ""]);
        assert_eq!(parts.exprs.len(), 2);
        let (s, e) = parts.exprs[0];
        assert_eq!(src[s..e].trim(), "{b: 1}.b");
    }

    #[test]
    fn tracks_newlines_and_reports_errors() {
        let mut lexer = Lexer::new("a\n  b");
        assert!(!lexer.next_token().unwrap().newline_before);
        assert!(lexer.next_token().unwrap().newline_before);

        let err = Lexer::new("'open").next_token().unwrap_err();
        assert!(err.to_string().contains("Unterminated string"));
        let err = Lexer::new("#").next_token().unwrap_err();
        assert!(err.to_string().contains("line 1, column 1"));
    }

    #[test]
    fn decodes_entities() {
        assert_eq!(decode_entities("a &amp; b&nbsp;&#65;&#x42; & c"), "a & b\u{a0}AB & c");
    }
}
