//! C1: character stream to token stream with recoverable error collection
//! (spec.md §4.1).
//!
//! The scanner is an ordered chain: at each position the first scanner whose
//! lookahead predicate matches the current character delegates consumption.
//! Order: whitespace, newline, comment, number, identifier, string, operator,
//! symbol, unknown-fallback.

use crate::diagnostic::Diagnostic;
use crate::token::{classify_word, Token, TokenKind};

type ScannerFn = fn(&mut Lexer) -> bool;

const SCANNER_CHAIN: &[ScannerFn] = &[
    Lexer::scan_whitespace,
    Lexer::scan_newline,
    Lexer::scan_comment,
    Lexer::scan_number,
    Lexer::scan_identifier,
    Lexer::scan_string,
    Lexer::scan_operator,
    Lexer::scan_symbol,
];

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    file: String,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
    pending_ws: String,
}

impl Lexer {
    pub fn new(source: &str, file: impl Into<String>) -> Self {
        // `\r\n` and lone `\r` normalize to `\n` before scanning (spec.md §6).
        let normalized = source.replace("\r\n", "\n").replace('\r', "\n");
        Lexer {
            chars: normalized.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            file: file.into(),
            tokens: Vec::new(),
            diagnostics: Vec::new(),
            pending_ws: String::new(),
        }
    }

    pub fn scan(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        while !self.at_end() {
            let before = self.pos;
            let matched = SCANNER_CHAIN.iter().any(|scanner| scanner(&mut self));
            if !matched {
                self.scan_unknown();
            }
            debug_assert!(self.pos > before, "scanner chain made no progress");
        }
        let (line, column) = (self.line, self.column);
        self.push(TokenKind::Eof, String::new(), line, column);
        validate_declare_statements(&self.tokens, &mut self.diagnostics, &self.file);
        (self.tokens, self.diagnostics)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> char {
        self.chars.get(self.pos).copied().unwrap_or('\0')
    }

    fn peek_at(&self, offset: usize) -> char {
        self.chars.get(self.pos + offset).copied().unwrap_or('\0')
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.pos];
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn push(&mut self, kind: TokenKind, lexeme: String, line: usize, column: usize) {
        let raw = lexeme.clone();
        self.push_with_raw(kind, lexeme, raw, line, column);
    }

    /// Like `push`, but for tokens (string literals) whose `raw_text` is not
    /// the decoded lexeme — it must carry the original quoted, escaped text
    /// so concatenated `raw_text` still reconstructs the source.
    fn push_with_raw(&mut self, kind: TokenKind, lexeme: String, raw: String, line: usize, column: usize) {
        let mut token = Token::new(kind, lexeme, line, column);
        token.raw_text = raw;
        if !self.pending_ws.is_empty() {
            token.raw_text = std::mem::take(&mut self.pending_ws) + &token.raw_text;
        }
        self.tokens.push(token);
    }

    fn scan_whitespace(&mut self) -> bool {
        if self.peek() == ' ' || self.peek() == '\t' {
            while self.peek() == ' ' || self.peek() == '\t' {
                let c = self.advance();
                self.pending_ws.push(c);
            }
            true
        } else {
            false
        }
    }

    fn scan_newline(&mut self) -> bool {
        if self.peek() == '\n' {
            let (line, column) = (self.line, self.column);
            self.advance();
            self.push(TokenKind::Newline, "\n".to_string(), line, column);
            true
        } else {
            false
        }
    }

    fn scan_comment(&mut self) -> bool {
        let (line, column) = (self.line, self.column);
        if self.peek() == '/' && self.peek_at(1) == '/' {
            let mut text = String::new();
            while !self.at_end() && self.peek() != '\n' {
                text.push(self.advance());
            }
            self.push(TokenKind::Comment, text, line, column);
            true
        } else if self.peek() == '/' && self.peek_at(1) == '*' {
            let mut text = String::new();
            text.push(self.advance());
            text.push(self.advance());
            while !(self.at_end() || (self.peek() == '*' && self.peek_at(1) == '/')) {
                text.push(self.advance());
            }
            if !self.at_end() {
                text.push(self.advance());
                text.push(self.advance());
            }
            self.push(TokenKind::Comment, text, line, column);
            true
        } else {
            false
        }
    }

    fn scan_number(&mut self) -> bool {
        if !self.peek().is_ascii_digit() {
            return false;
        }
        let (line, column) = (self.line, self.column);
        let mut text = String::new();

        if self.peek() == '0' && (self.peek_at(1) == 'x' || self.peek_at(1) == 'X') {
            text.push(self.advance());
            text.push(self.advance());
            while self.peek().is_ascii_hexdigit() || self.peek() == '_' {
                text.push(self.advance());
            }
            // A trailing alphabetic char that isn't a valid hex digit is a suffix.
            if self.peek().is_ascii_alphabetic() && !self.peek().is_ascii_hexdigit() {
                text.push(self.advance());
            }
            self.push(TokenKind::NumberLiteral, text, line, column);
            return true;
        }

        while self.peek().is_ascii_digit() || self.peek() == '_' {
            text.push(self.advance());
        }
        if self.peek() == '.' && self.peek_at(1).is_ascii_digit() {
            text.push(self.advance());
            while self.peek().is_ascii_digit() || self.peek() == '_' {
                text.push(self.advance());
            }
        }
        if self.peek() == 'e' || self.peek() == 'E' {
            let mut lookahead = 1;
            if self.peek_at(lookahead) == '+' || self.peek_at(lookahead) == '-' {
                lookahead += 1;
            }
            if self.peek_at(lookahead).is_ascii_digit() {
                text.push(self.advance());
                if self.peek() == '+' || self.peek() == '-' {
                    text.push(self.advance());
                }
                while self.peek().is_ascii_digit() {
                    text.push(self.advance());
                }
            }
        }
        if matches!(self.peek(), 'b' | 's' | 'l' | 'f' | 'B' | 'S' | 'L' | 'F') {
            text.push(self.advance());
        }
        self.push(TokenKind::NumberLiteral, text, line, column);
        true
    }

    fn scan_identifier(&mut self) -> bool {
        if !(self.peek().is_alphabetic() || self.peek() == '_') {
            return false;
        }
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            text.push(self.advance());
        }
        let kind = classify_word(&text);
        self.push(kind, text, line, column);
        true
    }

    fn scan_string(&mut self) -> bool {
        if self.peek() != '"' {
            return false;
        }
        let (line, column) = (self.line, self.column);
        let mut raw = String::new();
        raw.push(self.advance());
        let mut value = String::new();
        while !self.at_end() && self.peek() != '"' {
            let c = self.advance();
            raw.push(c);
            if c == '\\' {
                if self.at_end() {
                    // Dangling backslash at end-of-string preserved verbatim.
                    value.push('\\');
                    break;
                }
                let escaped = self.advance();
                raw.push(escaped);
                match escaped {
                    '"' => value.push('"'),
                    '\\' => value.push('\\'),
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    'b' => value.push('\u{8}'),
                    'f' => value.push('\u{c}'),
                    '\'' => value.push('\''),
                    'u' => {
                        let mut hex = String::new();
                        for _ in 0..4 {
                            if self.peek().is_ascii_hexdigit() {
                                let h = self.advance();
                                raw.push(h);
                                hex.push(h);
                            }
                        }
                        if let Ok(code) = u32::from_str_radix(&hex, 16)
                            && let Some(ch) = char::from_u32(code)
                        {
                            value.push(ch);
                        }
                    }
                    other => {
                        // Unknown escape: literal character.
                        value.push(other);
                    }
                }
            } else {
                value.push(c);
            }
        }
        if !self.at_end() {
            raw.push(self.advance());
        }
        self.push_with_raw(TokenKind::StringLiteral, value, raw, line, column);
        true
    }

    const OPERATORS: &'static [&'static str] = &[
        "==", "!=", ">=", "<=", "&&", "||", "=", ">", "<", "!", "+", "-", "*", "/", "%",
    ];

    fn scan_operator(&mut self) -> bool {
        let (line, column) = (self.line, self.column);
        for op in Self::OPERATORS {
            if self.matches_ahead(op) {
                let mut text = String::new();
                for _ in 0..op.chars().count() {
                    text.push(self.advance());
                }
                self.push(TokenKind::Operator, text, line, column);
                return true;
            }
        }
        false
    }

    const PUNCTUATION: &'static str = ":,.()[]";

    fn scan_symbol(&mut self) -> bool {
        if Self::PUNCTUATION.contains(self.peek()) {
            let (line, column) = (self.line, self.column);
            let c = self.advance();
            self.push(TokenKind::Punct, c.to_string(), line, column);
            true
        } else {
            false
        }
    }

    fn scan_unknown(&mut self) {
        let (line, column) = (self.line, self.column);
        let c = self.advance();
        self.diagnostics.push(Diagnostic::error(
            &self.file,
            line,
            column,
            format!("unexpected character '{c}'"),
        ));
        self.push(TokenKind::Unknown, c.to_string(), line, column);
    }

    fn matches_ahead(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == c)
    }
}

/// Post-scan validation: after `declare` (optionally `const`) exactly one
/// identifier is required; a second identifier before the next newline is a
/// redundant-identifier error (spec.md §4.1).
fn validate_declare_statements(tokens: &[Token], diagnostics: &mut Vec<Diagnostic>, file: &str) {
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].kind == TokenKind::Keyword && tokens[i].is("declare") {
            let mut j = i + 1;
            if j < tokens.len() && tokens[j].kind == TokenKind::Keyword && tokens[j].is("const") {
                j += 1;
            }
            let mut seen_identifier = false;
            // Only the declaration header (name plus optional `: type`) is
            // scanned; stopping at `=`, a keyword, or end-of-line keeps this
            // out of the initializer expression, which may legitimately
            // reference other identifiers.
            while j < tokens.len()
                && tokens[j].kind != TokenKind::Newline
                && tokens[j].kind != TokenKind::Eof
                && tokens[j].kind != TokenKind::Keyword
                && !tokens[j].is("=")
            {
                if tokens[j].kind == TokenKind::Identifier {
                    if seen_identifier {
                        diagnostics.push(Diagnostic::error(
                            file,
                            tokens[j].line,
                            tokens[j].column,
                            format!("redundant identifier '{}' in declare statement", tokens[j].lexeme),
                        ));
                    }
                    seen_identifier = true;
                }
                j += 1;
            }
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token> {
        let (tokens, diags) = Lexer::new(src, "test.snow").scan();
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        tokens
    }

    #[test]
    fn round_trip_reconstructs_source() {
        let src = "declare x:int = 2 + 3 * 4\n";
        let (tokens, _) = Lexer::new(src, "t").scan();
        let mut reconstructed = String::new();
        for t in &tokens {
            if t.kind != TokenKind::Eof {
                reconstructed.push_str(&t.raw_text);
            }
        }
        assert_eq!(reconstructed, src);
    }

    #[test]
    fn ends_with_eof() {
        let tokens = lex("x");
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn number_suffixes_are_preserved_in_lexeme() {
        let tokens = lex("42b 42s 42l 42f 42 4_2 0xFF");
        let lexemes: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::NumberLiteral)
            .map(|t| t.lexeme.as_str())
            .collect();
        assert_eq!(lexemes, vec!["42b", "42s", "42l", "42f", "42", "4_2", "0xFF"]);
    }

    #[test]
    fn string_escapes_decode() {
        let tokens = lex(r#""a\nb\tc\"d""#);
        assert_eq!(tokens[0].lexeme, "a\nb\tc\"d");
    }

    #[test]
    fn string_literal_raw_text_keeps_quotes_and_escapes() {
        let src = r#"declare x:string = "a\nb""#;
        let (tokens, _) = Lexer::new(src, "t").scan();
        let mut reconstructed = String::new();
        for t in &tokens {
            if t.kind != TokenKind::Eof {
                reconstructed.push_str(&t.raw_text);
            }
        }
        assert_eq!(reconstructed, src);
    }

    #[test]
    fn declare_with_two_identifiers_is_redundant() {
        let (_, diags) = Lexer::new("declare x y\n", "t").scan();
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("redundant identifier"));
    }

    #[test]
    fn keywords_and_types_classify_correctly() {
        let tokens = lex("module function int x");
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[1].kind, TokenKind::Keyword);
        assert_eq!(tokens[2].kind, TokenKind::TypeName);
        assert_eq!(tokens[3].kind, TokenKind::Identifier);
    }
}
