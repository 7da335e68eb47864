use crate::TextRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Lifetime,
    Literal,
    /// `::`
    PathSep,
    /// `=>`
    FatArrow,
    /// `->`
    ThinArrow,
    Punct(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: TextRange,
}

impl Token {
    pub fn text(self, src: &str) -> &str {
        self.range.slice(src)
    }

    pub fn is_punct(self, ch: char) -> bool {
        self.kind == TokenKind::Punct(ch)
    }

    pub fn is_ident(self, src: &str, text: &str) -> bool {
        self.kind == TokenKind::Ident && self.text(src) == text
    }
}

/// Tokenize Rust source, dropping whitespace and comments.
///
/// Unterminated literals and comments run to the end of input; the lexer never fails.
pub fn lex(src: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(src);
    let mut out = Vec::new();
    while let Some(token) = lexer.next_token() {
        out.push(token);
    }
    out
}

#[derive(Debug, Clone)]
struct Lexer<'a> {
    src: &'a str,
    offset: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, offset: 0 }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.src.as_bytes().get(self.offset).copied()
    }

    fn byte_at(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(offset).copied()
    }

    fn peek_char(&self) -> Option<char> {
        self.src.get(self.offset..)?.chars().next()
    }

    fn char_at(&self, offset: usize) -> Option<char> {
        self.src.get(offset..)?.chars().next()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.src
            .as_bytes()
            .get(self.offset..)
            .is_some_and(|rest| rest.starts_with(s.as_bytes()))
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if !ch.is_whitespace() {
                break;
            }
            self.offset += ch.len_utf8();
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(b) = self.peek_byte() {
            self.offset += 1;
            if b == b'\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self) {
        // Assumes `/*` already matched. Block comments nest.
        self.offset += 2;
        let mut depth = 1usize;
        while self.offset < self.src.len() {
            if self.starts_with("/*") {
                depth += 1;
                self.offset += 2;
                continue;
            }
            if self.starts_with("*/") {
                depth -= 1;
                self.offset += 2;
                if depth == 0 {
                    break;
                }
                continue;
            }
            self.offset += 1;
        }
    }

    fn skip_string_like(&mut self, quote: u8) {
        // Consumes opening quote.
        self.offset += 1;
        while let Some(b) = self.peek_byte() {
            self.offset += 1;
            if b == b'\\' {
                self.offset += 1;
                continue;
            }
            if b == quote {
                break;
            }
        }
        self.offset = self.offset.min(self.src.len());
    }

    /// `r"..."` / `r#"..."#` with the offset on the first `#` or `"`.
    fn skip_raw_string(&mut self) {
        let mut hashes = 0usize;
        while self.peek_byte() == Some(b'#') {
            hashes += 1;
            self.offset += 1;
        }
        if self.peek_byte() != Some(b'"') {
            return;
        }
        self.offset += 1;
        let closing = format!("\"{}", "#".repeat(hashes));
        match self.src.get(self.offset..).and_then(|rest| rest.find(&closing)) {
            Some(pos) => self.offset += pos + closing.len(),
            None => self.offset = self.src.len(),
        }
    }

    fn eat_ident_continue(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch == '_' || unicode_ident::is_xid_continue(ch) {
                self.offset += ch.len_utf8();
            } else {
                break;
            }
        }
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            range: TextRange::new(start, self.offset),
        }
    }

    /// Handles string prefixes (`b"`, `br"`, `r#"`, `c"`) and raw identifiers.
    /// Returns `None` when the identifier at `start` is a plain identifier.
    fn try_prefixed_literal(&mut self, start: usize) -> Option<Token> {
        let rest = &self.src[start..];
        let after = |n: usize| self.byte_at(start + n);
        if rest.starts_with("br") && matches!(after(2), Some(b'"' | b'#')) {
            self.offset = start + 2;
            self.skip_raw_string();
            return Some(self.token(TokenKind::Literal, start));
        }
        if rest.starts_with("r#") && after(2).is_some_and(|b| b.is_ascii_alphabetic() || b == b'_') {
            // Raw identifier.
            self.offset = start + 2;
            self.eat_ident_continue();
            return Some(self.token(TokenKind::Ident, start));
        }
        if rest.starts_with('r') && matches!(after(1), Some(b'"' | b'#')) {
            self.offset = start + 1;
            self.skip_raw_string();
            return Some(self.token(TokenKind::Literal, start));
        }
        if (rest.starts_with('b') || rest.starts_with('c')) && after(1) == Some(b'"') {
            self.offset = start + 1;
            self.skip_string_like(b'"');
            return Some(self.token(TokenKind::Literal, start));
        }
        if rest.starts_with('b') && after(1) == Some(b'\'') {
            self.offset = start + 1;
            self.skip_string_like(b'\'');
            return Some(self.token(TokenKind::Literal, start));
        }
        None
    }

    fn lex_quote(&mut self, start: usize) -> Token {
        // `'` starts either a char literal or a lifetime/label.
        let Some(first) = self.char_at(start + 1) else {
            self.offset = start + 1;
            return self.token(TokenKind::Punct('\''), start);
        };
        if first == '\\' {
            self.offset = start;
            self.skip_string_like(b'\'');
            return self.token(TokenKind::Literal, start);
        }
        let after_first = start + 1 + first.len_utf8();
        if self.byte_at(after_first) == Some(b'\'') {
            self.offset = after_first + 1;
            return self.token(TokenKind::Literal, start);
        }
        if first == '_' || unicode_ident::is_xid_start(first) {
            self.offset = after_first;
            self.eat_ident_continue();
            return self.token(TokenKind::Lifetime, start);
        }
        self.offset = start + 1;
        self.token(TokenKind::Punct('\''), start)
    }

    fn lex_number(&mut self) {
        while let Some(b) = self.peek_byte() {
            match b {
                b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.offset += 1,
                b'.' if self.byte_at(self.offset + 1).is_some_and(|n| n.is_ascii_digit()) => {
                    self.offset += 1;
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        loop {
            self.skip_whitespace();
            if self.offset >= self.src.len() {
                return None;
            }

            if self.starts_with("//") {
                self.skip_line_comment();
                continue;
            }
            if self.starts_with("/*") {
                self.skip_block_comment();
                continue;
            }

            let start = self.offset;
            let ch = self.peek_char()?;

            if ch == '_' || unicode_ident::is_xid_start(ch) {
                if let Some(token) = self.try_prefixed_literal(start) {
                    return Some(token);
                }
                self.offset += ch.len_utf8();
                self.eat_ident_continue();
                return Some(self.token(TokenKind::Ident, start));
            }

            match ch {
                '"' => {
                    self.skip_string_like(b'"');
                    return Some(self.token(TokenKind::Literal, start));
                }
                '\'' => return Some(self.lex_quote(start)),
                '0'..='9' => {
                    self.lex_number();
                    return Some(self.token(TokenKind::Literal, start));
                }
                _ => {}
            }

            for (text, kind) in [
                ("::", TokenKind::PathSep),
                ("=>", TokenKind::FatArrow),
                ("->", TokenKind::ThinArrow),
            ] {
                if self.starts_with(text) {
                    self.offset += text.len();
                    return Some(self.token(kind, start));
                }
            }

            self.offset += ch.len_utf8();
            return Some(self.token(TokenKind::Punct(ch), start));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<(TokenKind, &str)> {
        lex(src)
            .into_iter()
            .map(|token| (token.kind, token.text(src)))
            .collect()
    }

    #[test]
    fn lexes_paths_and_arrows() {
        assert_eq!(
            kinds("crate::a::f() -> u8 => x"),
            vec![
                (TokenKind::Ident, "crate"),
                (TokenKind::PathSep, "::"),
                (TokenKind::Ident, "a"),
                (TokenKind::PathSep, "::"),
                (TokenKind::Ident, "f"),
                (TokenKind::Punct('('), "("),
                (TokenKind::Punct(')'), ")"),
                (TokenKind::ThinArrow, "->"),
                (TokenKind::Ident, "u8"),
                (TokenKind::FatArrow, "=>"),
                (TokenKind::Ident, "x"),
            ]
        );
    }

    #[test]
    fn distinguishes_lifetimes_from_chars() {
        assert_eq!(
            kinds("&'a str 'x' '\\n'"),
            vec![
                (TokenKind::Punct('&'), "&"),
                (TokenKind::Lifetime, "'a"),
                (TokenKind::Ident, "str"),
                (TokenKind::Literal, "'x'"),
                (TokenKind::Literal, "'\\n'"),
            ]
        );
    }

    #[test]
    fn skips_comments_and_strings() {
        let src = "/* outer /* inner */ still */ a // b\n r#\"x \" y\"# br\"z\" \"q::w\" r#type";
        assert_eq!(
            kinds(src),
            vec![
                (TokenKind::Ident, "a"),
                (TokenKind::Literal, "r#\"x \" y\"#"),
                (TokenKind::Literal, "br\"z\""),
                (TokenKind::Literal, "\"q::w\""),
                (TokenKind::Ident, "r#type"),
            ]
        );
    }

    #[test]
    fn unicode_identifiers_do_not_panic() {
        assert_eq!(
            kinds("/* ünïcode */ größe"),
            vec![(TokenKind::Ident, "größe")]
        );
    }
}
