//! Character scanner: source text to a token vector.

use crate::error::{Error, ErrorKind, Result};
use crate::lexer::token::{is_reserved, Token, TokenClass, COMPOUND_PUNCTUATION};

const SINGLE_PUNCTUATION: &str = "+-*/%^&|!<>=()[]{},;:.?@~";

/// Scans a source string into tokens. The end sentinel is not stored.
pub struct Scanner<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    line: usize,
    column: usize,
    start_line: usize,
    start_column: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            line: 1,
            column: 1,
            start_line: 1,
            start_column: 1,
        }
    }

    /// Scan all tokens from the source.
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.scan_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    /// Scan the next token, or `None` at end of input.
    pub fn scan_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace_and_comments();
        self.mark_start();

        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let token = match c {
            '"' => {
                self.advance();
                self.scan_string()?
            }
            '`' => {
                self.advance();
                self.scan_raw_string()?
            }
            c if c.is_ascii_digit() => self.scan_number()?,
            '.' if self.peek_next().is_some_and(|n| n.is_ascii_digit()) => self.scan_number()?,
            c if c.is_alphabetic() || c == '_' || c == '$' => self.scan_identifier(),
            _ => self.scan_punctuation()?,
        };
        Ok(Some(token))
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r') => {
                    self.advance();
                }
                Some('\n') => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while self.peek().is_some() && self.peek() != Some('\n') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_punctuation(&mut self) -> Result<Token> {
        let rest = &self.source[self.current_pos..];
        if let Some(compound) = COMPOUND_PUNCTUATION.iter().find(|p| rest.starts_with(**p)) {
            for _ in 0..compound.len() {
                self.advance();
            }
            return Ok(self.make_token(*compound, TokenClass::Punctuation));
        }

        let c = self.advance().unwrap_or_default();
        if SINGLE_PUNCTUATION.contains(c) {
            Ok(self.make_token(c.to_string(), TokenClass::Punctuation))
        } else {
            Err(self.error(ErrorKind::UnexpectedCharacter).context(c))
        }
    }

    fn scan_string(&mut self) -> Result<Token> {
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(self.error(ErrorKind::UnterminatedString));
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    value.push(self.scan_escape()?);
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }
        Ok(self.make_token(value, TokenClass::String))
    }

    fn scan_escape(&mut self) -> Result<char> {
        let Some(c) = self.advance() else {
            return Err(self.error(ErrorKind::UnterminatedString));
        };
        let decoded = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            'x' => {
                let mut hex = String::new();
                for _ in 0..2 {
                    match self.advance() {
                        Some(h) if h.is_ascii_hexdigit() => hex.push(h),
                        _ => return Err(self.error(ErrorKind::InvalidEscape).context("\\x")),
                    }
                }
                u8::from_str_radix(&hex, 16)
                    .map(char::from)
                    .map_err(|_| self.error(ErrorKind::InvalidEscape).context("\\x"))?
            }
            'u' => {
                if self.advance() != Some('{') {
                    return Err(self.error(ErrorKind::InvalidEscape).context("\\u"));
                }
                let mut hex = String::new();
                loop {
                    match self.advance() {
                        Some('}') => break,
                        Some(h) if h.is_ascii_hexdigit() && hex.len() < 6 => hex.push(h),
                        _ => return Err(self.error(ErrorKind::InvalidEscape).context("\\u")),
                    }
                }
                u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error(ErrorKind::InvalidEscape).context("\\u"))?
            }
            other => {
                return Err(self.error(ErrorKind::InvalidEscape).context(format!("\\{}", other)))
            }
        };
        Ok(decoded)
    }

    /// Backtick strings: no escapes, may span lines.
    fn scan_raw_string(&mut self) -> Result<Token> {
        let mut value = String::new();
        loop {
            match self.advance() {
                None => return Err(self.error(ErrorKind::UnterminatedString)),
                Some('`') => break,
                Some(c) => value.push(c),
            }
        }
        Ok(self.make_token(value, TokenClass::String))
    }

    fn scan_number(&mut self) -> Result<Token> {
        if self.peek() == Some('0') {
            if let Some(radix) = match self.peek_next() {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            } {
                return self.scan_radix_number(radix);
            }
        }

        let mut value = String::new();
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                value.push(c);
                self.advance();
            } else if c == '_' {
                self.advance();
            } else if c == '.' && !is_float && self.peek_next().is_some_and(|n| n.is_ascii_digit()) {
                is_float = true;
                value.push(c);
                self.advance();
            } else if (c == 'e' || c == 'E') && self.exponent_follows() {
                is_float = true;
                value.push(c);
                self.advance();
                if let Some(sign @ ('+' | '-')) = self.peek() {
                    value.push(sign);
                    self.advance();
                }
                while let Some(d) = self.peek().filter(|d| d.is_ascii_digit()) {
                    value.push(d);
                    self.advance();
                }
                break;
            } else {
                break;
            }
        }

        if is_float {
            value
                .parse::<f64>()
                .map_err(|_| self.error(ErrorKind::InvalidNumber).context(&value))?;
            Ok(self.make_token(value, TokenClass::Float))
        } else {
            value
                .parse::<i64>()
                .map_err(|_| self.error(ErrorKind::InvalidNumber).context(&value))?;
            Ok(self.make_token(value, TokenClass::Integer))
        }
    }

    fn exponent_follows(&self) -> bool {
        let mut rest = self.source[self.current_pos..].chars().skip(1);
        match rest.next() {
            Some(d) if d.is_ascii_digit() => true,
            Some('+' | '-') => rest.next().is_some_and(|d| d.is_ascii_digit()),
            _ => false,
        }
    }

    /// `0x`, `0o` and `0b` literals. The spelling is normalized to decimal.
    fn scan_radix_number(&mut self, radix: u32) -> Result<Token> {
        self.advance();
        let prefix = self.advance().unwrap_or_default();
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if c == '_' {
                self.advance();
            } else if c.is_ascii_alphanumeric() {
                digits.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let spelling = format!("0{}{}", prefix, digits);
        let value = i64::from_str_radix(&digits, radix)
            .map_err(|_| self.error(ErrorKind::InvalidNumber).context(&spelling))?;
        Ok(self.make_token(value.to_string(), TokenClass::Integer))
    }

    fn scan_identifier(&mut self) -> Token {
        let mut value = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                value.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let class = match value.as_str() {
            "true" | "false" => TokenClass::Boolean,
            word if is_reserved(word) => TokenClass::Reserved,
            _ => TokenClass::Identifier,
        };
        self.make_token(value, class)
    }

    fn advance(&mut self) -> Option<char> {
        let (pos, c) = self.chars.next()?;
        self.current_pos = pos + c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.source[self.current_pos..].chars();
        iter.next();
        iter.next()
    }

    fn mark_start(&mut self) {
        self.start_line = self.line;
        self.start_column = self.column;
    }

    fn error(&self, kind: ErrorKind) -> Error {
        Error::new(kind).at(self.start_line, self.start_column)
    }

    fn make_token(&self, spelling: impl Into<String>, class: TokenClass) -> Token {
        Token::new(spelling, class, self.start_line, self.start_column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scan(source: &str) -> Vec<(String, TokenClass)> {
        Scanner::new(source)
            .scan_tokens()
            .unwrap()
            .into_iter()
            .map(|t| (t.spelling, t.class))
            .collect()
    }

    fn spellings(source: &str) -> Vec<String> {
        scan(source).into_iter().map(|(s, _)| s).collect()
    }

    #[test]
    fn test_compound_punctuation() {
        assert_eq!(
            spellings("a := b == c != d <= e >= f -> g ... <- h++"),
            vec![
                "a", ":=", "b", "==", "c", "!=", "d", "<=", "e", ">=", "f", "->", "g", "...",
                "<-", "h", "++"
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            scan("42 3.14 0x1F 0o17 0b101 1_000 2e3"),
            vec![
                ("42".to_string(), TokenClass::Integer),
                ("3.14".to_string(), TokenClass::Float),
                ("31".to_string(), TokenClass::Integer),
                ("15".to_string(), TokenClass::Integer),
                ("5".to_string(), TokenClass::Integer),
                ("1000".to_string(), TokenClass::Integer),
                ("2e3".to_string(), TokenClass::Float),
            ]
        );
    }

    #[test]
    fn test_member_after_integer_is_not_float() {
        assert_eq!(spellings("a[1].x"), vec!["a", "[", "1", "]", ".", "x"]);
    }

    #[test]
    fn test_invalid_radix_literal() {
        let err = Scanner::new("0b102").scan_tokens().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidNumber);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            scan(r#""a\tb\n\"q\" \x41\u{263A}""#),
            vec![("a\tb\n\"q\" A\u{263A}".to_string(), TokenClass::String)]
        );
    }

    #[test]
    fn test_raw_string_spans_lines() {
        let tokens = Scanner::new("`a\\n\nb` x").scan_tokens().unwrap();
        assert_eq!(tokens[0].spelling, "a\\n\nb");
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn test_unterminated_string() {
        let err = Scanner::new("x := \"abc").scan_tokens().unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnterminatedString);
        assert_eq!((err.line, err.column), (1, 6));
    }

    #[test]
    fn test_invalid_escape() {
        let err = Scanner::new(r#""\q""#).scan_tokens().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidEscape);
    }

    #[test]
    fn test_classes() {
        assert_eq!(
            scan("for x true nil"),
            vec![
                ("for".to_string(), TokenClass::Reserved),
                ("x".to_string(), TokenClass::Identifier),
                ("true".to_string(), TokenClass::Boolean),
                ("nil".to_string(), TokenClass::Reserved),
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = Scanner::new("a\n  bb // note\n c").scan_tokens().unwrap();
        let positions: Vec<_> = tokens.iter().map(|t| (t.line, t.column)).collect();
        assert_eq!(positions, vec![(1, 1), (2, 3), (3, 2)]);
    }
}
