//! Cursor over a scanned token buffer.
//!
//! The compiler drives a `Tokenizer` forward with `next`, looks ahead with
//! `peek`, and backs out of speculative parses with `mark`/`reset`.

use crate::error::Result;
use crate::lexer::scanner::Scanner;
use crate::lexer::token::Token;

#[derive(Debug, Clone)]
pub struct Tokenizer {
    tokens: Vec<Token>,
    lines: Vec<String>,
    pos: usize,
    end: Token,
}

impl Tokenizer {
    pub fn new(source: &str) -> Result<Self> {
        let tokens = Scanner::new(source).scan_tokens()?;
        Ok(Self::from_tokens(tokens, source))
    }

    pub fn from_tokens(tokens: Vec<Token>, source: &str) -> Self {
        let last_line = tokens.last().map(|t| t.line).unwrap_or(1);
        let mut end = Token::end();
        end.line = last_line;
        Self {
            tokens,
            lines: source.lines().map(str::to_string).collect(),
            pos: 0,
            end,
        }
    }

    /// Return the current token and move past it.
    pub fn next(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    /// The token `n` positions ahead; `peek(1)` is the token `next` would return.
    pub fn peek(&self, n: usize) -> &Token {
        let index = self.pos + n.saturating_sub(1);
        self.tokens.get(index).unwrap_or(&self.end)
    }

    pub fn current(&self) -> &Token {
        self.peek(1)
    }

    /// The most recently consumed token.
    pub fn previous(&self) -> &Token {
        if self.pos == 0 {
            return &self.end;
        }
        self.tokens.get(self.pos - 1).unwrap_or(&self.end)
    }

    /// Move the cursor by `n` tokens, clamped to the buffer.
    pub fn advance(&mut self, n: isize) {
        let target = self.pos as isize + n;
        self.pos = target.clamp(0, self.tokens.len() as isize) as usize;
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn is_next(&self, text: &str) -> bool {
        self.current().is(text)
    }

    pub fn is_any_next(&self, texts: &[&str]) -> bool {
        texts.iter().any(|t| self.is_next(t))
    }

    /// Consume the next token when it is `text`.
    pub fn is_next_consume(&mut self, text: &str) -> bool {
        if self.is_next(text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn mark(&self) -> usize {
        self.pos
    }

    pub fn reset(&mut self, mark: usize) {
        self.pos = mark.min(self.tokens.len());
    }

    /// Source text of a 1-based line.
    pub fn get_line(&self, n: usize) -> Option<&str> {
        n.checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map(String::as_str)
    }

    pub fn get_tokens(&self, from: usize, to: usize) -> &[Token] {
        let to = to.min(self.tokens.len());
        let from = from.min(to);
        &self.tokens[from..to]
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Line of the token the cursor sits on, or of the last token at the end.
    pub fn line(&self) -> usize {
        self.current().line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::token::TokenClass;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_next_and_end_sentinel() {
        let mut t = Tokenizer::new("a + 1").unwrap();
        assert_eq!(t.next().spelling, "a");
        assert_eq!(t.next().spelling, "+");
        assert_eq!(t.next().spelling, "1");
        assert!(t.at_end());
        assert_eq!(t.next().class, TokenClass::End);
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_peek_lookahead() {
        let t = Tokenizer::new("x := 5").unwrap();
        assert_eq!(t.peek(1).spelling, "x");
        assert_eq!(t.peek(2).spelling, ":=");
        assert_eq!(t.peek(3).spelling, "5");
        assert!(t.peek(4).is_end());
    }

    #[test]
    fn test_advance_negative_and_mark_reset() {
        let mut t = Tokenizer::new("a b c d").unwrap();
        let m = t.mark();
        t.advance(3);
        assert_eq!(t.current().spelling, "d");
        t.advance(-2);
        assert_eq!(t.current().spelling, "b");
        t.advance(-10);
        assert_eq!(t.current().spelling, "a");
        t.advance(2);
        t.reset(m);
        assert_eq!(t.current().spelling, "a");
    }

    #[test]
    fn test_is_next_helpers() {
        let mut t = Tokenizer::new("{ }").unwrap();
        assert!(t.is_next("{"));
        assert!(t.is_any_next(&["(", "{"]));
        assert!(t.is_next_consume("{"));
        assert!(t.is_next("}"));
    }

    #[test]
    fn test_lines_and_ranges() {
        let t = Tokenizer::new("x := 1\nprint x").unwrap();
        assert_eq!(t.get_line(2), Some("print x"));
        assert_eq!(t.get_line(0), None);
        let spellings: Vec<_> = t.get_tokens(1, 3).iter().map(|t| t.spelling.as_str()).collect();
        assert_eq!(spellings, vec![":=", "1"]);
    }
}
