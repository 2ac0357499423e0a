//! Token definitions for the tern tokenizer.

use std::collections::HashSet;
use std::fmt;

use lazy_static::lazy_static;

/// The class tag carried by every token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    Identifier,
    Integer,
    Float,
    String,
    Boolean,
    Punctuation,
    Reserved,
    End,
}

impl fmt::Display for TokenClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenClass::Identifier => "identifier",
            TokenClass::Integer => "integer",
            TokenClass::Float => "float",
            TokenClass::String => "string",
            TokenClass::Boolean => "boolean",
            TokenClass::Punctuation => "punctuation",
            TokenClass::Reserved => "reserved",
            TokenClass::End => "end",
        };
        f.write_str(name)
    }
}

/// Words the scanner tags as `Reserved` instead of `Identifier`.
pub const RESERVED_WORDS: &[&str] = &[
    "array",
    "assert",
    "break",
    "call",
    "case",
    "catch",
    "chan",
    "const",
    "continue",
    "default",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "if",
    "import",
    "interface",
    "map",
    "nil",
    "package",
    "print",
    "range",
    "return",
    "struct",
    "switch",
    "try",
    "type",
    "var",
];

/// Two- and three-character punctuators, longest first.
pub const COMPOUND_PUNCTUATION: &[&str] = &[
    "...", ":=", "==", "!=", "<=", ">=", "->", "<-", "++", "--", "+=", "-=", "*=", "/=", "&&",
    "||", "<<", ">>",
];

lazy_static! {
    static ref RESERVED: HashSet<&'static str> = RESERVED_WORDS.iter().copied().collect();
}

pub fn is_reserved(word: &str) -> bool {
    RESERVED.contains(word)
}

/// A token with its class and source location.
///
/// For string tokens the spelling is the decoded value, without quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub spelling: String,
    pub class: TokenClass,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(spelling: impl Into<String>, class: TokenClass, line: usize, column: usize) -> Self {
        Self {
            spelling: spelling.into(),
            class,
            line,
            column,
        }
    }

    pub fn end() -> Self {
        Self::new("", TokenClass::End, 0, 0)
    }

    pub fn is_end(&self) -> bool {
        self.class == TokenClass::End
    }

    /// True when this is the punctuation or reserved word `text`.
    ///
    /// String literals never match, so `"if"` does not look like `if`.
    pub fn is(&self, text: &str) -> bool {
        matches!(self.class, TokenClass::Punctuation | TokenClass::Reserved) && self.spelling == text
    }

    pub fn is_identifier(&self) -> bool {
        self.class == TokenClass::Identifier
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self.class,
            TokenClass::Integer | TokenClass::Float | TokenClass::String | TokenClass::Boolean
        )
    }

    /// An identifier that may name a new symbol.
    pub fn is_symbol_name(&self) -> bool {
        self.is_identifier()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class {
            TokenClass::String => write!(f, "\"{}\"", self.spelling),
            TokenClass::End => f.write_str("end of input"),
            _ => f.write_str(&self.spelling),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_matches_punctuation_and_reserved_only() {
        assert!(Token::new("{", TokenClass::Punctuation, 1, 1).is("{"));
        assert!(Token::new("for", TokenClass::Reserved, 1, 1).is("for"));
        assert!(!Token::new("for", TokenClass::String, 1, 1).is("for"));
        assert!(!Token::new("x", TokenClass::Identifier, 1, 1).is("x"));
    }

    #[test]
    fn test_reserved_words() {
        assert!(RESERVED_WORDS.iter().all(|word| is_reserved(word)));
        assert!(!is_reserved("len"));
        assert!(!is_reserved("Func"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Token::new("hi", TokenClass::String, 1, 1).to_string(), "\"hi\"");
        assert_eq!(Token::end().to_string(), "end of input");
    }
}
