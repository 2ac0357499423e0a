//! Lexer module: scanning source text and walking the resulting tokens.

pub mod scanner;
pub mod token;
pub mod tokenizer;

pub use scanner::Scanner;
pub use token::{Token, TokenClass};
pub use tokenizer::Tokenizer;
