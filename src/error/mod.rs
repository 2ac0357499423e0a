//! Error types shared by the tokenizer, compiler and VM.
//!
//! Every failure in the runtime is an [`Error`]: a kind from the taxonomy
//! below plus whatever position information the raising phase had at hand.
//! The kind decides the message text; the carrier adds module, line, column,
//! a short token context and an optional wrapped cause.

use std::fmt;
use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

/// The taxonomy of failures. `Display` is the short message.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ErrorKind {
    // Tokenizer
    #[error("unterminated string")]
    UnterminatedString,
    #[error("invalid escape sequence")]
    InvalidEscape,
    #[error("invalid number")]
    InvalidNumber,
    #[error("unexpected character")]
    UnexpectedCharacter,

    // Compiler
    #[error("unexpected token")]
    UnexpectedToken,
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("missing '{0}'")]
    Missing(&'static str),
    #[error("invalid symbol name")]
    InvalidSymbolName,
    #[error("reserved word")]
    ReservedWord,
    #[error("duplicate declaration")]
    DuplicateDeclaration,
    #[error("invalid constant expression")]
    InvalidConstant,
    #[error("missing catch")]
    MissingCatch,
    #[error("missing function body")]
    MissingFunctionBody,
    #[error("invalid return")]
    InvalidReturn,
    #[error("invalid type specification")]
    InvalidTypeSpec,
    #[error("invalid assignment target")]
    InvalidAssignment,
    #[error("break or continue outside loop")]
    InvalidLoopControl,
    #[error("invalid directive")]
    InvalidDirective,
    #[error("package not found")]
    PackageNotFound,
    #[error("invalid import")]
    InvalidImport,

    // Runtime
    #[error("stack underflow")]
    StackUnderflow,
    #[error("invalid bytecode address")]
    InvalidAddress,
    #[error("unimplemented instruction")]
    UnimplementedInstruction,
    #[error("unknown identifier")]
    UnknownIdentifier,
    #[error("symbol already exists")]
    SymbolExists,
    #[error("readonly symbol")]
    ReadOnly,
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid type for operation")]
    InvalidType,
    #[error("type mismatch")]
    TypeMismatch,
    #[error("invalid function call")]
    InvalidFunctionCall,
    #[error("incorrect function argument count")]
    ArgumentCount,
    #[error("incorrect function argument type")]
    ArgumentType,
    #[error("invalid array index")]
    InvalidIndex,
    #[error("invalid slice")]
    InvalidSlice,
    #[error("invalid field name")]
    InvalidField,
    #[error("invalid try/catch state")]
    InvalidTryState,
    #[error("function returned void")]
    VoidReturn,
    #[error("unused error return")]
    UnusedErrorReturn,
    #[error("multiple-value result in single-value context")]
    MultipleResults,
    #[error("invalid conversion")]
    InvalidConversion,
    #[error("invalid stack marker")]
    InvalidMarker,
    #[error("channel closed")]
    ChannelClosed,
    #[error("invalid template")]
    InvalidTemplate,
    #[error("sealed bytecode")]
    Sealed,
    #[error("{0}")]
    Native(String),

    // User
    #[error("panic")]
    Panic,

    // Control
    #[error("stop")]
    Stop,
    #[error("debugger signal")]
    SignalDebugger,

    // Host
    #[error("i/o error")]
    Io,
    #[error("json error")]
    Json,
}

impl ErrorKind {
    /// Control kinds are never intercepted by `try`.
    pub fn is_control(&self) -> bool {
        matches!(self, ErrorKind::Stop | ErrorKind::SignalDebugger)
    }

    /// The phase name used as the first field of a diagnostic.
    pub fn class(&self) -> &'static str {
        use ErrorKind::*;
        match self {
            UnterminatedString | InvalidEscape | InvalidNumber | UnexpectedCharacter => {
                "tokenizer error"
            }
            UnexpectedToken | UnexpectedEnd | Missing(_) | InvalidSymbolName | ReservedWord
            | DuplicateDeclaration | InvalidConstant | MissingCatch | MissingFunctionBody
            | InvalidReturn | InvalidTypeSpec | InvalidAssignment | InvalidLoopControl
            | InvalidDirective | PackageNotFound | InvalidImport => "compile error",
            Panic => "panic",
            Stop | SignalDebugger => "control",
            Io | Json => "host error",
            _ => "runtime error",
        }
    }
}

/// A structured error with position information.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub struct Error {
    pub kind: ErrorKind,
    pub module: Option<String>,
    pub line: usize,
    pub column: usize,
    pub context: Option<String>,
    #[source]
    pub cause: Option<Box<Error>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            module: None,
            line: 0,
            column: 0,
            context: None,
            cause: None,
        }
    }

    pub fn native(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Native(message.into()))
    }

    pub fn panic(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::new(ErrorKind::Panic).context(message)
    }

    pub fn stop() -> Self {
        Self::new(ErrorKind::Stop)
    }

    /// Attach a source position. A zero line leaves the position untouched.
    pub fn at(mut self, line: usize, column: usize) -> Self {
        if line > 0 {
            self.line = line;
            self.column = column;
        }
        self
    }

    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn context(mut self, context: impl ToString) -> Self {
        self.context = Some(context.to_string());
        self
    }

    pub fn caused_by(mut self, cause: Error) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn is(&self, kind: &ErrorKind) -> bool {
        &self.kind == kind
    }

    pub fn is_control(&self) -> bool {
        self.kind.is_control()
    }

    pub fn has_position(&self) -> bool {
        self.line > 0
    }

    /// Fill in position fields that are still empty.
    pub fn locate(mut self, module: &str, line: usize) -> Self {
        if self.module.is_none() {
            self.module = Some(module.to_string());
        }
        if self.line == 0 {
            self.line = line;
        }
        self
    }

    /// The message without position information. This is what `_error` shows.
    pub fn message(&self) -> String {
        let mut text = match (&self.kind, &self.context) {
            (ErrorKind::Panic, Some(context)) => context.clone(),
            (kind, Some(context)) => format!("{}: {}", kind, context),
            (kind, None) => kind.to_string(),
        };
        if let Some(cause) = &self.cause {
            text.push_str(", ");
            text.push_str(&cause.message());
        }
        text
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.class())?;
        if let Some(module) = &self.module {
            write!(f, ", in {}", module)?;
        }
        if self.line > 0 {
            write!(f, ", at line {}", self.line)?;
            if self.column > 0 {
                write!(f, ", column {}", self.column)?;
            }
        }
        write!(f, ", {}", self.message())
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::Io).context(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorKind::Json).context(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_diagnostic() {
        let err = Error::new(ErrorKind::UnexpectedToken)
            .in_module("main")
            .at(3, 7)
            .context("}");
        assert_eq!(
            err.to_string(),
            "compile error, in main, at line 3, column 7, unexpected token: }"
        );
    }

    #[test]
    fn test_message_without_position() {
        let err = Error::new(ErrorKind::DivisionByZero);
        assert_eq!(err.message(), "division by zero");
        assert_eq!(err.to_string(), "runtime error, division by zero");
    }

    #[test]
    fn test_panic_message_is_context() {
        let err = Error::panic("boom").at(2, 0);
        assert_eq!(err.message(), "boom");
        assert_eq!(err.to_string(), "panic, at line 2, boom");
    }

    #[test]
    fn test_cause_is_appended() {
        let err = Error::new(ErrorKind::UnusedErrorReturn)
            .caused_by(Error::native("file not found"));
        assert_eq!(err.message(), "unused error return, file not found");
    }

    #[test]
    fn test_control_kinds() {
        assert!(Error::stop().is_control());
        assert!(Error::new(ErrorKind::SignalDebugger).is_control());
        assert!(!Error::panic("x").is_control());
    }

    #[test]
    fn test_locate_keeps_existing_position() {
        let err = Error::new(ErrorKind::InvalidIndex).at(4, 2).locate("pkg", 9);
        assert_eq!(err.line, 4);
        assert_eq!(err.module.as_deref(), Some("pkg"));
    }
}
