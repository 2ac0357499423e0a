//! Runtime settings and the persisted profile store.

pub mod profile;

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, ErrorKind};

pub use profile::{ProfileStore, DEFAULT_PROFILE};

/// Application name used for the store directory and file.
pub const APP_NAME: &str = "tern";

pub const TYPES_KEY: &str = "tern.compiler.types";
pub const NORMALIZE_KEY: &str = "tern.compiler.normalize";
pub const TRACE_KEY: &str = "tern.runtime.trace";

pub const LOG_ENV: &str = "TERN_LOG";
pub const LOG_FILE_ENV: &str = "TERN_LOG_FILE";
pub const OUTPUT_FORMAT_ENV: &str = "TERN_OUTPUT_FORMAT";
pub const PROFILE_ENV: &str = "TERN_PROFILE";

/// How diadic operators treat operands of different types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Operand types must match.
    Strict,
    /// Operands are promoted to the wider type.
    #[default]
    Relaxed,
    /// Promotion is attempted; failures fall back to string forms.
    Dynamic,
}

impl Strictness {
    /// Numeric form used as the `StaticTyping` operand.
    pub fn level(self) -> i64 {
        match self {
            Strictness::Strict => 0,
            Strictness::Relaxed => 1,
            Strictness::Dynamic => 2,
        }
    }

    pub fn from_level(level: i64) -> Self {
        match level {
            0 => Strictness::Strict,
            1 => Strictness::Relaxed,
            _ => Strictness::Dynamic,
        }
    }
}

impl FromStr for Strictness {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Strictness::Strict),
            "relaxed" => Ok(Strictness::Relaxed),
            "dynamic" | "none" => Ok(Strictness::Dynamic),
            other => Err(Error::new(ErrorKind::InvalidDirective).context(other)),
        }
    }
}

impl fmt::Display for Strictness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strictness::Strict => "strict",
            Strictness::Relaxed => "relaxed",
            Strictness::Dynamic => "dynamic",
        })
    }
}

/// Output format for diagnostics from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(Error::new(ErrorKind::InvalidDirective).context(other)),
        }
    }
}

/// Settings the compiler and VM consult.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub strictness: Strictness,
    /// Lowercase identifiers while compiling.
    pub normalize: bool,
    /// Emit a per-instruction trace on `tern::trace`.
    pub trace: bool,
    /// Extra directories searched by `import`.
    pub import_path: Vec<PathBuf>,
    pub output_format: OutputFormat,
}

fn is_true(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "yes" | "1" | "on")
}

impl Settings {
    /// Read the settings keys from the active profile. Unparseable values
    /// keep their defaults.
    pub fn from_profile(store: &ProfileStore) -> Self {
        let mut settings = Settings::default();
        if let Some(types) = store.get(TYPES_KEY) {
            settings.strictness = types.parse().unwrap_or_default();
        }
        settings.normalize = store.get(NORMALIZE_KEY).is_some_and(|v| is_true(&v));
        settings.trace = store.get(TRACE_KEY).is_some_and(|v| is_true(&v));
        settings
    }

    /// Apply environment overrides.
    pub fn with_env(mut self) -> Self {
        if let Some(format) = env::var(OUTPUT_FORMAT_ENV).ok().and_then(|v| v.parse().ok()) {
            self.output_format = format;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strictness_parsing() {
        assert_eq!("Strict".parse::<Strictness>().unwrap(), Strictness::Strict);
        assert_eq!("none".parse::<Strictness>().unwrap(), Strictness::Dynamic);
        assert!("loose".parse::<Strictness>().is_err());
        for s in [Strictness::Strict, Strictness::Relaxed, Strictness::Dynamic] {
            assert_eq!(Strictness::from_level(s.level()), s);
        }
    }

    #[test]
    fn test_settings_from_profile() {
        let mut store = ProfileStore::in_memory();
        store.set(TYPES_KEY, "strict");
        store.set(NORMALIZE_KEY, "true");
        let settings = Settings::from_profile(&store);
        assert_eq!(settings.strictness, Strictness::Strict);
        assert!(settings.normalize);
        assert!(!settings.trace);
    }
}
