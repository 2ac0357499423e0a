//! Log classes and the tracing subscriber.
//!
//! Each log class is a tracing target under `tern::`. `TERN_LOG` (or the
//! `--log` flag) lists the classes to enable at `debug`; everything else
//! logs at `warn`. `RUST_LOG`, when set, replaces the whole filter.

use std::env;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LOG_ENV, LOG_FILE_ENV};
use crate::error::Result;

/// Every log class a program or the CLI may enable.
pub const CLASSES: &[&str] = &[
    "app", "compiler", "bytecode", "trace", "symbols", "user", "config",
];

/// Build the filter directive for an enable list such as `trace,symbols`.
/// Unknown class names are ignored.
pub fn directives(enabled: &str) -> String {
    let mut directives = vec!["warn".to_string()];
    for class in enabled.split(',').map(|c| c.trim().to_lowercase()) {
        if class == "all" {
            directives.extend(CLASSES.iter().map(|c| format!("tern::{}=debug", c)));
        } else if CLASSES.contains(&class.as_str()) {
            // per-instruction events are emitted at trace level
            let level = if class == "trace" { "trace" } else { "debug" };
            directives.push(format!("tern::{}={}", class, level));
        }
    }
    directives.join(",")
}

/// Install the global subscriber. Arguments override the environment;
/// a second call is a no-op.
pub fn init(enabled: Option<&str>, file: Option<&Path>) -> Result<()> {
    let filter = match env::var("RUST_LOG") {
        Ok(rust_log) if enabled.is_none() => EnvFilter::new(rust_log),
        _ => {
            let list = enabled
                .map(str::to_string)
                .or_else(|| env::var(LOG_ENV).ok())
                .unwrap_or_default();
            EnvFilter::new(directives(&list))
        }
    };
    let file = file
        .map(Path::to_path_buf)
        .or_else(|| env::var_os(LOG_FILE_ENV).map(Into::into));

    let registry = tracing_subscriber::registry().with(filter);
    let _ = match file {
        Some(path) => {
            let log = OpenOptions::new().create(true).append(true).open(path)?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(log)),
                )
                .try_init()
        }
        None => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_enable_list_directives() {
        assert_eq!(directives(""), "warn");
        assert_eq!(
            directives("compiler, Trace,bogus"),
            "warn,tern::compiler=debug,tern::trace=trace"
        );
        assert!(directives("all").contains("tern::user=debug"));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(Some("app"), None).unwrap();
        init(Some("compiler"), None).unwrap();
    }
}
