//! The `time` package. Instants are integer milliseconds since the epoch.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{Local, TimeZone, Utc};

use crate::builtins::{define, int_arg, string_arg, NativeFunction};
use crate::error::{Error, ErrorKind};
use crate::symbols::SymbolTable;
use crate::value::Value;

const DEFAULT_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

pub fn register_time_builtins(root: &Arc<SymbolTable>) {
    define(
        root,
        NativeFunction::new("time.now", 0, Some(0), |_, _| {
            Ok(Value::Int(Utc::now().timestamp_millis()))
        }),
    );
    define(
        root,
        NativeFunction::new("time.unix", 0, Some(0), |_, _| Ok(Value::Int(Utc::now().timestamp()))),
    );
    define(
        root,
        NativeFunction::new("time.sleep", 1, Some(1), |_, args| {
            let millis = int_arg("time.sleep", args, 0)?.max(0) as u64;
            thread::sleep(Duration::from_millis(millis));
            Ok(Value::Nil)
        }),
    );
    define(
        root,
        NativeFunction::new("time.since", 1, Some(1), |_, args| {
            let start = int_arg("time.since", args, 0)?;
            Ok(Value::Int(Utc::now().timestamp_millis() - start))
        }),
    );
    define(
        root,
        NativeFunction::new("time.format", 1, Some(2), |_, args| {
            let millis = int_arg("time.format", args, 0)?;
            let layout = match args.get(1) {
                Some(_) => string_arg(args, 1),
                None => DEFAULT_LAYOUT.to_string(),
            };
            let instant = Local
                .timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| Error::new(ErrorKind::ArgumentType).context(millis))?;
            Ok(Value::String(instant.format(&layout).to_string()))
        }),
    );
}
