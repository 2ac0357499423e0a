//! The `os` package.

use std::env;
use std::sync::Arc;

use crate::builtins::{define, int_arg, string_arg, NativeFunction};
use crate::error::Error;
use crate::symbols::SymbolTable;
use crate::value::{Kind, Type, Value};

pub fn register_os_builtins(root: &Arc<SymbolTable>) {
    define(
        root,
        NativeFunction::new("os.getenv", 1, Some(1), |_, args| {
            Ok(Value::String(env::var(string_arg(args, 0)).unwrap_or_default()))
        }),
    );
    define(
        root,
        NativeFunction::new("os.args", 0, Some(0), |ctx, _| {
            let args = ctx.runtime.args().iter().cloned().map(Value::String).collect();
            Ok(Value::typed_array(Type::of(Kind::String), args))
        }),
    );
    define(
        root,
        NativeFunction::new("os.exit", 0, Some(1), |ctx, args| {
            let code = match args.first() {
                Some(_) => int_arg("os.exit", args, 0)?,
                None => 0,
            };
            ctx.runtime.set_exit_code(code as i32);
            Err(Error::stop())
        }),
    );
}

#[cfg(test)]
mod tests {
    use crate::runtime::Runtime;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_exit_stops_the_program() {
        let (runtime, output) = Runtime::with_capture();
        runtime.run("test", "print 1\nos.exit(3)\nprint 2").unwrap();
        assert_eq!(output.contents(), "1\n");
        assert_eq!(runtime.exit_code(), 3);
    }

    #[test]
    fn test_missing_variable_is_empty() {
        let (runtime, output) = Runtime::with_capture();
        runtime
            .run("test", "print os.getenv(\"TERN_SURELY_UNSET_VARIABLE\") == \"\"")
            .unwrap();
        assert_eq!(output.contents(), "true\n");
    }
}
