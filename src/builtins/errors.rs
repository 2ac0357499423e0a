//! The `errors` package and the methods of error values.

use std::sync::Arc;

use crate::builtins::{define, string_arg, NativeContext, NativeFunction};
use crate::error::{Error, ErrorKind, Result};
use crate::symbols::SymbolTable;
use crate::value::{Kind, Value};

pub fn register_error_builtins(root: &Arc<SymbolTable>) {
    define(
        root,
        NativeFunction::new("errors.new", 1, Some(1), |_, args| {
            Ok(Value::error(Error::native(string_arg(args, 0))))
        }),
    );
}

fn receiver(ctx: &NativeContext<'_>) -> Result<Arc<Error>> {
    match ctx.this()? {
        Value::Error(e) => Ok(Arc::clone(e)),
        other => Err(Error::new(ErrorKind::InvalidType).context(other.type_name())),
    }
}

fn error_message(ctx: &mut NativeContext<'_>, _: &[Value]) -> Result<Value> {
    Ok(Value::String(receiver(ctx)?.message()))
}

fn error_unwrap(ctx: &mut NativeContext<'_>, _: &[Value]) -> Result<Value> {
    Ok(match &receiver(ctx)?.cause {
        Some(cause) => Value::error((**cause).clone()),
        None => Value::Nil,
    })
}

pub fn methods() -> Vec<(Kind, &'static str, NativeFunction)> {
    vec![
        (Kind::Error, "Error", NativeFunction::new("error.Error", 0, Some(0), error_message)),
        (Kind::Error, "error", NativeFunction::new("error.error", 0, Some(0), error_message)),
        (Kind::Error, "Unwrap", NativeFunction::new("error.Unwrap", 0, Some(0), error_unwrap)),
    ]
}

#[cfg(test)]
mod tests {
    use crate::runtime::Runtime;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_error_and_message() {
        let (runtime, output) = Runtime::with_capture();
        runtime
            .run("test", "e := errors.new(\"boom\")\nprint e.Error(), typeof(e)")
            .unwrap();
        assert_eq!(output.contents(), "boom error\n");
    }

    #[test]
    fn test_caught_error_is_a_value() {
        let (runtime, output) = Runtime::with_capture();
        runtime
            .run("test", "try {\n panic(\"bad\")\n} catch (e) {\n print e.Error()\n}")
            .unwrap();
        assert_eq!(output.contents(), "bad\n");
    }
}
