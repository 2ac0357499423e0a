//! The `util` package: runtime introspection.

use std::sync::Arc;

use crate::builtins::{define, string_arg, NativeFunction};
use crate::symbols::SymbolTable;
use crate::value::{Kind, Type, Value};

pub fn register_util_builtins(root: &Arc<SymbolTable>) {
    define(
        root,
        NativeFunction::new("util.eval", 1, Some(1), |ctx, args| {
            let source = string_arg(args, 0);
            ctx.runtime.eval(&source, &ctx.symbols)
        })
        .error_return()
        .full_scope(),
    );
    define(
        root,
        NativeFunction::new("util.symbols", 0, Some(0), |ctx, _| {
            let mut names = Vec::new();
            let mut table = Some(Arc::clone(&ctx.symbols));
            while let Some(current) = table.filter(|t| !t.is_root()) {
                for name in current.names() {
                    if !name.starts_with('$') && !names.contains(&name) {
                        names.push(name);
                    }
                }
                table = current.parent().cloned();
            }
            names.sort();
            let names = names.into_iter().map(Value::String).collect();
            Ok(Value::typed_array(Type::of(Kind::String), names))
        })
        .full_scope(),
    );
}

#[cfg(test)]
mod tests {
    use crate::runtime::Runtime;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_eval_sees_caller_locals() {
        let (runtime, output) = Runtime::with_capture();
        let source = r#"
x := 20
v, err := util.eval("x * 2 + 2")
print v, err
_, err = util.eval("1 +")
print err != nil
"#;
        runtime.run("test", source).unwrap();
        assert_eq!(output.contents(), "42 <nil>\ntrue\n");
    }

    #[test]
    fn test_symbols_lists_locals() {
        let (runtime, output) = Runtime::with_capture();
        runtime
            .run("test", "func f(a int) {\n b := a\n print util.symbols()\n}\nf(1)")
            .unwrap();
        assert_eq!(output.contents(), "[\"_args\", \"a\", \"b\", \"f\"]\n");
    }
}
