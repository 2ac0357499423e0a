//! The `profile` package: the active configuration profile.

use std::sync::Arc;

use crate::builtins::{define, string_arg, NativeFunction};
use crate::symbols::SymbolTable;
use crate::value::{Kind, Type, Value};

pub fn register_profile_builtins(root: &Arc<SymbolTable>) {
    define(
        root,
        NativeFunction::new("profile.get", 1, Some(1), |ctx, args| {
            let key = string_arg(args, 0);
            Ok(ctx
                .runtime
                .profile()
                .get(&key)
                .map(Value::String)
                .unwrap_or_else(|| Value::string("")))
        }),
    );
    define(
        root,
        NativeFunction::new("profile.set", 2, Some(2), |ctx, args| {
            let mut store = ctx.runtime.profile();
            store.set(&string_arg(args, 0), &string_arg(args, 1));
            store.save()?;
            Ok(Value::Nil)
        }),
    );
    define(
        root,
        NativeFunction::new("profile.delete", 1, Some(1), |ctx, args| {
            let mut store = ctx.runtime.profile();
            let removed = store.delete(&string_arg(args, 0));
            store.save()?;
            Ok(Value::Bool(removed))
        }),
    );
    define(
        root,
        NativeFunction::new("profile.exists", 1, Some(1), |ctx, args| {
            Ok(Value::Bool(ctx.runtime.profile().exists(&string_arg(args, 0))))
        }),
    );
    define(
        root,
        NativeFunction::new("profile.keys", 0, Some(0), |ctx, _| {
            let keys = ctx.runtime.profile().keys().into_iter().map(Value::String).collect();
            Ok(Value::typed_array(Type::of(Kind::String), keys))
        }),
    );
}

#[cfg(test)]
mod tests {
    use crate::runtime::Runtime;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_profile_round_trip() {
        let (runtime, output) = Runtime::with_capture();
        let source = r#"
profile.set("color", "blue")
print profile.get("color"), profile.exists("color"), profile.exists("size")
print profile.keys()
profile.delete("color")
print profile.get("color") == ""
"#;
        runtime.run("test", source).unwrap();
        assert_eq!(output.contents(), "blue true false\n[\"color\"]\ntrue\n");
        assert_eq!(runtime.profile().get("color"), None);
    }
}
