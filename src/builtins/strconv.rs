//! The `strconv` package.

use std::sync::Arc;

use crate::builtins::{define, float_arg, int_arg, string_arg, NativeFunction};
use crate::error::{Error, ErrorKind};
use crate::symbols::SymbolTable;
use crate::value::Value;

pub fn register_strconv_builtins(root: &Arc<SymbolTable>) {
    define(
        root,
        NativeFunction::new("strconv.atoi", 1, Some(1), |_, args| {
            let text = string_arg(args, 0);
            text.trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| Error::new(ErrorKind::InvalidConversion).context(format!("{:?}", text)))
        })
        .error_return(),
    );
    define(
        root,
        NativeFunction::new("strconv.atof", 1, Some(1), |_, args| {
            let text = string_arg(args, 0);
            text.trim()
                .parse::<f64>()
                .map(Value::Float64)
                .map_err(|_| Error::new(ErrorKind::InvalidConversion).context(format!("{:?}", text)))
        })
        .error_return(),
    );
    define(
        root,
        NativeFunction::new("strconv.itoa", 1, Some(1), |_, args| {
            Ok(Value::String(int_arg("strconv.itoa", args, 0)?.to_string()))
        }),
    );
    define(
        root,
        NativeFunction::new("strconv.ftoa", 1, Some(2), |_, args| {
            let f = float_arg("strconv.ftoa", args, 0)?;
            Ok(Value::String(match args.get(1) {
                Some(_) => {
                    let places = int_arg("strconv.ftoa", args, 1)?.max(0) as usize;
                    format!("{:.*}", places, f)
                }
                None => f.to_string(),
            }))
        }),
    );
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::runtime::Runtime;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_conversions() {
        let (runtime, output) = Runtime::with_capture();
        let source = r#"
n, err := strconv.atoi(" 42 ")
print n + 1, err
f, _ := strconv.atof("x")
print f
print strconv.itoa(7) + "!", strconv.ftoa(3.14159, 2)
"#;
        runtime.run("test", source).unwrap();
        assert_eq!(output.contents(), "43 <nil>\n<nil>\n7! 3.14\n");
    }

    #[test]
    fn test_unused_error_is_raised() {
        let (runtime, _) = Runtime::with_capture();
        let err = runtime.run("test", "n := strconv.atoi(\"x\")").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnusedErrorReturn);
        assert!(err.message().contains("invalid conversion"));
    }
}
