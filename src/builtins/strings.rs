//! The `strings` package.

use std::sync::Arc;

use regex::Regex;

use crate::builtins::{define, int_arg, string_arg, NativeContext, NativeFunction};
use crate::error::{Error, ErrorKind, Result};
use crate::symbols::SymbolTable;
use crate::template::Template;
use crate::value::{read, Kind, Type, Value};

pub fn register_string_builtins(root: &Arc<SymbolTable>) {
    define(
        root,
        NativeFunction::new("strings.upper", 1, Some(1), |_, args| {
            Ok(Value::String(string_arg(args, 0).to_uppercase()))
        }),
    );
    define(
        root,
        NativeFunction::new("strings.lower", 1, Some(1), |_, args| {
            Ok(Value::String(string_arg(args, 0).to_lowercase()))
        }),
    );
    define(
        root,
        NativeFunction::new("strings.trim", 1, Some(2), |_, args| {
            let s = string_arg(args, 0);
            Ok(Value::String(match args.get(1) {
                Some(cutset) => {
                    let cutset = cutset.to_string();
                    s.trim_matches(|c| cutset.contains(c)).to_string()
                }
                None => s.trim().to_string(),
            }))
        }),
    );
    define(root, NativeFunction::new("strings.left", 2, Some(2), builtin_left));
    define(root, NativeFunction::new("strings.right", 2, Some(2), builtin_right));
    define(root, NativeFunction::new("strings.substring", 2, Some(3), builtin_substring));
    define(
        root,
        NativeFunction::new("strings.index", 2, Some(2), |_, args| {
            let s = string_arg(args, 0);
            let needle = string_arg(args, 1);
            Ok(Value::Int(
                s.find(&needle)
                    .map(|byte| s[..byte].chars().count() as i64 + 1)
                    .unwrap_or(0),
            ))
        }),
    );
    define(
        root,
        NativeFunction::new("strings.contains", 2, Some(2), |_, args| {
            Ok(Value::Bool(string_arg(args, 0).contains(&string_arg(args, 1))))
        }),
    );
    define(
        root,
        NativeFunction::new("strings.split", 1, Some(2), |_, args| {
            let s = string_arg(args, 0);
            let sep = args.get(1).map(|v| v.to_string()).unwrap_or_else(|| "\n".to_string());
            let parts = if sep.is_empty() {
                s.chars().map(|c| Value::String(c.to_string())).collect()
            } else {
                s.split(sep.as_str()).map(Value::string).collect()
            };
            Ok(Value::typed_array(Type::of(Kind::String), parts))
        }),
    );
    define(
        root,
        NativeFunction::new("strings.join", 1, Some(2), |_, args| {
            let Value::Array(a) = &args[0] else {
                return Err(Error::new(ErrorKind::ArgumentType).context(args[0].type_name()));
            };
            let sep = string_arg(args, 1);
            let parts: Vec<String> = read(a).items.iter().map(ToString::to_string).collect();
            Ok(Value::String(parts.join(&sep)))
        }),
    );
    define(
        root,
        NativeFunction::new("strings.format", 1, None, |_, args| {
            Ok(Value::String(format_values(&string_arg(args, 0), &args[1..])))
        }),
    );
    define(
        root,
        NativeFunction::new("strings.length", 1, Some(1), |_, args| {
            Ok(Value::Int(string_arg(args, 0).chars().count() as i64))
        }),
    );
    define(root, NativeFunction::new("strings.template", 1, Some(2), builtin_template));
    define(
        root,
        NativeFunction::new("strings.matches", 2, Some(2), |_, args| {
            let pattern = Regex::new(&string_arg(args, 1))
                .map_err(|e| Error::new(ErrorKind::ArgumentType).context(e))?;
            Ok(Value::Bool(pattern.is_match(&string_arg(args, 0))))
        }),
    );
}

fn char_count(s: &str) -> i64 {
    s.chars().count() as i64
}

fn builtin_left(_: &mut NativeContext<'_>, args: &[Value]) -> Result<Value> {
    let s = string_arg(args, 0);
    let n = int_arg("strings.left", args, 1)?.clamp(0, char_count(&s));
    Ok(Value::String(s.chars().take(n as usize).collect()))
}

fn builtin_right(_: &mut NativeContext<'_>, args: &[Value]) -> Result<Value> {
    let s = string_arg(args, 0);
    let len = char_count(&s);
    let n = int_arg("strings.right", args, 1)?.clamp(0, len);
    Ok(Value::String(s.chars().skip((len - n) as usize).collect()))
}

/// `substring(s, start, count)` with a 1-based start position.
fn builtin_substring(_: &mut NativeContext<'_>, args: &[Value]) -> Result<Value> {
    let s = string_arg(args, 0);
    let start = (int_arg("strings.substring", args, 1)? - 1).max(0) as usize;
    let count = match args.get(2) {
        Some(_) => int_arg("strings.substring", args, 2)?.max(0) as usize,
        None => usize::MAX,
    };
    Ok(Value::String(s.chars().skip(start).take(count).collect()))
}

/// Render a template value (or template source text) against a data value.
fn builtin_template(_: &mut NativeContext<'_>, args: &[Value]) -> Result<Value> {
    let data = args.get(1).cloned().unwrap_or(Value::Nil);
    let text = match &args[0] {
        Value::Template(t) => t.render(&data)?,
        Value::String(source) => Template::compile("inline", source)?.render(&data)?,
        other => return Err(Error::new(ErrorKind::ArgumentType).context(other.type_name())),
    };
    Ok(Value::String(text))
}

/// Go-style formatting: `%v %s %d %f %.Nf %q %t %x %T %%`.
pub fn format_values(format: &str, args: &[Value]) -> String {
    let mut out = String::new();
    let mut args = args.iter();
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut precision = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut digits = String::new();
            while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                digits.push(*d);
                chars.next();
            }
            precision = digits.parse::<usize>().ok();
        }
        let Some(verb) = chars.next() else {
            out.push('%');
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        let Some(arg) = args.next() else {
            out.push_str(&format!("%!{}(MISSING)", verb));
            continue;
        };
        let text = match verb {
            'd' => arg.as_int().map(|n| n.to_string()).unwrap_or_else(|| arg.to_string()),
            'f' => {
                let f = arg.as_float().unwrap_or(0.0);
                format!("{:.*}", precision.unwrap_or(6), f)
            }
            'q' => format!("{:?}", arg.to_string()),
            'x' => match arg {
                Value::String(s) => s.bytes().map(|b| format!("{:02x}", b)).collect(),
                other => other.as_int().map(|n| format!("{:x}", n)).unwrap_or_default(),
            },
            'T' => arg.type_name(),
            _ => arg.to_string(),
        };
        out.push_str(&text);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: &[Value]) -> Value {
        let (runtime, _) = Runtime::with_capture();
        let Some(Value::Struct(package)) = runtime.root().get("strings") else {
            panic!("strings package missing");
        };
        let Some(Value::Native(native)) = read(&package).fields.get(name).cloned() else {
            panic!("missing strings.{}", name);
        };
        let mut ctx = NativeContext {
            runtime: &runtime,
            symbols: runtime.root(),
            this: None,
            multiple: false,
        };
        (native.func)(&mut ctx, args).unwrap()
    }

    #[test]
    fn test_case_and_trim() {
        assert_eq!(call("upper", &["abc".into()]), Value::string("ABC"));
        assert_eq!(call("trim", &["  x ".into()]), Value::string("x"));
        assert_eq!(call("trim", &["--x--".into(), "-".into()]), Value::string("x"));
    }

    #[test]
    fn test_positions_are_one_based() {
        assert_eq!(call("index", &["hello".into(), "l".into()]), Value::Int(3));
        assert_eq!(call("index", &["hello".into(), "z".into()]), Value::Int(0));
        assert_eq!(
            call("substring", &["hello".into(), Value::Int(2), Value::Int(3)]),
            Value::string("ell")
        );
        assert_eq!(call("left", &["hello".into(), Value::Int(2)]), Value::string("he"));
        assert_eq!(call("right", &["hello".into(), Value::Int(10)]), Value::string("hello"));
    }

    #[test]
    fn test_split_and_join() {
        let parts = call("split", &["a,b,c".into(), ",".into()]);
        assert_eq!(parts.to_string(), "[\"a\", \"b\", \"c\"]");
        assert_eq!(call("join", &[parts, "-".into()]), Value::string("a-b-c"));
    }

    #[test]
    fn test_format_verbs() {
        assert_eq!(
            format_values("%s=%d (%.2f) %q %%", &["x".into(), Value::Int(3), Value::Float64(1.5), "y".into()]),
            "x=3 (1.50) \"y\" %"
        );
        assert_eq!(format_values("%v", &[]), "%!v(MISSING)");
    }

    #[test]
    fn test_matches() {
        assert_eq!(call("matches", &["abc123".into(), "^[a-z]+\\d+$".into()]), Value::Bool(true));
    }
}
