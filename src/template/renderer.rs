//! Template renderer that walks parsed nodes against a data value.

use crate::error::{Error, ErrorKind, Result};
use crate::template::parser::{Expr, TemplateNode};
use crate::value::{read, Value};

pub fn render_nodes(nodes: &[TemplateNode], data: &Value, out: &mut String) -> Result<()> {
    for node in nodes {
        match node {
            TemplateNode::Literal(text) => out.push_str(text),
            TemplateNode::Output(expr) => {
                let value = evaluate(expr, data)?;
                if !value.is_nil() {
                    out.push_str(&value.to_string());
                }
            }
            TemplateNode::If {
                condition,
                body,
                else_body,
            } => {
                if evaluate(condition, data)?.is_truthy() {
                    render_nodes(body, data, out)?;
                } else if let Some(else_body) = else_body {
                    render_nodes(else_body, data, out)?;
                }
            }
            TemplateNode::Range { iterable, body } => {
                for item in elements(&evaluate(iterable, data)?)? {
                    render_nodes(body, &item, out)?;
                }
            }
        }
    }
    Ok(())
}

fn elements(value: &Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(a) => Ok(read(a).items.clone()),
        Value::Map(m) => {
            let m = read(m);
            Ok(m.keys()
                .iter()
                .map(|k| m.get(k).unwrap_or(Value::Nil))
                .collect())
        }
        Value::Struct(s) => {
            let s = read(s);
            Ok(s.keys()
                .iter()
                .filter_map(|k| s.fields.get(k).cloned())
                .collect())
        }
        Value::Nil => Ok(Vec::new()),
        other => Err(Error::new(ErrorKind::InvalidTemplate)
            .context(format!("cannot range over {}", other.type_name()))),
    }
}

pub fn evaluate(expr: &Expr, data: &Value) -> Result<Value> {
    match expr {
        Expr::Dot => Ok(data.clone()),
        Expr::StringLit(s) => Ok(Value::string(s.clone())),
        Expr::IntLit(n) => Ok(Value::Int(*n)),
        Expr::Not(inner) => Ok(Value::Bool(!evaluate(inner, data)?.is_truthy())),
        Expr::Path(parts) => {
            let mut current = data.clone();
            for part in parts {
                current = field(&current, part)?;
            }
            Ok(current)
        }
    }
}

fn field(value: &Value, name: &str) -> Result<Value> {
    let missing = || Error::new(ErrorKind::InvalidField).context(name);
    match value {
        Value::Struct(s) => read(s).get_inherited(name).ok_or_else(missing),
        Value::Map(m) => read(m).get(&Value::string(name)),
        Value::Array(a) => {
            let index: usize = name.parse().map_err(|_| missing())?;
            read(a).items.get(index).cloned().ok_or_else(missing)
        }
        Value::Nil => Ok(Value::Nil),
        _ => Err(missing()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parser::parse_template;
    use crate::value::StructValue;

    fn render(source: &str, data: &Value) -> String {
        let nodes = parse_template(source).unwrap();
        let mut out = String::new();
        render_nodes(&nodes, data, &mut out).unwrap();
        out
    }

    #[test]
    fn test_fields_and_range() {
        let mut s = StructValue::new();
        s.fields.insert("name".into(), Value::string("tern"));
        s.fields.insert(
            "items".into(),
            Value::array(vec![Value::Int(1), Value::Int(2)]),
        );
        let data = Value::from_struct(s);
        assert_eq!(
            render("{{.name}}:{{range .items}} {{.}}{{end}}", &data),
            "tern: 1 2"
        );
    }

    #[test]
    fn test_conditional() {
        let data = Value::array(vec![]);
        assert_eq!(render("{{if .}}full{{else}}empty{{end}}", &Value::Bool(false)), "empty");
        assert_eq!(render("{{if not .}}none{{end}}", &data), "");
    }
}
