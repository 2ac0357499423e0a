//! Text templates for the `Template` opcode and `strings.template`.
//!
//! Supports:
//! - `{{ .field }}` - output a field of the data value
//! - `{{ if .x }} … {{ else }} … {{ end }}` - control flow
//! - `{{ range .items }} … {{ end }}` - iteration

pub mod parser;
pub mod renderer;

use std::fmt;

use crate::error::Result;
use crate::value::Value;
use parser::{parse_template, TemplateNode};
use renderer::render_nodes;

/// A pre-parsed template, stored on the stack as an opaque value.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: String,
    nodes: Vec<TemplateNode>,
}

impl Template {
    pub fn compile(name: &str, source: &str) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            nodes: parse_template(source)?,
        })
    }

    pub fn render(&self, data: &Value) -> Result<String> {
        let mut out = String::new();
        render_nodes(&self.nodes, data, &mut out)?;
        Ok(out)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "template {}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_compile_and_render() {
        let t = Template::compile("greet", "hello, {{.}}").unwrap();
        assert_eq!(t.render(&Value::string("world")).unwrap(), "hello, world");
    }

    #[test]
    fn test_bad_template() {
        let err = Template::compile("bad", "{{if .x}}").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidTemplate);
    }
}
