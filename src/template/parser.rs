//! Text template parser.
//!
//! Parses templates with syntax like:
//! - `{{ .name }}` - output a field of the data value
//! - `{{ . }}` - output the data value itself
//! - `{{ if .cond }} … {{ else }} … {{ end }}` - conditional block
//! - `{{ range .items }} … {{ end }}` - loop; `.` is the current element

use crate::error::{Error, ErrorKind, Result};

/// Pre-compiled expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// The current data value: `.`
    Dot,
    /// Field path from the current value: `.a.b`
    Path(Vec<String>),
    StringLit(String),
    IntLit(i64),
    /// `not <expr>`
    Not(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    Literal(String),
    Output(Expr),
    If {
        condition: Expr,
        body: Vec<TemplateNode>,
        else_body: Option<Vec<TemplateNode>>,
    },
    Range {
        iterable: Expr,
        body: Vec<TemplateNode>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(String),
    Action(String),
}

fn template_error(detail: impl ToString) -> Error {
    Error::new(ErrorKind::InvalidTemplate).context(detail)
}

pub fn parse_template(source: &str) -> Result<Vec<TemplateNode>> {
    let tokens = tokenize(source)?;
    let mut pos = 0;
    let (nodes, terminator) = parse_nodes(&tokens, &mut pos)?;
    match terminator {
        None => Ok(nodes),
        Some(t) => Err(template_error(format!("unexpected {{{{{}}}}}", t))),
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = source;
    while let Some(start) = rest.find("{{") {
        if start > 0 {
            tokens.push(Token::Literal(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| template_error("unclosed action"))?;
        tokens.push(Token::Action(after[..end].trim().to_string()));
        rest = &after[end + 2..];
    }
    if !rest.is_empty() {
        tokens.push(Token::Literal(rest.to_string()));
    }
    Ok(tokens)
}

/// Parse until end of input or a block terminator (`end` / `else`), which
/// is returned to the caller.
fn parse_nodes(tokens: &[Token], pos: &mut usize) -> Result<(Vec<TemplateNode>, Option<String>)> {
    let mut nodes = Vec::new();
    while *pos < tokens.len() {
        let token = &tokens[*pos];
        *pos += 1;
        match token {
            Token::Literal(text) => nodes.push(TemplateNode::Literal(text.clone())),
            Token::Action(action) => {
                if action == "end" || action == "else" {
                    return Ok((nodes, Some(action.clone())));
                }
                if let Some(cond) = action.strip_prefix("if ") {
                    let condition = compile_expr(cond)?;
                    let (body, terminator) = parse_nodes(tokens, pos)?;
                    let else_body = match terminator.as_deref() {
                        Some("else") => {
                            let (else_nodes, end) = parse_nodes(tokens, pos)?;
                            if end.as_deref() != Some("end") {
                                return Err(template_error("missing {{end}}"));
                            }
                            Some(else_nodes)
                        }
                        Some("end") => None,
                        _ => return Err(template_error("missing {{end}}")),
                    };
                    nodes.push(TemplateNode::If {
                        condition,
                        body,
                        else_body,
                    });
                } else if let Some(iter) = action.strip_prefix("range ") {
                    let iterable = compile_expr(iter)?;
                    let (body, terminator) = parse_nodes(tokens, pos)?;
                    if terminator.as_deref() != Some("end") {
                        return Err(template_error("missing {{end}}"));
                    }
                    nodes.push(TemplateNode::Range { iterable, body });
                } else {
                    nodes.push(TemplateNode::Output(compile_expr(action)?));
                }
            }
        }
    }
    Ok((nodes, None))
}

pub fn compile_expr(expr: &str) -> Result<Expr> {
    let expr = expr.trim();
    if expr == "." {
        return Ok(Expr::Dot);
    }
    if let Some(inner) = expr.strip_prefix("not ") {
        return Ok(Expr::Not(Box::new(compile_expr(inner)?)));
    }
    if let Some(path) = expr.strip_prefix('.') {
        let parts: Vec<String> = path.split('.').map(str::to_string).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(template_error(expr));
        }
        return Ok(Expr::Path(parts));
    }
    if expr.len() >= 2 && expr.starts_with('"') && expr.ends_with('"') {
        return Ok(Expr::StringLit(expr[1..expr.len() - 1].to_string()));
    }
    expr.parse::<i64>()
        .map(Expr::IntLit)
        .map_err(|_| template_error(expr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_literal_and_output() {
        assert_eq!(
            parse_template("Hi {{ .name }}!").unwrap(),
            vec![
                TemplateNode::Literal("Hi ".into()),
                TemplateNode::Output(Expr::Path(vec!["name".into()])),
                TemplateNode::Literal("!".into()),
            ]
        );
    }

    #[test]
    fn test_if_else() {
        let nodes = parse_template("{{if .ok}}yes{{else}}no{{end}}").unwrap();
        assert_eq!(
            nodes,
            vec![TemplateNode::If {
                condition: Expr::Path(vec!["ok".into()]),
                body: vec![TemplateNode::Literal("yes".into())],
                else_body: Some(vec![TemplateNode::Literal("no".into())]),
            }]
        );
    }

    #[test]
    fn test_unbalanced_blocks() {
        assert!(parse_template("{{range .x}}a").is_err());
        assert!(parse_template("a{{end}}").is_err());
        assert!(parse_template("{{ .x ").is_err());
    }
}
