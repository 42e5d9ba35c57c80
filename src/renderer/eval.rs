//! Tree-walking evaluator for parsed templates

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::Span;
use crate::parser::{BinaryOp, Expr, ForBlock, IfBlock, Literal, Node, Spanned, Template, UnaryOp};
use crate::renderer::builtins;
use crate::renderer::context::Context;
use crate::renderer::error::{EvalError, Reason};
use crate::renderer::value::Value;

/// Render `template` against `context`
///
/// `source` is the text the template was parsed from; it is only used to
/// resolve error locations.
pub fn render_template(
    template: &Template,
    source: &str,
    context: &Context<'_>,
) -> Result<String, EvalError> {
    let mut interpreter = Interpreter::new(source, context);
    let mut out = String::new();
    interpreter.render_nodes(&template.nodes, &mut out)?;
    Ok(out)
}

type Scope<'a> = BTreeMap<String, Value<'a>>;

struct Interpreter<'c, 'a> {
    source: &'c str,
    context: &'c Context<'a>,
    /// Innermost scope last; the first entry holds top-level `set`s
    scopes: Vec<Scope<'a>>,
}

impl<'c, 'a> Interpreter<'c, 'a> {
    fn new(source: &'c str, context: &'c Context<'a>) -> Self {
        Self {
            source,
            context,
            scopes: vec![Scope::new()],
        }
    }

    fn error(&self, span: &Span, reason: Reason) -> EvalError {
        EvalError::new(self.source, span.clone(), reason)
    }

    fn render_nodes(&mut self, nodes: &[Spanned<Node>], out: &mut String) -> Result<(), EvalError> {
        for node in nodes {
            match &node.node {
                Node::Text(text) => out.push_str(text),
                Node::Output(expr) => {
                    let value = self.eval(expr)?;
                    value
                        .write_text(out)
                        .map_err(|reason| self.error(&expr.span, reason))?;
                }
                Node::If(block) => self.render_if(block, out)?,
                Node::For(block) => self.render_for(block, out)?,
                Node::Set { name, value } => {
                    let value = self.eval(value)?;
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.insert(name.node.to_string(), value);
                    }
                }
            }
        }
        Ok(())
    }

    fn render_if(&mut self, block: &IfBlock, out: &mut String) -> Result<(), EvalError> {
        for (condition, body) in &block.branches {
            if self.eval(condition)?.is_truthy() {
                return self.render_nodes(body, out);
            }
        }
        match &block.otherwise {
            Some(body) => self.render_nodes(body, out),
            None => Ok(()),
        }
    }

    fn render_for(&mut self, block: &ForBlock, out: &mut String) -> Result<(), EvalError> {
        let items = self
            .eval(&block.iterable)?
            .iter_items()
            .map_err(|reason| self.error(&block.iterable.span, reason))?;

        if items.is_empty() {
            return match &block.otherwise {
                Some(body) => self.render_nodes(body, out),
                None => Ok(()),
            };
        }

        let length = items.len();
        for (index0, item) in items.into_iter().enumerate() {
            let mut scope = Scope::new();
            scope.insert(block.var.node.to_string(), item);
            scope.insert("loop".to_string(), loop_record(index0, length));
            self.scopes.push(scope);
            let result = self.render_nodes(&block.body, out);
            self.scopes.pop();
            result?;
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<Value<'a>> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.context.get(name))
            .cloned()
    }

    fn eval(&self, expr: &Spanned<Expr>) -> Result<Value<'a>, EvalError> {
        let catalog = self.context.catalog();
        let fail = |reason| self.error(&expr.span, reason);

        match &expr.node {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(n) => Value::Int(*n),
                Literal::Str(s) => Value::Str(Cow::Owned(s.clone())),
                Literal::Null => Value::Null,
            }),
            Expr::List(items) => Ok(Value::list(
                items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<_, _>>()?,
            )),
            Expr::Var(name) => self.lookup(name.as_str()).ok_or_else(|| {
                fail(Reason::UndefinedVariable {
                    name: name.to_string(),
                })
            }),
            Expr::Attr(object, name) => self
                .eval(object)?
                .attr(name.node.as_str(), catalog)
                .map_err(fail),
            Expr::Index(object, index) => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                object.index(&index).map_err(fail)
            }
            Expr::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                builtins::call(name.node.as_str(), args, catalog).map_err(fail)
            }
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::Neg => value
                        .as_int()
                        .and_then(|n| n.checked_neg().ok_or(Reason::Overflow))
                        .map(Value::Int)
                        .map_err(fail),
                }
            }
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                if lhs.is_truthy() {
                    self.eval(rhs)
                } else {
                    Ok(lhs)
                }
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                if lhs.is_truthy() {
                    Ok(lhs)
                } else {
                    self.eval(rhs)
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                binary(*op, lhs, rhs).map_err(fail)
            }
        }
    }
}

/// The `loop` record visible inside a `for` body
fn loop_record(index0: usize, length: usize) -> Value<'static> {
    let int = |n: usize| Value::Int(i64::try_from(n).unwrap_or(i64::MAX));
    let mut record = BTreeMap::new();
    record.insert("index".to_string(), int(index0 + 1));
    record.insert("index0".to_string(), int(index0));
    record.insert("first".to_string(), Value::Bool(index0 == 0));
    record.insert("last".to_string(), Value::Bool(index0 + 1 == length));
    record.insert("length".to_string(), int(length));
    Value::map(record)
}

fn binary<'a>(op: BinaryOp, lhs: Value<'a>, rhs: Value<'a>) -> Result<Value<'a>, Reason> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(lhs == rhs)),
        BinaryOp::NotEq => Ok(Value::Bool(lhs != rhs)),
        BinaryOp::In => lhs.is_in(&rhs).map(Value::Bool),
        BinaryOp::NotIn => lhs.is_in(&rhs).map(|found| Value::Bool(!found)),
        BinaryOp::Less => compare(&lhs, &rhs).map(|o| Value::Bool(o == Ordering::Less)),
        BinaryOp::LessOrEqual => compare(&lhs, &rhs).map(|o| Value::Bool(o != Ordering::Greater)),
        BinaryOp::Greater => compare(&lhs, &rhs).map(|o| Value::Bool(o == Ordering::Greater)),
        BinaryOp::GreaterOrEqual => compare(&lhs, &rhs).map(|o| Value::Bool(o != Ordering::Less)),
        BinaryOp::Add => add(lhs, rhs),
        BinaryOp::Sub => {
            let (a, b) = (lhs.as_int()?, rhs.as_int()?);
            a.checked_sub(b).map(Value::Int).ok_or(Reason::Overflow)
        }
        // short-circuiting operators never reach here
        BinaryOp::And | BinaryOp::Or => Ok(Value::Bool(lhs.is_truthy() && rhs.is_truthy())),
    }
}

fn compare(lhs: &Value<'_>, rhs: &Value<'_>) -> Result<Ordering, Reason> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::Int(_), other) => Err(Reason::type_mismatch("int", other)),
        (Value::Str(_), other) => Err(Reason::type_mismatch("string", other)),
        (other, _) => Err(Reason::type_mismatch("int or string", other)),
    }
}

fn add<'a>(lhs: Value<'a>, rhs: Value<'a>) -> Result<Value<'a>, Reason> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a.checked_add(b).map(Value::Int).ok_or(Reason::Overflow),
        (Value::Str(a), Value::Str(b)) => Ok(Value::from(format!("{}{}", a, b))),
        (Value::List(a), Value::List(b)) => {
            let mut items = a.as_ref().clone();
            items.extend(b.iter().cloned());
            Ok(Value::list(items))
        }
        (Value::Int(_), other) => Err(Reason::type_mismatch("int", &other)),
        (Value::Str(_), other) => Err(Reason::type_mismatch("string", &other)),
        (Value::List(_), other) => Err(Reason::type_mismatch("list", &other)),
        (other, _) => Err(Reason::type_mismatch("int, string or list", &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Arch, Catalog, Impl, Kernel, Machine};
    use crate::parser::parse;
    use crate::renderer::context::Params;
    use pretty_assertions::assert_eq;

    fn catalog() -> Catalog {
        Catalog::new(
            vec![
                Arch::new("generic"),
                Arch::new("sse2").with_alignment(16),
                Arch::new("avx2").with_alignment(32),
            ],
            vec![
                Machine::new("generic", ["generic"]),
                Machine::new("avx2", ["generic", "sse2", "avx2"]),
            ],
            vec![Kernel::new("add")
                .with_arg("float*", "out")
                .with_arg("unsigned int", "n")
                .with_impl(Impl::new("generic", ["generic"]))
                .with_impl(Impl::new("a_avx2", ["avx2"]))],
        )
    }

    fn run(source: &str) -> Result<String, EvalError> {
        let catalog = catalog();
        let context = Context::new(&catalog).with_params(&Params::new().with_args(["a", "b"]));
        let template = parse(source).expect("Should parse");
        render_template(&template, source, &context)
    }

    fn render(source: &str) -> String {
        run(source).expect("Should render")
    }

    #[test]
    fn test_plain_text_is_copied() {
        assert_eq!(render("int x = 1;\n"), "int x = 1;\n");
    }

    #[test]
    fn test_for_over_machines() {
        assert_eq!(
            render("{% for m in machines %}{{ m.name }},{% endfor %}"),
            "generic,avx2,"
        );
    }

    #[test]
    fn test_loop_record() {
        let out = render(
            "{% for a in architectures %}{{ loop.index }}/{{ loop.length }}{% if not loop.last %} {% endif %}{% endfor %}",
        );
        assert_eq!(out, "1/3 2/3 3/3");
    }

    #[test]
    fn test_for_else_on_empty() {
        assert_eq!(render("{% for x in [] %}{{ x }}{% else %}empty{% endfor %}"), "empty");
    }

    #[test]
    fn test_if_elif_else() {
        let source = "{% for a in architectures %}{% if a.alignment >= 32 %}wide{% elif a.alignment > 1 %}narrow{% else %}scalar{% endif %} {% endfor %}";
        assert_eq!(render(source), "scalar narrow wide ");
    }

    #[test]
    fn test_set_is_scoped_to_loop_body() {
        let source = "{% set n = 0 %}{% for a in architectures %}{% set n = loop.index %}{% endfor %}{{ n }}";
        assert_eq!(render(source), "0");
    }

    #[test]
    fn test_lookup_and_args() {
        assert_eq!(
            render("{{ machine_lookup[\"avx2\"].alignment }} {{ args[1] }}"),
            "32 b"
        );
    }

    #[test]
    fn test_impls_and_signature() {
        let source = "{% for k in kernels %}{% for i in impls(k, machine_lookup[\"generic\"]) %}void {{ i.function }}({{ k.arglist }});{% endfor %}{% endfor %}";
        assert_eq!(render(source), "void add_generic(float* out, unsigned int n);");
    }

    #[test]
    fn test_filters_and_operators() {
        assert_eq!(
            render("{{ machine_lookup[\"avx2\"].arch_names | join(\"|\") | upper }}"),
            "GENERIC|SSE2|AVX2"
        );
        assert_eq!(render("{{ 2 + 3 - 1 }} {{ \"a\" + \"b\" }}"), "4 ab");
        assert_eq!(render("{{ \"avx2\" in machine_lookup }}"), "true");
        assert_eq!(render("{{ \"neon\" not in machine_lookup }}"), "true");
    }

    #[test]
    fn test_or_returns_operand() {
        assert_eq!(render("{{ none or \"fallback\" }}"), "fallback");
        assert_eq!(render("{{ \"first\" or \"fallback\" }}"), "first");
    }

    #[test]
    fn test_undefined_variable() {
        let err = run("ok\n{{ machnies }}").unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"undefined variable `machnies` at line 2, column 4");
    }

    #[test]
    fn test_unknown_lookup_key() {
        let err = run("{{ architecture_lookup[\"avx9\"].name }}").unwrap_err();
        assert_eq!(err.reason, Reason::UndefinedKey { key: "avx9".to_string() });
        assert!(err.reason.is_undefined_reference());
    }

    #[test]
    fn test_printing_a_list_is_type_error() {
        let err = run("{{ machines }}").unwrap_err();
        assert!(!err.reason.is_undefined_reference());
    }
}
