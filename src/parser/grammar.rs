//! Parser implementation using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::error::SyntaxError;
use crate::parser::ast::*;
use crate::parser::lexer::{self, Token};

/// Parse template source into an AST
pub fn parse(input: &str) -> Result<Template, Vec<SyntaxError>> {
    parse_with(input, false)
}

/// Parse template source, optionally dropping the first newline after each block tag
pub fn parse_with(input: &str, trim_blocks: bool) -> Result<Template, Vec<SyntaxError>> {
    let len = input.len();
    let tokens = lexer::lex(input, trim_blocks)?;

    let token_iter = tokens.into_iter().map(|(tok, span)| (tok, span.into()));

    // Turn the token iterator into a stream that chumsky can use
    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    template_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| {
            errs.into_iter()
                .map(|e| SyntaxError::from_rich(e, input))
                .collect()
        })
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

fn binary(op: BinaryOp, lhs: Spanned<Expr>, rhs: Spanned<Expr>) -> Spanned<Expr> {
    let span = lhs.span.start..rhs.span.end;
    Spanned::new(Expr::Binary(op, Box::new(lhs), Box::new(rhs)), span)
}

/// Trailing operations on an atom, folded left to right
#[derive(Debug, Clone)]
enum Postfix {
    Attr(Spanned<Identifier>),
    Index(Spanned<Expr>),
    Filter(Spanned<Identifier>, Vec<Spanned<Expr>>),
}

/// `{%` followed by a statement keyword
fn tag<'a, I>(keyword: Token) -> impl Parser<'a, I, (), extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    just(Token::TagOpen).ignore_then(just(keyword)).ignored()
}

fn template_parser<'a, I>() -> impl Parser<'a, I, Template, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let identifier = select! {
        Token::Ident(s) => Identifier::new(s),
    }
    .map_with(|id, e| Spanned::new(id, span_range(&e.span())));

    // Expressions, loosest binding last: or < and < not < comparison < sum < unary < postfix
    let expr = recursive(|expr| {
        let literal = select! {
            Token::Int(n) => Literal::Int(n),
            Token::Str(s) => Literal::Str(s),
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
            Token::Null => Literal::Null,
        }
        .map_with(|lit, e| Spanned::new(Expr::Literal(lit), span_range(&e.span())));

        let arguments = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

        let call = identifier
            .clone()
            .then(arguments.clone())
            .map_with(|(name, args), e| Spanned::new(Expr::Call(name, args), span_range(&e.span())));

        let variable = identifier
            .clone()
            .map(|id| Spanned::new(Expr::Var(id.node), id.span));

        let list = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
            .map_with(|items, e| Spanned::new(Expr::List(items), span_range(&e.span())));

        let parenthesized = expr
            .clone()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

        // call must come before variable: both start with an identifier
        let atom = choice((literal, call, variable, list, parenthesized)).boxed();

        let postfix = choice((
            just(Token::Dot)
                .ignore_then(identifier.clone())
                .map(Postfix::Attr),
            expr.clone()
                .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
                .map(Postfix::Index),
            just(Token::Pipe)
                .ignore_then(identifier.clone())
                .then(arguments.or_not())
                .map(|(name, args)| Postfix::Filter(name, args.unwrap_or_default())),
        ))
        .map_with(|op, e| (op, span_range(&e.span()).end));

        let postfixed = atom
            .foldl(postfix.repeated(), |lhs, (op, end)| {
                let span = lhs.span.start..end;
                let node = match op {
                    Postfix::Attr(name) => Expr::Attr(Box::new(lhs), name),
                    Postfix::Index(index) => Expr::Index(Box::new(lhs), Box::new(index)),
                    Postfix::Filter(name, mut args) => {
                        args.insert(0, lhs);
                        Expr::Call(name, args)
                    }
                };
                Spanned::new(node, span)
            })
            .boxed();

        let unary = just(Token::Minus)
            .map_with(|_, e| span_range(&e.span()))
            .repeated()
            .foldr(postfixed, |op_span, rhs: Spanned<Expr>| {
                let span = op_span.start..rhs.span.end;
                Spanned::new(Expr::Unary(UnaryOp::Neg, Box::new(rhs)), span)
            })
            .boxed();

        let sum_op = choice((
            just(Token::Plus).to(BinaryOp::Add),
            just(Token::Minus).to(BinaryOp::Sub),
        ));
        let sum = unary
            .clone()
            .foldl(sum_op.then(unary).repeated(), |lhs, (op, rhs)| {
                binary(op, lhs, rhs)
            })
            .boxed();

        let compare_op = choice((
            just(Token::EqualEqual).to(BinaryOp::Eq),
            just(Token::NotEqual).to(BinaryOp::NotEq),
            just(Token::LessOrEqual).to(BinaryOp::LessOrEqual),
            just(Token::Less).to(BinaryOp::Less),
            just(Token::GreaterOrEqual).to(BinaryOp::GreaterOrEqual),
            just(Token::Greater).to(BinaryOp::Greater),
            just(Token::Not).then(just(Token::In)).to(BinaryOp::NotIn),
            just(Token::In).to(BinaryOp::In),
        ));
        let comparison = sum
            .clone()
            .foldl(compare_op.then(sum).repeated(), |lhs, (op, rhs)| {
                binary(op, lhs, rhs)
            })
            .boxed();

        let negation = just(Token::Not)
            .map_with(|_, e| span_range(&e.span()))
            .repeated()
            .foldr(comparison, |op_span, rhs: Spanned<Expr>| {
                let span = op_span.start..rhs.span.end;
                Spanned::new(Expr::Unary(UnaryOp::Not, Box::new(rhs)), span)
            })
            .boxed();

        let conjunction = negation
            .clone()
            .foldl(
                just(Token::And).to(BinaryOp::And).then(negation).repeated(),
                |lhs, (op, rhs)| binary(op, lhs, rhs),
            )
            .boxed();

        conjunction
            .clone()
            .foldl(
                just(Token::Or).to(BinaryOp::Or).then(conjunction).repeated(),
                |lhs, (op, rhs)| binary(op, lhs, rhs),
            )
            .boxed()
    });

    let node = recursive(|node| {
        let body = node.clone().repeated().collect::<Vec<_>>();
        let close = just(Token::TagClose);

        let text = select! {
            Token::Text(s) => Node::Text(s),
        };

        let output = expr
            .clone()
            .delimited_by(just(Token::ExprOpen), just(Token::ExprClose))
            .map(Node::Output);

        let else_branch = tag(Token::Else)
            .then(close.clone())
            .ignore_then(body.clone());

        let if_block = tag(Token::If)
            .ignore_then(expr.clone())
            .then_ignore(close.clone())
            .then(body.clone())
            .then(
                tag(Token::Elif)
                    .ignore_then(expr.clone())
                    .then_ignore(close.clone())
                    .then(body.clone())
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .then(else_branch.clone().or_not())
            .then_ignore(tag(Token::EndIf).then(close.clone()))
            .map(|(((condition, then_body), elifs), otherwise)| {
                let mut branches = vec![(condition, then_body)];
                branches.extend(elifs);
                Node::If(IfBlock {
                    branches,
                    otherwise,
                })
            });

        let for_block = tag(Token::For)
            .ignore_then(identifier.clone())
            .then_ignore(just(Token::In))
            .then(expr.clone())
            .then_ignore(close.clone())
            .then(body.clone())
            .then(else_branch.or_not())
            .then_ignore(tag(Token::EndFor).then(close.clone()))
            .map(|(((var, iterable), body), otherwise)| {
                Node::For(ForBlock {
                    var,
                    iterable,
                    body,
                    otherwise,
                })
            });

        let set = tag(Token::Set)
            .ignore_then(identifier.clone())
            .then_ignore(just(Token::Assign))
            .then(expr.clone())
            .then_ignore(close)
            .map(|(name, value)| Node::Set { name, value });

        choice((text, output, if_block, for_block, set))
            .map_with(|n, e| Spanned::new(n, span_range(&e.span())))
            .boxed()
    });

    // A template is a flat list of nodes
    node.repeated()
        .collect()
        .then_ignore(end())
        .map(|nodes| Template { nodes })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_output(input: &str) -> Expr {
        let template = parse(input).expect("Should parse");
        assert_eq!(template.nodes.len(), 1);
        match &template.nodes[0].node {
            Node::Output(expr) => expr.node.clone(),
            other => panic!("Expected output, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_text_only() {
        let template = parse("static int x;\n").expect("Should parse");
        assert_eq!(
            template.nodes[0].node,
            Node::Text("static int x;\n".to_string())
        );
    }

    #[test]
    fn test_parse_empty_template() {
        let template = parse("").expect("Should parse");
        assert!(template.nodes.is_empty());
    }

    #[test]
    fn test_parse_call() {
        match single_output("{{ len(architectures) }}") {
            Expr::Call(name, args) => {
                assert_eq!(name.node.as_str(), "len");
                assert_eq!(args.len(), 1);
                assert!(matches!(&args[0].node, Expr::Var(id) if id.as_str() == "architectures"));
            }
            other => panic!("Expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_attribute_chain() {
        match single_output("{{ machine_lookup[\"avx2\"].archs }}") {
            Expr::Attr(owner, name) => {
                assert_eq!(name.node.as_str(), "archs");
                assert!(matches!(owner.node, Expr::Index(_, _)));
            }
            other => panic!("Expected attribute, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_filter_desugars_to_call() {
        match single_output("{{ names | join(\", \") }}") {
            Expr::Call(name, args) => {
                assert_eq!(name.node.as_str(), "join");
                assert_eq!(args.len(), 2);
                assert!(matches!(&args[0].node, Expr::Var(id) if id.as_str() == "names"));
            }
            other => panic!("Expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_precedence() {
        // a or b and not c == d  =>  a or (b and (not (c == d)))
        match single_output("{{ a or b and not c == d }}") {
            Expr::Binary(BinaryOp::Or, _, rhs) => match &rhs.node {
                Expr::Binary(BinaryOp::And, _, rhs) => match &rhs.node {
                    Expr::Unary(UnaryOp::Not, inner) => {
                        assert!(matches!(inner.node, Expr::Binary(BinaryOp::Eq, _, _)));
                    }
                    other => panic!("Expected not, got {:?}", other),
                },
                other => panic!("Expected and, got {:?}", other),
            },
            other => panic!("Expected or, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_not_in() {
        assert!(matches!(
            single_output("{{ \"sse\" not in names }}"),
            Expr::Binary(BinaryOp::NotIn, _, _)
        ));
    }

    #[test]
    fn test_parse_negative_number() {
        assert!(matches!(
            single_output("{{ -1 }}"),
            Expr::Unary(UnaryOp::Neg, _)
        ));
    }

    #[test]
    fn test_parse_if_elif_else() {
        let template =
            parse("{% if a %}1{% elif b %}2{% elif c %}3{% else %}4{% endif %}").expect("Should parse");
        match &template.nodes[0].node {
            Node::If(block) => {
                assert_eq!(block.branches.len(), 3);
                assert!(block.otherwise.is_some());
            }
            other => panic!("Expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_for_with_else() {
        let template = parse("{% for k in kernels %}{{ k.name }}{% else %}none{% endfor %}")
            .expect("Should parse");
        match &template.nodes[0].node {
            Node::For(block) => {
                assert_eq!(block.var.node.as_str(), "k");
                assert_eq!(block.body.len(), 1);
                assert_eq!(
                    block.otherwise,
                    Some(vec![Spanned::new(Node::Text("none".to_string()), 44..48)])
                );
            }
            other => panic!("Expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_nested_blocks() {
        let input = r#"{% for m in machines %}{% for a in m.archs %}{% if a.alignment > 1 %}{{ a }}{% endif %}{% endfor %}{% endfor %}"#;
        let template = parse(input).expect("Should parse");
        assert_eq!(template.nodes.len(), 1);
    }

    #[test]
    fn test_parse_set() {
        let template = parse("{% set width = 4 %}").expect("Should parse");
        assert!(matches!(&template.nodes[0].node, Node::Set { name, .. } if name.node.as_str() == "width"));
    }

    #[test]
    fn test_unterminated_if_is_error() {
        let errors = parse("{% if x %}body").unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_unterminated_expression_is_error() {
        assert!(parse("{{ x ").is_err());
    }

    #[test]
    fn test_stray_endfor_is_error() {
        let errors = parse("a\n{% endfor %}").unwrap_err();
        assert_eq!(errors[0].location().line, 2);
    }

    #[test]
    fn test_mismatched_close_is_error() {
        assert!(parse("{{ x %}").is_err());
    }

    #[test]
    fn test_unknown_directive_is_error() {
        assert!(parse("{% include \"x\" %}").is_err());
    }
}
