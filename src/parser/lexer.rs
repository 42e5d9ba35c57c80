//! Lexer for the template language
//!
//! Templates alternate between literal text and tags. The scanner here walks
//! the text, and hands the inside of each `{{ }}` / `{% %}` tag to a logos
//! lexer. Comments (`{# #}`) are dropped before they reach the parser.

use logos::Logos;

use crate::error::SyntaxError;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    /// Literal text between tags (produced by the scanner, never by logos)
    Text(String),

    // Tag delimiters
    #[token("{{")]
    ExprOpen,
    #[token("}}")]
    ExprClose,
    #[token("-}}")]
    ExprCloseTrim,
    #[token("{%")]
    TagOpen,
    #[token("%}")]
    TagClose,
    #[token("-%}")]
    TagCloseTrim,

    // Statement keywords
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("endif")]
    EndIf,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("endfor")]
    EndFor,
    #[token("set")]
    Set,

    // Operator keywords
    #[token("not")]
    Not,
    #[token("and")]
    And,
    #[token("or")]
    Or,

    // Literal keywords
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("none")]
    Null,

    // Punctuation
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token("|")]
    Pipe,
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,

    // Comparison operators (longer first)
    #[token("==")]
    EqualEqual,
    #[token("!=")]
    NotEqual,
    #[token("<=")]
    LessOrEqual,
    #[token("<")]
    Less,
    #[token(">=")]
    GreaterOrEqual,
    #[token(">")]
    Greater,
    #[token("=")]
    Assign,

    // Arithmetic
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,

    // Literals - identifiers must come after keywords
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unescape(lex.slice()))]
    Str(String),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),
}

/// Strip the surrounding quotes and resolve backslash escapes
fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Delimiter {
    Expr,
    Tag,
    Comment,
}

/// Find the next tag opener in `rest`
fn find_open(rest: &str) -> Option<(usize, Delimiter)> {
    let bytes = rest.as_bytes();
    rest.match_indices('{')
        .find_map(|(i, _)| match bytes.get(i + 1) {
            Some(b'{') => Some((i, Delimiter::Expr)),
            Some(b'%') => Some((i, Delimiter::Tag)),
            Some(b'#') => Some((i, Delimiter::Comment)),
            _ => None,
        })
}

/// Lex a template into tokens with spans
///
/// Whitespace-control markers (`{{-`, `-%}` and friends) are applied here, so
/// the parser only ever sees plain `ExprClose` / `TagClose` tokens. With
/// `trim_blocks`, the first newline after a `%}` or `#}` is dropped.
pub fn lex(input: &str, trim_blocks: bool) -> Result<Vec<(Token, Span)>, Vec<SyntaxError>> {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut pos = 0;
    let mut strip_after = false;

    while pos < input.len() {
        let rest = &input[pos..];
        let open = find_open(rest);
        let strip_before = open.is_some_and(|(off, _)| rest[off + 2..].starts_with('-'));

        let mut text_start = pos;
        let mut text_end = open.map(|(off, _)| pos + off).unwrap_or(input.len());
        if strip_after {
            let slice = &input[text_start..text_end];
            text_start += slice.len() - slice.trim_start().len();
        }
        if strip_before {
            text_end = text_start + input[text_start..text_end].trim_end().len();
        }
        if text_start < text_end {
            tokens.push((
                Token::Text(input[text_start..text_end].to_string()),
                text_start..text_end,
            ));
        }
        strip_after = false;

        let Some((off, delimiter)) = open else {
            break;
        };
        let tag_start = pos + off;
        let body_start = tag_start + 2 + usize::from(strip_before);

        if delimiter == Delimiter::Comment {
            match input[body_start..].find("#}") {
                Some(close) => {
                    let body_end = body_start + close;
                    strip_after = input[body_start..body_end].ends_with('-');
                    pos = body_end + 2;
                    if trim_blocks && !strip_after {
                        pos += newline_len(&input[pos..]);
                    }
                }
                None => {
                    errors.push(SyntaxError::new(
                        input,
                        tag_start..input.len(),
                        "unterminated comment",
                    ));
                    pos = input.len();
                }
            }
            continue;
        }

        let opener = match delimiter {
            Delimiter::Expr => Token::ExprOpen,
            _ => Token::TagOpen,
        };
        tokens.push((opener, tag_start..body_start));

        let mut lexer = Token::lexer(&input[body_start..]);
        // An unclosed tag runs to the end of input; the parser reports it
        pos = input.len();
        while let Some(result) = lexer.next() {
            let local = lexer.span();
            let span = body_start + local.start..body_start + local.end;
            match result {
                Ok(Token::ExprClose) | Ok(Token::ExprCloseTrim) => {
                    strip_after = lexer.slice().starts_with('-');
                    tokens.push((Token::ExprClose, span.clone()));
                    pos = span.end;
                    break;
                }
                Ok(Token::TagClose) | Ok(Token::TagCloseTrim) => {
                    strip_after = lexer.slice().starts_with('-');
                    tokens.push((Token::TagClose, span.clone()));
                    pos = span.end;
                    if trim_blocks && !strip_after {
                        pos += newline_len(&input[pos..]);
                    }
                    break;
                }
                Ok(tok) => tokens.push((tok, span)),
                Err(()) => {
                    let found = &input[span.clone()];
                    errors.push(SyntaxError::new(
                        input,
                        span.clone(),
                        format!("unrecognized input {:?} inside tag", found),
                    ));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(errors)
    }
}

fn newline_len(rest: &str) -> usize {
    if rest.starts_with("\r\n") {
        2
    } else if rest.starts_with('\n') {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        lex(input, false)
            .expect("Should lex")
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(kinds("int x;"), vec![Token::Text("int x;".to_string())]);
    }

    #[test]
    fn test_expression_tag() {
        assert_eq!(
            kinds("a={{ m.name }};"),
            vec![
                Token::Text("a=".to_string()),
                Token::ExprOpen,
                Token::Ident("m".to_string()),
                Token::Dot,
                Token::Ident("name".to_string()),
                Token::ExprClose,
                Token::Text(";".to_string()),
            ]
        );
    }

    #[test]
    fn test_statement_keywords() {
        assert_eq!(
            kinds("{% for a in archs %}{% endfor %}"),
            vec![
                Token::TagOpen,
                Token::For,
                Token::Ident("a".to_string()),
                Token::In,
                Token::Ident("archs".to_string()),
                Token::TagClose,
                Token::TagOpen,
                Token::EndFor,
                Token::TagClose,
            ]
        );
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        assert_eq!(
            kinds("{{ format }}"),
            vec![
                Token::ExprOpen,
                Token::Ident("format".to_string()),
                Token::ExprClose
            ]
        );
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(
            kinds("{{ == != <= < >= > = }}")[1..8].to_vec(),
            vec![
                Token::EqualEqual,
                Token::NotEqual,
                Token::LessOrEqual,
                Token::Less,
                Token::GreaterOrEqual,
                Token::Greater,
                Token::Assign,
            ]
        );
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(
            kinds(r#"{{ "a\"b" 'c\nd' }}"#)[1..3].to_vec(),
            vec![
                Token::Str("a\"b".to_string()),
                Token::Str("c\nd".to_string())
            ]
        );
    }

    #[test]
    fn test_close_inside_string_does_not_end_tag() {
        let tokens = kinds(r#"{{ "}}" }}x"#);
        assert_eq!(
            tokens,
            vec![
                Token::ExprOpen,
                Token::Str("}}".to_string()),
                Token::ExprClose,
                Token::Text("x".to_string()),
            ]
        );
    }

    #[test]
    fn test_comment_is_dropped() {
        assert_eq!(
            kinds("a{# note #}b"),
            vec![Token::Text("a".to_string()), Token::Text("b".to_string())]
        );
    }

    #[test]
    fn test_whitespace_control() {
        assert_eq!(
            kinds("a  \n{%- if x -%}\n  b"),
            vec![
                Token::Text("a".to_string()),
                Token::TagOpen,
                Token::If,
                Token::Ident("x".to_string()),
                Token::TagClose,
                Token::Text("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_trim_blocks_drops_one_newline() {
        let tokens: Vec<_> = lex("{% set x = 1 %}\n\nz", true)
            .expect("Should lex")
            .into_iter()
            .map(|(t, _)| t)
            .collect();
        assert_eq!(tokens.last(), Some(&Token::Text("\nz".to_string())));
    }

    #[test]
    fn test_expression_close_keeps_newline_with_trim_blocks() {
        let tokens: Vec<_> = lex("{{ x }}\n", true)
            .expect("Should lex")
            .into_iter()
            .map(|(t, _)| t)
            .collect();
        assert_eq!(tokens.last(), Some(&Token::Text("\n".to_string())));
    }

    #[test]
    fn test_spans_are_absolute() {
        let tokens = lex("ab{{ x }}", false).expect("Should lex");
        assert_eq!(tokens[2], (Token::Ident("x".to_string()), 5..6));
    }

    #[test]
    fn test_unterminated_comment_is_error() {
        let errors = lex("a {# never closed", false).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("unterminated comment"));
    }

    #[test]
    fn test_unrecognized_character_is_error() {
        let errors = lex("{{ a $ b }}", false).unwrap_err();
        assert_eq!(errors[0].location().column, 6);
    }

    #[test]
    fn test_unclosed_tag_runs_to_end() {
        let tokens = kinds("{% if x");
        assert_eq!(
            tokens,
            vec![Token::TagOpen, Token::If, Token::Ident("x".to_string())]
        );
    }
}
