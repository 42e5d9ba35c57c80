//! Error types for template parsing and evaluation

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

use crate::parser::lexer::Token;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// 1-based line and column of a byte offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    /// Locate a byte offset within `source`
    ///
    /// Offsets past the end clamp to the end of the source.
    pub fn locate(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = source.get(..offset).unwrap_or(source);
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = before[line_start..].chars().count() + 1;
        Self { line, column }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyntaxError {
    #[error("syntax error at {location}: {message}{}", format_expected(.expected))]
    Syntax {
        span: Span,
        location: Location,
        message: String,
        expected: Vec<String>,
    },
}

fn format_expected(expected: &[String]) -> String {
    if expected.is_empty() {
        String::new()
    } else {
        format!(" (expected {})", expected.join(", "))
    }
}

impl SyntaxError {
    pub fn new(source: &str, span: Span, message: impl Into<String>) -> Self {
        SyntaxError::Syntax {
            location: Location::locate(source, span.start),
            span,
            message: message.into(),
            expected: Vec::new(),
        }
    }

    pub fn span(&self) -> &Span {
        match self {
            SyntaxError::Syntax { span, .. } => span,
        }
    }

    pub fn location(&self) -> Location {
        match self {
            SyntaxError::Syntax { location, .. } => *location,
        }
    }

    /// Build from a chumsky error, resolving the location against `source`
    pub fn from_rich(err: chumsky::error::Rich<'_, Token>, source: &str) -> Self {
        use chumsky::error::{RichPattern, RichReason};

        let message = match err.reason() {
            RichReason::ExpectedFound { found, .. } => {
                let found_str = match found {
                    Some(tok) => format_token(tok),
                    None => "end of input".to_string(),
                };
                format!("unexpected {}", found_str)
            }
            RichReason::Custom(msg) => msg.to_string(),
        };

        let mut expected: Vec<String> = err
            .expected()
            .filter_map(|e| match e {
                RichPattern::Token(tok) => Some(format_token(tok)),
                RichPattern::Label(label) => Some(label.to_string()),
                RichPattern::EndOfInput => Some("end of input".to_string()),
                RichPattern::Identifier(s) => Some(format!("identifier '{}'", s)),
                RichPattern::Any => Some("any token".to_string()),
                RichPattern::SomethingElse => None,
            })
            .collect();
        // chumsky reports alternatives in parser order; sort for stable messages
        expected.sort();
        expected.dedup();

        let span = err.span().into_range();
        SyntaxError::Syntax {
            location: Location::locate(source, span.start),
            span,
            message,
            expected,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        match self {
            SyntaxError::Syntax {
                span,
                message,
                expected,
                ..
            } => report(
                source,
                filename,
                span.clone(),
                "template syntax error",
                &format!("{}{}", message, format_expected(expected)),
            ),
        }
    }
}

/// Render an ariadne report for a single labelled span
pub(crate) fn report(
    source: &str,
    filename: &str,
    span: Span,
    headline: &str,
    label: &str,
) -> String {
    let mut buf = Vec::new();
    let written = Report::build(ReportKind::Error, filename, span.start)
        .with_message(headline)
        .with_label(
            Label::new((filename, span))
                .with_message(label)
                .with_color(Color::Red),
        )
        .finish()
        .write((filename, Source::from(source)), &mut buf);
    if written.is_err() {
        return format!("{}: {}", headline, label);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Format a token for human-readable error messages
fn format_token(tok: &Token) -> String {
    match tok {
        Token::Text(_) => "template text".to_string(),
        Token::Ident(s) => format!("identifier '{}'", s),
        Token::Str(s) => format!("string \"{}\"", s),
        Token::Int(n) => format!("number {}", n),
        Token::ExprOpen => "'{{'".to_string(),
        Token::ExprClose | Token::ExprCloseTrim => "'}}'".to_string(),
        Token::TagOpen => "'{%'".to_string(),
        Token::TagClose | Token::TagCloseTrim => "'%}'".to_string(),
        Token::If => "keyword 'if'".to_string(),
        Token::Elif => "keyword 'elif'".to_string(),
        Token::Else => "keyword 'else'".to_string(),
        Token::EndIf => "keyword 'endif'".to_string(),
        Token::For => "keyword 'for'".to_string(),
        Token::In => "keyword 'in'".to_string(),
        Token::EndFor => "keyword 'endfor'".to_string(),
        Token::Set => "keyword 'set'".to_string(),
        Token::Not => "keyword 'not'".to_string(),
        Token::And => "keyword 'and'".to_string(),
        Token::Or => "keyword 'or'".to_string(),
        Token::True => "keyword 'true'".to_string(),
        Token::False => "keyword 'false'".to_string(),
        Token::Null => "keyword 'none'".to_string(),
        Token::Dot => "'.'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Pipe => "'|'".to_string(),
        Token::ParenOpen => "'('".to_string(),
        Token::ParenClose => "')'".to_string(),
        Token::BracketOpen => "'['".to_string(),
        Token::BracketClose => "']'".to_string(),
        Token::Assign => "'='".to_string(),
        Token::EqualEqual => "'=='".to_string(),
        Token::NotEqual => "'!='".to_string(),
        Token::LessOrEqual => "'<='".to_string(),
        Token::Less => "'<'".to_string(),
        Token::GreaterOrEqual => "'>='".to_string(),
        Token::Greater => "'>'".to_string(),
        Token::Plus => "'+'".to_string(),
        Token::Minus => "'-'".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_first_line() {
        let loc = Location::locate("abc", 1);
        assert_eq!(loc, Location { line: 1, column: 2 });
    }

    #[test]
    fn test_locate_after_newlines() {
        let loc = Location::locate("a\nbc\ndef", 6);
        assert_eq!(loc, Location { line: 3, column: 2 });
    }

    #[test]
    fn test_locate_clamps_past_end() {
        let loc = Location::locate("ab\n", 99);
        assert_eq!(loc, Location { line: 2, column: 1 });
    }

    #[test]
    fn test_display_includes_location() {
        let err = SyntaxError::new("x\n{{ }}", 5..7, "unexpected '}}'");
        assert_eq!(
            err.to_string(),
            "syntax error at line 2, column 4: unexpected '}}'"
        );
    }

    #[test]
    fn test_format_mentions_message() {
        let source = "{% if x %}";
        let err = SyntaxError::new(source, 0..2, "unterminated block");
        let report = err.format(source, "test.tmpl");
        assert!(report.contains("unterminated block"));
    }
}
