//! Abstract Syntax Tree types for the template language

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// AST node with source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// Valid identifier (alphanumeric + underscore, starts with letter/_)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(pub String);

impl Identifier {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Root AST node - a parsed template
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub nodes: Vec<Spanned<Node>>,
}

/// A piece of template body
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text copied to the output
    Text(String),
    /// Expression output: `{{ expr }}`
    Output(Spanned<Expr>),
    /// Conditional: `{% if %} ... {% elif %} ... {% else %} ... {% endif %}`
    If(IfBlock),
    /// Loop: `{% for x in xs %} ... {% else %} ... {% endfor %}`
    For(ForBlock),
    /// Binding: `{% set x = expr %}`
    Set {
        name: Spanned<Identifier>,
        value: Spanned<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfBlock {
    /// `if` followed by any `elif` branches, in source order
    pub branches: Vec<(Spanned<Expr>, Vec<Spanned<Node>>)>,
    pub otherwise: Option<Vec<Spanned<Node>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForBlock {
    pub var: Spanned<Identifier>,
    pub iterable: Spanned<Expr>,
    pub body: Vec<Spanned<Node>>,
    /// Rendered instead of the body when the sequence is empty
    pub otherwise: Option<Vec<Spanned<Node>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Str(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    In,
    NotIn,
    Add,
    Sub,
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
        };
        f.write_str(s)
    }
}

/// Template expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// List literal: `[a, b]`
    List(Vec<Spanned<Expr>>),
    /// Context or local variable
    Var(Identifier),
    /// Attribute access: `arch.name`
    Attr(Box<Spanned<Expr>>, Spanned<Identifier>),
    /// Indexing: `args[1]`, `machine_lookup["avx2"]`
    Index(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    /// Builtin call: `len(archs)`; filters desugar to this
    Call(Spanned<Identifier>, Vec<Spanned<Expr>>),
    Unary(UnaryOp, Box<Spanned<Expr>>),
    Binary(BinaryOp, Box<Spanned<Expr>>, Box<Spanned<Expr>>),
}
