//! dispatchgen - architecture-dispatch code generation from templates
//!
//! This library renders text templates against three read-only catalogs
//! (architectures, machines, kernels) to produce the per-architecture kernel
//! declarations and runtime dispatch tables of a SIMD library.
//!
//! # Example
//!
//! ```rust
//! use dispatchgen::{render, Catalog, Params, GENERATION_MARKER};
//!
//! let catalog = Catalog::builtin().unwrap();
//! let out = render("{{ len(kernels) > 0 }}", &catalog, &Params::new()).unwrap();
//! assert_eq!(out, format!("{}true", GENERATION_MARKER));
//! ```

pub mod catalog;
pub mod error;
pub mod generate;
pub mod parser;
pub mod renderer;

pub use catalog::{Catalog, CatalogError};
pub use error::{Location, SyntaxError};
pub use generate::GenerateError;
pub use parser::{parse, parse_with, Template};
pub use renderer::{Context, EvalError, Params, Reason, Value, ARGS_KEY};

use thiserror::Error;

/// Header every generated file starts with, blank line included
pub const GENERATION_MARKER: &str =
    "/* this file was generated by dispatchgen template utils, do not edit! */\n\n";

/// Errors that can occur during the render pipeline
#[derive(Debug, Error)]
pub enum RenderError {
    /// Error during parsing
    #[error("syntax errors: {}", format_syntax_errors(.0))]
    Syntax(Vec<SyntaxError>),

    /// Error during evaluation
    #[error("render error: {0}")]
    Eval(#[from] EvalError),
}

impl From<Vec<SyntaxError>> for RenderError {
    fn from(errors: Vec<SyntaxError>) -> Self {
        RenderError::Syntax(errors)
    }
}

fn format_syntax_errors(errors: &[SyntaxError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Coarse classification of a render failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The template is not valid in the template language
    TemplateSyntax,
    /// A variable, attribute, key or catalog entry resolves to nothing
    UndefinedReference,
    /// A value was used where a different type was required
    Type,
}

impl RenderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::Syntax(_) => ErrorKind::TemplateSyntax,
            RenderError::Eval(e) if e.reason.is_undefined_reference() => {
                ErrorKind::UndefinedReference
            }
            RenderError::Eval(_) => ErrorKind::Type,
        }
    }

    /// Format every diagnostic with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        match self {
            RenderError::Syntax(errors) => errors
                .iter()
                .map(|e| e.format(source, filename))
                .collect::<Vec<_>>()
                .join("\n"),
            RenderError::Eval(e) => e.format(source, filename),
        }
    }
}

/// Configuration for the render pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderConfig {
    /// Drop the first newline after each `{% ... %}` tag
    pub trim_blocks: bool,
    /// Debug mode: trace the assembled context to stderr
    pub debug: bool,
}

impl RenderConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable dropping the newline after block tags
    pub fn with_trim_blocks(mut self, trim_blocks: bool) -> Self {
        self.trim_blocks = trim_blocks;
        self
    }

    /// Enable or disable debug mode
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Render a template with default configuration
///
/// The output is [`GENERATION_MARKER`] followed by the rendered body. The
/// result depends only on the arguments, so identical inputs give identical
/// bytes.
///
/// # Example
///
/// ```rust
/// use dispatchgen::{render, Catalog, Params, GENERATION_MARKER};
///
/// let catalog = Catalog::builtin().unwrap();
/// let params = Params::new().with_args(["a", "b", "c"]);
/// let out = render("{{ args[1] }}", &catalog, &params).unwrap();
/// assert_eq!(out, format!("{}b", GENERATION_MARKER));
/// ```
pub fn render(source: &str, catalog: &Catalog, params: &Params) -> Result<String, RenderError> {
    render_with_config(source, catalog, params, RenderConfig::default())
}

/// Render a template with custom configuration
///
/// # Example
///
/// ```rust
/// use dispatchgen::{render_with_config, Catalog, Params, RenderConfig};
///
/// let catalog = Catalog::builtin().unwrap();
/// let config = RenderConfig::new().with_trim_blocks(true);
/// let out = render_with_config(
///     "{% for a in architectures %}{% if a.name == \"avx2\" %}\n{{ a.alignment }}{% endif %}\n{% endfor %}",
///     &catalog,
///     &Params::new(),
///     config,
/// )
/// .unwrap();
/// assert!(out.ends_with("32"));
/// ```
pub fn render_with_config(
    source: &str,
    catalog: &Catalog,
    params: &Params,
    config: RenderConfig,
) -> Result<String, RenderError> {
    // Parse before touching the context so syntax errors never yield output
    let template = parse_with(source, config.trim_blocks)?;

    let context = Context::new(catalog).with_params(params);

    if config.debug {
        eprintln!("=== Render Debug ===");
        eprintln!(
            "catalog: {} architectures, {} machines, {} kernels",
            catalog.archs.len(),
            catalog.machines.len(),
            catalog.kernels.len()
        );
        eprintln!("context keys: {}", context.keys().collect::<Vec<_>>().join(", "));
        if !context.overridden().is_empty() {
            eprintln!("overridden by params: {}", context.overridden().join(", "));
        }
        eprintln!("template nodes: {}", template.nodes.len());
        eprintln!("====================");
    }

    let body = renderer::render_template(&template, source, &context)?;

    let mut out = String::with_capacity(GENERATION_MARKER.len() + body.len());
    out.push_str(GENERATION_MARKER);
    out.push_str(&body);
    Ok(out)
}
