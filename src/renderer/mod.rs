//! Template evaluation against the catalogs
//!
//! The parsed template is walked once; every name is resolved through the
//! [`Context`] and the closed record schema in [`value`].

mod builtins;
pub mod context;
pub mod error;
mod eval;
pub mod value;

pub use context::{Context, Params, ARGS_KEY};
pub use error::{EvalError, Reason};
pub use eval::render_template;
pub use value::Value;
