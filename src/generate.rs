//! File-level plumbing around [`render_with_config`](crate::render_with_config)
//!
//! Reading the template, choosing the catalog and writing the result are
//! kept here so the renderer itself stays free of I/O.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::catalog::{Catalog, CatalogError};
use crate::renderer::Params;
use crate::{render_with_config, RenderConfig, RenderError};

/// Errors that can occur while generating a file
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("cannot read template '{}': {source}", .path.display())]
    InputNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write output '{}': {source}", .path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Keeps the template text so the error can be reported in context
    #[error("failed to render '{}': {error}", .path.display())]
    Render {
        path: PathBuf,
        template: String,
        #[source]
        error: RenderError,
    },
}

impl GenerateError {
    /// Human-readable report; render failures show the offending template line
    pub fn report(&self) -> String {
        match self {
            GenerateError::Render {
                path,
                template,
                error,
            } => error.format(template, &path.display().to_string()),
            other => other.to_string(),
        }
    }
}

pub fn read_template(path: &Path) -> Result<String, GenerateError> {
    fs::read_to_string(path).map_err(|source| GenerateError::InputNotFound {
        path: path.to_path_buf(),
        source,
    })
}

/// Catalog from `path`, or the built-in one
pub fn load_catalog(path: Option<&Path>) -> Result<Catalog, GenerateError> {
    let catalog = match path {
        Some(path) => Catalog::from_file(path)?,
        None => Catalog::builtin()?,
    };
    Ok(catalog)
}

/// Read and render the template at `input`
pub fn generate_file(
    input: &Path,
    catalog: &Catalog,
    params: &Params,
    config: RenderConfig,
) -> Result<String, GenerateError> {
    let template = read_template(input)?;
    match render_with_config(&template, catalog, params, config) {
        Ok(text) => Ok(text),
        Err(error) => Err(GenerateError::Render {
            path: input.to_path_buf(),
            template,
            error,
        }),
    }
}

/// Replace `path` with `contents`
///
/// The text goes to a temporary file in the same directory which is then
/// renamed over `path`, so a failed run never leaves a truncated output.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), GenerateError> {
    let wrap = |source| GenerateError::OutputWrite {
        path: path.to_path_buf(),
        source,
    };

    let file_name = path
        .file_name()
        .ok_or_else(|| wrap(io::Error::new(io::ErrorKind::InvalidInput, "not a file path")))?;
    let mut temp_name = std::ffi::OsString::from(".");
    temp_name.push(file_name);
    temp_name.push(format!(".{}.tmp", std::process::id()));
    let temp = path.with_file_name(temp_name);

    let written = fs::File::create(&temp).and_then(|mut file| {
        file.write_all(contents.as_bytes())?;
        file.sync_all()
    });
    if let Err(source) = written.and_then(|()| fs::rename(&temp, path)) {
        let _ = fs::remove_file(&temp);
        return Err(wrap(source));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GENERATION_MARKER;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dispatchgen-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_missing_template_is_input_not_found() {
        let err = read_template(Path::new("/nonexistent/missing.tmpl")).unwrap_err();
        assert!(matches!(err, GenerateError::InputNotFound { .. }));
        assert!(err.to_string().contains("missing.tmpl"));
    }

    #[test]
    fn test_write_atomic_replaces_contents() {
        let dir = scratch_dir("atomic");
        let path = dir.join("out.c");
        fs::write(&path, "old").unwrap();
        write_atomic(&path, "new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        let leftovers: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let err = write_atomic(Path::new("/nonexistent/dir/out.c"), "x").unwrap_err();
        assert!(matches!(err, GenerateError::OutputWrite { .. }));
    }

    #[test]
    fn test_generate_file_keeps_template_for_report() {
        let dir = scratch_dir("report");
        let input = dir.join("bad.tmpl");
        fs::write(&input, "line\n{{ nope }}").unwrap();
        let catalog = Catalog::default();
        let err = generate_file(&input, &catalog, &Params::new(), RenderConfig::new()).unwrap_err();
        assert!(matches!(err, GenerateError::Render { .. }));
        assert!(err.report().contains("undefined variable `nope`"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_generate_file_renders() {
        let dir = scratch_dir("render");
        let input = dir.join("ok.tmpl");
        fs::write(&input, "{{ len(kernels) }}").unwrap();
        let catalog = Catalog::default();
        let out = generate_file(&input, &catalog, &Params::new(), RenderConfig::new()).unwrap();
        assert_eq!(out, format!("{}0", GENERATION_MARKER));
        fs::remove_dir_all(&dir).unwrap();
    }
}
