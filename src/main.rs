//! dispatchgen CLI
//!
//! Usage:
//!   dispatchgen --input <FILE> [OPTIONS] [ARGS]...
//!
//! Options:
//!   -i, --input <FILE>     Template to render
//!   -o, --output <FILE>    Write the result here instead of stdout
//!   -c, --catalog <FILE>   Catalog file (TOML); the built-in catalog otherwise
//!   --trim-blocks          Drop the first newline after each block tag
//!   -d, --debug            Trace the rendering context to stderr
//!   -h, --help             Print help

use std::path::PathBuf;

use clap::Parser;

use dispatchgen::generate::{generate_file, load_catalog, write_atomic};
use dispatchgen::{Params, RenderConfig};

#[derive(Parser)]
#[command(name = "dispatchgen")]
#[command(about = "Render architecture-dispatch kernel sources from templates")]
struct Cli {
    /// Template to render
    #[arg(short, long)]
    input: PathBuf,

    /// Output file (writes to stdout if not provided)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Catalog file (TOML format)
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// Drop the first newline after each block tag
    #[arg(long)]
    trim_blocks: bool,

    /// Debug mode: trace the assembled context
    #[arg(short, long)]
    debug: bool,

    /// Extra arguments, exposed to the template as `args`
    ///
    /// Options may appear before, between or after them.
    args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    let catalog = match load_catalog(cli.catalog.as_deref()) {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let params = Params::new().with_args(cli.args);
    let config = RenderConfig::new()
        .with_trim_blocks(cli.trim_blocks)
        .with_debug(cli.debug);

    let text = match generate_file(&cli.input, &catalog, &params, config) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: {}", e.report());
            std::process::exit(1);
        }
    };

    match &cli.output {
        Some(path) => {
            if let Err(e) = write_atomic(path, &text) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        None => println!("{}", text),
    }
}
