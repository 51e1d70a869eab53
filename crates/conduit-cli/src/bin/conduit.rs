//! Conduit CLI - Command-line interface for the Conduit service DSL
//!
//! Usage:
//!   conduit check <file>...                       # Parse and validate .cdt files
//!   conduit check <file> --registry names.json    # Also check known middleware/annotations/actions
//!   conduit print <file>                          # Indented AST dump
//!   conduit print <file> --format json            # AST as JSON for code generators

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use conduit_frontend::errors::FrontendError;
use conduit_frontend::{parse_file, print, NodeRef, Program, Registry, Validator};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "conduit")]
#[command(version)]
#[command(about = "Conduit - service DSL compiler front end")]
#[command(long_about = "Parse, validate and dump Conduit (.cdt) programs")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and validate one or more files
    Check {
        /// Input .cdt files
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// JSON file with known middleware, annotation and action names
        #[arg(short, long, value_name = "FILE")]
        registry: Option<PathBuf>,
    },
    /// Parse a file and print its AST
    Print {
        /// Input .cdt file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
    Debug,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match cli.command {
        Command::Check { files, registry } => check(&files, registry.as_deref()),
        Command::Print { file, format } => print_file(&file, format),
    };
    process::exit(code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_registry(path: &Path) -> Result<Registry, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read registry {}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid registry {}: {}", path.display(), e))
}

fn check(files: &[PathBuf], registry: Option<&Path>) -> i32 {
    let registry = match registry.map(load_registry).transpose() {
        Ok(r) => r.unwrap_or_default(),
        Err(e) => {
            eprintln!("Error: {}", e);
            return 2;
        }
    };

    let mut failed = 0usize;
    for file in files {
        debug!(file = %file.display(), "checking");
        let result = parse_file(file).and_then(|program| {
            Validator::with_registry(registry.clone())
                .validate(&program)
                .map_err(FrontendError::from)
                .map(|()| program)
        });
        match result {
            Ok(program) => {
                println!(
                    "✓ {} ({} statements)",
                    file.display(),
                    program.statements.len()
                );
                print_inventory(&program);
            }
            Err(e) => {
                failed += 1;
                eprintln!("✗ {}", file.display());
                eprintln!("{}", e);
            }
        }
    }

    info!(files = files.len(), failed, "check finished");
    if failed == 0 {
        0
    } else {
        1
    }
}

fn print_inventory(program: &Program) {
    let endpoints: Vec<_> = program.endpoints().collect();
    if !endpoints.is_empty() {
        println!("  Endpoints ({}):", endpoints.len());
        for e in endpoints {
            println!("    {} {}", e.method, e.path);
        }
    }
    let flows: Vec<_> = program
        .workflows()
        .map(|w| format!("workflow {}", w.name))
        .chain(program.jobs().map(|j| format!("job {}", j.name)))
        .collect();
    if !flows.is_empty() {
        println!("  Workflows and jobs ({}):", flows.len());
        for f in flows {
            println!("    {}", f);
        }
    }
}

fn print_file(file: &Path, format: Format) -> i32 {
    let program = match parse_file(file) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", e);
            return 1;
        }
    };
    match format {
        Format::Text => println!("{}", print(Some(NodeRef::from(&program)))),
        Format::Debug => println!("{:#?}", program),
        Format::Json => match serde_json::to_string_pretty(&program) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing to JSON: {}", e);
                return 1;
            }
        },
    }
    0
}
