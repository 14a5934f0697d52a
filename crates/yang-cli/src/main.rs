//! Thin demonstration binary wiring the compiler and validator together
//! through `Context`: `compile` (parse + schema-compile, report
//! diagnostics), `validate` (compile a schema, load an RFC 7951 JSON
//! instance document against it), and `dump` (print a compiled schema
//! tree). Not a production netconf-agent CLI — see `yang-core`/
//! `yang-compiler`/`yang-validate` for the actual library surface.

mod dump;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use yang_core::error::{with_thread_state, with_thread_state_mut, LogOptions};
use yang_core::{Context, ContextOptions};
use yang_compiler::SourceFormat;
use yang_validate::NoMounts;

#[derive(Parser)]
#[command(name = "yang", version, about = "YANG schema/data toolkit CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and schema-compile one module, reporting diagnostics.
    Compile {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = Format::Yang)]
        format: Format,
    },
    /// Validate an RFC 7951 JSON instance document against a compiled schema.
    Validate {
        /// Module the instance document is checked against.
        #[arg(long = "schema")]
        schema: PathBuf,
        #[arg(long, value_enum, default_value_t = Format::Yang)]
        format: Format,
        data: PathBuf,
    },
    /// Compile a module and print its compiled schema tree.
    Dump {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = Format::Yang)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Yang,
    Yin,
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Format::Yang => "yang",
            Format::Yin => "yin",
        })
    }
}

impl From<Format> for SourceFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Yang => SourceFormat::Yang,
            Format::Yin => SourceFormat::Yin,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Compile { file, format } => run_compile(&file, format),
        Command::Validate { schema, format, data } => run_validate(&schema, format, &data),
        Command::Dump { file, format } => run_dump(&file, format),
    }
}

fn read_source(path: &Path) -> Result<String, ExitCode> {
    fs::read_to_string(path).map_err(|e| {
        eprintln!("error: reading {}: {e}", path.display());
        ExitCode::FAILURE
    })
}

fn run_compile(file: &Path, format: Format) -> ExitCode {
    let ctx = Context::new(ContextOptions::empty());
    let source = match read_source(file) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match yang_compiler::compile_source(&ctx, &source, format.into()) {
        Ok((_, module, diagnostics)) => {
            if !diagnostics.is_empty() {
                eprint!("{}", diagnostics.render(&source));
            }
            if diagnostics.has_errors() {
                return ExitCode::FAILURE;
            }
            println!(
                "compiled {} top-level node(s), {} rpc(s), {} notification(s)",
                module.top_level.len(),
                module.rpcs.len(),
                module.notifications.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_dump(file: &Path, format: Format) -> ExitCode {
    let ctx = Context::new(ContextOptions::empty());
    let source = match read_source(file) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match yang_compiler::compile_source(&ctx, &source, format.into()) {
        Ok((_, module, diagnostics)) => {
            if diagnostics.has_errors() {
                eprint!("{}", diagnostics.render(&source));
                return ExitCode::FAILURE;
            }
            print!("{}", dump::dump_module(&ctx, &module));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_validate(schema: &Path, format: Format, data: &Path) -> ExitCode {
    let ctx = Context::new(ContextOptions::empty());
    let schema_source = match read_source(schema) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let (_, module, diagnostics) = match yang_compiler::compile_source(&ctx, &schema_source, format.into()) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if diagnostics.has_errors() {
        eprint!("{}", diagnostics.render(&schema_source));
        return ExitCode::FAILURE;
    }

    let data_source = match read_source(data) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let json: serde_json::Value = match serde_json::from_str(&data_source) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error: parsing {}: {e}", data.display());
            return ExitCode::FAILURE;
        }
    };

    // Keep the whole validation error chain instead of the default
    // last-message-only behavior, so the CLI can report every violation.
    with_thread_state_mut(|state| state.set_options(LogOptions::STORE));

    let mut tree = yang_validate::from_json(&ctx, &module, &json);
    match yang_validate::validate(&ctx, &module, &mut tree, &NoMounts) {
        Ok(()) => {
            println!("valid");
            ExitCode::SUCCESS
        }
        Err(_) => {
            with_thread_state(|state| {
                for item in state.items() {
                    match &item.path {
                        Some(path) => eprintln!("error: {} (at {path})", item.message),
                        None => eprintln!("error: {}", item.message),
                    }
                }
            });
            ExitCode::FAILURE
        }
    }
}
