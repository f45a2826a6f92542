//! Boundproof CLI

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use boundproof::check::Checker;
use boundproof::config::CheckConfig;
use boundproof::error::{report_error, CompileError};

#[derive(Parser)]
#[command(name = "boundproof", version, about = "Static bounds-safety checker")]
struct Cli {
    /// Log prover decisions (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Prove every bounds obligation in a source file
    Check {
        /// Source file to check
        file: PathBuf,
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Check functions one at a time
        #[arg(long)]
        sequential: bool,
        /// Print the facts known at the end of each function
        #[arg(long)]
        dump_facts: bool,
    },
    /// Parse and dump AST (debug)
    Parse {
        /// Source file to parse
        file: PathBuf,
    },
    /// Tokenize and dump tokens (debug)
    Tokens {
        /// Source file to tokenize
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ok = match cli.command {
        Command::Check {
            file,
            config,
            sequential,
            dump_facts,
        } => check_file(&file, config.as_deref(), sequential, dump_facts),
        Command::Parse { file } => parse_file(&file),
        Command::Tokens { file } => tokenize_file(&file),
    };

    if !ok {
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "boundproof=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn read_source(path: &Path) -> Result<String, CompileError> {
    std::fs::read_to_string(path)
        .map_err(|e| CompileError::io_error(format!("failed to read {}: {e}", path.display())))
}

fn check_file(path: &Path, config: Option<&Path>, sequential: bool, dump_facts: bool) -> bool {
    let filename = path.display().to_string();
    let source = match read_source(path) {
        Ok(source) => source,
        Err(e) => {
            report_error(&filename, "", &e);
            return false;
        }
    };

    let mut config = match config.map(CheckConfig::from_file).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            report_error(&filename, &source, &e);
            return false;
        }
    };
    if sequential {
        config.parallel = false;
    }
    if dump_facts {
        config.dump_facts = true;
    }

    let program = match boundproof::lexer::tokenize(&source)
        .and_then(|tokens| boundproof::parser::parse(&filename, &source, tokens))
    {
        Ok(program) => program,
        Err(e) => {
            report_error(&filename, &source, &e);
            return false;
        }
    };

    let report = Checker::new(config).check_program(&program);
    for function in &report.functions {
        if let Some(facts) = &function.facts {
            println!("facts at the end of `{}`:", function.name);
            for line in facts.lines() {
                println!("  {line}");
            }
        }
        for error in &function.errors {
            report_error(
                &filename,
                &source,
                &CompileError::check(&function.name, error.clone()),
            );
        }
    }

    let failed = report.functions.iter().filter(|f| !f.is_ok()).count();
    if failed == 0 {
        println!(
            "✓ {filename}: {} obligations proved in {} functions",
            report.proved(),
            report.functions.len()
        );
        true
    } else {
        eprintln!("✗ {filename}: {failed} of {} functions failed", report.functions.len());
        false
    }
}

fn parse_file(path: &Path) -> bool {
    let filename = path.display().to_string();
    let result = read_source(path).and_then(|source| {
        let tokens = boundproof::lexer::tokenize(&source)?;
        let program = boundproof::parser::parse(&filename, &source, tokens)?;
        serde_json::to_string_pretty(&program)
            .map_err(|e| CompileError::io_error(format!("failed to serialize AST: {e}")))
    });

    match result {
        Ok(json) => {
            println!("{json}");
            true
        }
        Err(e) => {
            eprintln!("Error: {e}");
            false
        }
    }
}

fn tokenize_file(path: &Path) -> bool {
    let result = read_source(path).and_then(|source| boundproof::lexer::tokenize(&source));
    match result {
        Ok(tokens) => {
            for (tok, span) in &tokens {
                println!("{:?} @ {}..{}", tok, span.start, span.end);
            }
            true
        }
        Err(e) => {
            eprintln!("Error: {e}");
            false
        }
    }
}
