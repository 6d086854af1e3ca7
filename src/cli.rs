//! Command-line interface for the `sunderc` compiler driver.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::context::{Arch, Context};
use crate::error::Diagnostic;
use crate::resolve;
use crate::token::Loc;

#[derive(Parser)]
#[command(name = "sunderc")]
#[command(about = "The Sunder compiler", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check a module and everything it imports for errors
    Check {
        /// Path to the entry module
        path: PathBuf,

        /// Target architecture (amd64, arm64, wasm32); defaults to
        /// SUNDER_ARCH or amd64
        #[arg(long)]
        arch: Option<String>,
    },
}

/// Entry point for the CLI.
pub fn run_cli() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { path, arch } => cmd_check(&path, arch.as_deref()),
    }
}

fn cmd_check(path: &std::path::Path, arch: Option<&str>) -> ExitCode {
    let arch_text = arch
        .map(str::to_string)
        .or_else(|| env::var("SUNDER_ARCH").ok())
        .unwrap_or_else(|| "amd64".to_string());
    let arch = match Arch::from_str(&arch_text) {
        Some(arch) => arch,
        None => {
            let diagnostic = Diagnostic::error(
                Loc::NONE,
                format!("unrecognized architecture `{}`", arch_text),
            );
            let interner = crate::intern::Interner::new();
            eprintln!("{}", diagnostic.display_with_source(&interner, None));
            return ExitCode::FAILURE;
        }
    };

    let mut ctx = Context::new(arch);
    if let Ok(search_path) = env::var("SUNDER_SEARCH_PATH") {
        ctx.search_paths = env::split_paths(&search_path).collect();
    }

    let name = path.to_string_lossy().to_string();
    let result = resolve::load_module_file(&mut ctx, &name, path)
        .and_then(|module| ctx.validate_main_is_defined_correctly(module));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(diagnostic) => {
            eprintln!("{}", ctx.render_diagnostic(&diagnostic));
            ExitCode::FAILURE
        }
    }
}
