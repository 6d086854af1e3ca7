use std::process::ExitCode;

fn main() -> ExitCode {
    sunder::cli::run_cli()
}
