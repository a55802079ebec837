use std::process::ExitCode;

fn main() -> ExitCode {
    chartcheck::cli::run()
}
