use std::process::ExitCode;

fn main() -> ExitCode {
    crmpilot_cli::run()
}
