use std::process::ExitCode;

fn main() -> ExitCode {
    topichub_cli::run()
}
