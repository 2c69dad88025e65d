use crate::commands::{build_runtime, load_config, open_store, CommandResult, StartupError};
use topichub_core::config::LoadOptions;
use topichub_db::migrations::MIGRATOR;

pub fn run(options: &LoadOptions) -> CommandResult {
    match apply(options) {
        Ok(message) => CommandResult::success("migrate", message),
        Err(error) => error.into_result("migrate"),
    }
}

fn apply(options: &LoadOptions) -> Result<String, StartupError> {
    let config = load_config(options)?;
    let runtime = build_runtime()?;
    let pool = open_store(&runtime, &config)?;
    runtime.block_on(pool.close());

    Ok(format!("topics schema is current ({} migrations known)", MIGRATOR.iter().count()))
}
