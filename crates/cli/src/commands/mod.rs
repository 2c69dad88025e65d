pub mod chat;
pub mod config;
pub mod doctor;
pub mod migrate;

use serde::Serialize;
use tokio::runtime::Runtime;
use topichub_core::config::{AppConfig, LoadOptions};
use topichub_db::{connect_with_settings, migrations, DbPool};

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Successful run whose output was already written.
    pub fn finished() -> Self {
        Self { exit_code: 0, output: String::new() }
    }
}

/// A failed startup step, classified for the JSON outcome and the exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupError {
    pub error_class: &'static str,
    pub message: String,
    pub exit_code: u8,
}

impl StartupError {
    fn new(error_class: &'static str, message: impl Into<String>, exit_code: u8) -> Self {
        Self { error_class, message: message.into(), exit_code }
    }

    pub fn into_result(self, command: &str) -> CommandResult {
        CommandResult::failure(command, self.error_class, self.message, self.exit_code)
    }
}

pub fn load_config(options: &LoadOptions) -> Result<AppConfig, StartupError> {
    AppConfig::load(options.clone()).map_err(|error| {
        StartupError::new("config_validation", format!("configuration issue: {error}"), 2)
    })
}

pub fn build_runtime() -> Result<Runtime, StartupError> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        StartupError::new("runtime_init", format!("failed to initialize async runtime: {error}"), 3)
    })
}

/// Connects to the configured database and brings the schema up to date.
pub fn open_store(runtime: &Runtime, config: &AppConfig) -> Result<DbPool, StartupError> {
    runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| StartupError::new("db_connectivity", error.to_string(), 4))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| StartupError::new("migration", error.to_string(), 5))?;
        Ok(pool)
    })
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value};
    use topichub_core::config::AppConfig;
    use topichub_db::{SqlTopicStore, TopicStore};

    use super::{build_runtime, open_store};

    #[test]
    fn open_store_migrates_the_schema() {
        let runtime = build_runtime().expect("runtime");
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".to_string();

        let pool = open_store(&runtime, &config).expect("open store");
        let store = SqlTopicStore::new(pool.clone());
        let empty = Map::new();
        let found = runtime.block_on(store.find_one(&empty, &empty)).expect("topics table exists");
        assert_eq!(found, None);
        runtime.block_on(pool.close());
    }

    #[test]
    fn unreachable_database_is_a_connectivity_failure() {
        let runtime = build_runtime().expect("runtime");
        let mut config = AppConfig::default();
        config.database.url = "sqlite:///nonexistent-dir/topichub.db".to_string();
        config.database.timeout_secs = 1;

        let error = open_store(&runtime, &config).expect_err("missing directory");
        assert_eq!(error.error_class, "db_connectivity");
        assert_eq!(error.exit_code, 4);

        let payload: Value =
            serde_json::from_str(&error.into_result("migrate").output).expect("json");
        assert_eq!(payload["error_class"], "db_connectivity");
    }
}
