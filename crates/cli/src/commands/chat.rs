use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::commands::{build_runtime, load_config, open_store, CommandResult};
use topichub_agent::{AgentRuntime, ConversationState, HttpLlmClient};
use topichub_core::config::LoadOptions;
use topichub_db::SqlTopicStore;

pub const PROMPT: &str = "Input operation with natural language: ";
pub const EXIT_SENTINEL: &str = "exit";

pub const BANNER: &str = "Topic agent:\n\
Supported operations:\n\
- Insert / Update / Delete:\n    \
    - Modify documents by _id.\n    \
    - Only one document at a time.\n    \
    - Only 'description' field can be added or updated.\n\
- Find:\n    \
    - Generate query from natural language.\n    \
    - Optional fields projection is supported.\n\
Type 'exit' to quit.\n";

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config(options) {
        Ok(config) => config,
        Err(error) => return error.into_result("chat"),
    };
    crate::init_logging(&config);

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(error) => return error.into_result("chat"),
    };

    let llm = match HttpLlmClient::from_config(&config.llm) {
        Ok(llm) => llm,
        Err(error) => {
            return CommandResult::failure("chat", "runtime_init", error.to_string(), 3);
        }
    };

    let pool = match open_store(&runtime, &config) {
        Ok(pool) => pool,
        Err(error) => return error.into_result("chat"),
    };

    info!(
        event_name = "cli.chat.started",
        endpoint = llm.endpoint(),
        model = %config.llm.model,
        "session started"
    );

    let agent = AgentRuntime::new(Arc::new(llm), Arc::new(SqlTopicStore::new(pool.clone())));
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut output = stdout.lock();

    let session = writeln!(output, "{BANNER}")
        .and_then(|()| run_session(&runtime, &agent, stdin.lock(), &mut output));
    runtime.block_on(pool.close());

    match session {
        Ok(()) => CommandResult::finished(),
        Err(error) => CommandResult::failure("chat", "io", error.to_string(), 1),
    }
}

/// Reads one utterance per line and answers each with a single reply line.
///
/// Stops on the exit sentinel (any case) or end of input. A failed turn is
/// reported and the loop keeps going.
pub fn run_session<R, W>(
    runtime: &Runtime,
    agent: &AgentRuntime,
    mut input: R,
    mut output: W,
) -> io::Result<()>
where
    R: BufRead,
    W: Write,
{
    let mut state = ConversationState::new();
    let mut line = String::new();

    loop {
        write!(output, "{PROMPT}")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            break;
        }

        let utterance = line.trim();
        if utterance.eq_ignore_ascii_case(EXIT_SENTINEL) {
            break;
        }
        if utterance.is_empty() {
            continue;
        }

        match runtime.block_on(agent.handle_turn(&mut state, utterance)) {
            Ok(reply) => writeln!(output, "{reply}")?,
            Err(error) => {
                warn!(
                    event_name = "cli.chat.turn_failed",
                    error = %format!("{error:#}"),
                    "turn failed"
                );
                writeln!(output, "Request failed: {error:#}")?;
            }
        }
    }

    writeln!(output, "Bye!")?;
    output.flush()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use topichub_agent::{AgentRuntime, ScriptedLlmClient};
    use topichub_core::TopicDocument;
    use topichub_db::InMemoryTopicStore;

    use super::{run_session, PROMPT};

    fn session(replies: &[&str], input: &str) -> (String, Arc<ScriptedLlmClient>, Arc<InMemoryTopicStore>) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        let llm = Arc::new(ScriptedLlmClient::new(replies.iter().copied()));
        let store = Arc::new(InMemoryTopicStore::default());
        let agent = AgentRuntime::new(llm.clone(), store.clone());

        let mut output = Vec::new();
        run_session(&runtime, &agent, input.as_bytes(), &mut output).expect("session");
        (String::from_utf8(output).expect("utf8 output"), llm, store)
    }

    #[test]
    fn exit_sentinel_is_case_insensitive() {
        let (output, llm, _store) = session(&[], "EXIT\nshould not run\n");

        assert_eq!(output, format!("{PROMPT}Bye!\n"));
        assert!(llm.requests().is_empty());
    }

    #[test]
    fn each_line_gets_one_reply() {
        let (output, _llm, store) =
            session(&["insert", "{'_id': 'politics'}", "None"], "create politics\nsing a song\nexit\n");

        let lines = output.split(PROMPT).filter(|chunk| !chunk.is_empty()).collect::<Vec<_>>();
        assert_eq!(
            lines,
            vec![
                "Inserted document with ID: politics\n",
                "Invalid operation. Supported operations are: find, insert, update, delete\n",
                "Bye!\n",
            ]
        );

        let runtime = tokio::runtime::Builder::new_current_thread().build().expect("runtime");
        assert_eq!(
            runtime.block_on(store.snapshot()),
            vec![TopicDocument::new("politics", None)]
        );
    }

    #[test]
    fn end_of_input_closes_the_session() {
        let (output, _llm, _store) = session(&[], "\n   \n");

        assert!(output.ends_with("\nBye!\n"), "output: {output:?}");
    }

    #[test]
    fn failed_turn_is_reported_and_the_loop_continues() {
        let (output, llm, _store) = session(&["find"], "find politics\nexit\n");

        assert!(output.contains("Request failed: "), "output: {output:?}");
        assert!(output.ends_with("Bye!\n"));
        assert_eq!(llm.requests().len(), 2);
    }
}
