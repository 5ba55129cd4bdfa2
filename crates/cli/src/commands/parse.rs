use crmpilot_agent::AgentRuntime;

use crate::commands::{build_runtime, load_config, read_command, to_json_line, CommandResult};
use crate::{init_logging, GlobalArgs};

const COMMAND: &str = "parse";

pub fn run(global: &GlobalArgs, words: &[String]) -> CommandResult {
    let config = match load_config(COMMAND, global) {
        Ok(config) => config,
        Err(result) => return result,
    };
    init_logging(&config.logging);

    let text = match read_command(COMMAND, words) {
        Ok(text) => text,
        Err(result) => return result,
    };
    let runtime = match build_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let agent = AgentRuntime::from_config(&config);
    runtime.block_on(parse(&agent, &text))
}

/// Parses without dispatching; no CRM call is made.
pub async fn parse(agent: &AgentRuntime, text: &str) -> CommandResult {
    match agent.parse(text).await {
        Ok(intent) => CommandResult::success(
            COMMAND,
            format!("parsed as {}", intent.operation()),
        )
        .preceded_by(to_json_line(&intent)),
        Err(error) => CommandResult::from_error(COMMAND, &error),
    }
}
