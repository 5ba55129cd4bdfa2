use crmpilot_agent::{AgentRuntime, DispatchStatus};
use serde_json::json;
use tracing::info;

use crate::commands::{build_runtime, load_config, read_command, to_json_line, CommandResult};
use crate::{init_logging, GlobalArgs};

const COMMAND: &str = "exec";

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
    runtime.block_on(execute(&agent, &text))
}

/// Runs the full pipeline and renders the intent line followed by the outcome line.
pub async fn execute(agent: &AgentRuntime, text: &str) -> CommandResult {
    let execution = agent.execute(text).await;
    let intent_line = execution.intent.as_ref().and_then(to_json_line);

    let result = match execution.result {
        Ok(outcome) => {
            info!(
                event_name = "cli.exec.completed",
                command_id = %execution.command_id,
                operation = outcome.operation.as_str(),
                "command executed"
            );
            let message = match outcome.status {
                DispatchStatus::Applied => {
                    format!("{} applied: {}", outcome.operation, outcome.message)
                }
                DispatchStatus::Unsupported => outcome.message.clone(),
            };
            let payload = serde_json::to_value(&outcome)
                .unwrap_or_else(|error| json!({ "serialization_error": error.to_string() }));
            CommandResult::success_with(COMMAND, message, Some(payload))
        }
        Err(error) => {
            info!(
                event_name = "cli.exec.failed",
                command_id = %execution.command_id,
                error_class = error.error_class(),
                "command failed"
            );
            CommandResult::from_error(COMMAND, &error)
        }
    };

    result.preceded_by(intent_line)
}
