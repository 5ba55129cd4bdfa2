pub mod config;
pub mod exec;
pub mod parse;
pub mod resolve;

use std::io::{self, BufRead, Write};

use crmpilot_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use crmpilot_core::errors::CommandError;
use serde::Serialize;
use serde_json::Value;

use crate::GlobalArgs;

pub const COMMAND_PROMPT: &str = "Enter your CRM command:";

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
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with(command, message, None)
    }

    pub fn success_with(command: &str, message: impl Into<String>, result: Option<Value>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            result,
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
            result: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn from_error(command: &str, error: &CommandError) -> Self {
        Self::failure(command, error.error_class(), error.to_string(), error.exit_code())
    }

    /// Puts `line` (typically the parsed intent) above the outcome line.
    pub fn preceded_by(mut self, line: Option<String>) -> Self {
        if let Some(line) = line {
            self.output = format!("{line}\n{}", self.output);
        }
        self
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn to_json_line<T: Serialize>(value: &T) -> Option<String> {
    serde_json::to_string(value).ok()
}

pub(crate) fn load_config(command: &str, global: &GlobalArgs) -> Result<AppConfig, CommandResult> {
    let options = LoadOptions {
        config_path: global.config.clone(),
        require_file: global.config.is_some(),
        overrides: ConfigOverrides {
            log_level: global.log_level.clone(),
            llm_provider: global.llm_provider,
            llm_model: global.llm_model.clone(),
            crm_api_base_url: global.crm_api_base_url.clone(),
        },
    };
    AppConfig::load(options).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

pub(crate) fn build_runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

/// Joins positional words into one command, or prompts for a line on stdin when there are none.
pub(crate) fn read_command(command: &str, words: &[String]) -> Result<String, CommandResult> {
    let text = if words.is_empty() {
        prompt_stdin().map_err(|error| {
            CommandResult::failure(command, "input", format!("could not read command: {error}"), 5)
        })?
    } else {
        words.join(" ")
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(CommandResult::failure(command, "input", "no command was given", 5));
    }
    Ok(text)
}

fn prompt_stdin() -> io::Result<String> {
    let mut stderr = io::stderr();
    write!(stderr, "{COMMAND_PROMPT} ")?;
    stderr.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}
