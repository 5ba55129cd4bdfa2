use std::env;
use std::fs;
use std::path::Path;

use crmpilot_core::config::AppConfig;
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::{load_config, CommandResult};
use crate::GlobalArgs;

const COMMAND: &str = "config";

struct Field {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run(global: &GlobalArgs) -> CommandResult {
    let config = match load_config(COMMAND, global) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let file_path = config.source_path.as_deref();
    let file_doc = load_config_file_doc(file_path);

    let mut lines =
        vec!["effective config (source precedence: cli > env > file > default):".to_string()];
    for field in fields(&config) {
        let source = match cli_flag(global, field.key_path) {
            Some(flag) => format!("cli ({flag})"),
            None => field_source(field.key_path, field.env_keys, file_doc.as_ref(), file_path),
        };
        lines.push(render_line(field.key_path, &field.value, source));
    }

    let summary = match file_path {
        Some(path) => format!("configuration is valid (file: {})", path.display()),
        None => "configuration is valid (no config file found)".to_string(),
    };
    lines.push(CommandResult::success(COMMAND, summary).output);
    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        Field {
            key_path: "crm.api_base_url",
            env_keys: &["CRMPILOT_CRM_API_BASE_URL"],
            value: config.crm.api_base_url.clone(),
        },
        Field {
            key_path: "crm.api_version",
            env_keys: &["CRMPILOT_CRM_API_VERSION"],
            value: config.crm.api_version.clone(),
        },
        Field {
            key_path: "crm.accounts_url",
            env_keys: &["CRMPILOT_CRM_ACCOUNTS_URL"],
            value: config.crm.accounts_url.clone(),
        },
        Field {
            key_path: "crm.client_id",
            env_keys: &["CRMPILOT_CRM_CLIENT_ID"],
            value: non_empty_or_unset(&config.crm.client_id),
        },
        Field {
            key_path: "crm.client_secret",
            env_keys: &["CRMPILOT_CRM_CLIENT_SECRET"],
            value: redact_secret(Some(&config.crm.client_secret)),
        },
        Field {
            key_path: "crm.refresh_token",
            env_keys: &["CRMPILOT_CRM_REFRESH_TOKEN"],
            value: redact_secret(Some(&config.crm.refresh_token)),
        },
        Field {
            key_path: "crm.access_token",
            env_keys: &["CRMPILOT_CRM_ACCESS_TOKEN"],
            value: redact_secret(config.crm.access_token.as_ref()),
        },
        Field {
            key_path: "llm.provider",
            env_keys: &["CRMPILOT_LLM_PROVIDER"],
            value: config.llm.provider.as_str().to_string(),
        },
        Field {
            key_path: "llm.model",
            env_keys: &["CRMPILOT_LLM_MODEL"],
            value: config.llm.model.clone(),
        },
        Field {
            key_path: "llm.base_url",
            env_keys: &["CRMPILOT_LLM_BASE_URL"],
            value: config.llm.effective_base_url().to_string(),
        },
        Field {
            key_path: "llm.api_key",
            env_keys: &["CRMPILOT_LLM_API_KEY", "OPENAI_API_KEY", "ANTHROPIC_API_KEY"],
            value: redact_secret(config.llm.api_key.as_ref()),
        },
        Field {
            key_path: "logging.level",
            env_keys: &["CRMPILOT_LOGGING_LEVEL", "CRMPILOT_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key_path: "logging.format",
            env_keys: &["CRMPILOT_LOGGING_FORMAT", "CRMPILOT_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format).to_lowercase(),
        },
    ]
}

fn cli_flag(global: &GlobalArgs, key_path: &str) -> Option<&'static str> {
    let (flag, set) = match key_path {
        "logging.level" => ("--log-level", global.log_level.is_some()),
        "llm.provider" => ("--llm-provider", global.llm_provider.is_some()),
        "llm.model" => ("--llm-model", global.llm_model.is_some()),
        "crm.api_base_url" => ("--crm-api-base-url", global.crm_api_base_url.is_some()),
        _ => return None,
    };
    set.then_some(flag)
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn non_empty_or_unset(value: &str) -> String {
    if value.trim().is_empty() {
        "<unset>".to_string()
    } else {
        value.to_string()
    }
}

/// Zoho tokens look like `1000.<hex>`; only the numeric prefix is shown.
fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<unset>".to_string();
    }

    match trimmed.split_once('.') {
        Some((prefix, _)) if !prefix.is_empty() && prefix.chars().all(|ch| ch.is_ascii_digit()) => {
            format!("{prefix}.***")
        }
        _ => "<redacted>".to_string(),
    }
}
