use clap::Args;
use crmpilot_agent::AgentRuntime;
use crmpilot_core::errors::CommandError;

use crate::commands::{build_runtime, load_config, to_json_line, CommandResult};
use crate::{init_logging, GlobalArgs};

const COMMAND: &str = "resolve";

#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub struct ResolveTarget {
    #[arg(long, value_name = "NAME", help = "Exact account name")]
    pub account: Option<String>,
    #[arg(long, value_name = "NAME", help = "Exact contact full name")]
    pub contact: Option<String>,
    #[arg(long, value_name = "NAME_PART", help = "Part of an active user's full name")]
    pub user: Option<String>,
}

pub fn run(global: &GlobalArgs, target: &ResolveTarget) -> CommandResult {
    let config = match load_config(COMMAND, global) {
        Ok(config) => config,
        Err(result) => return result,
    };
    init_logging(&config.logging);

    let runtime = match build_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let agent = AgentRuntime::from_config(&config);
    runtime.block_on(resolve(&agent, target))
}

pub async fn resolve(agent: &AgentRuntime, target: &ResolveTarget) -> CommandResult {
    let resolver = agent.resolver();
    let (kind, lookup) = match (&target.account, &target.contact, &target.user) {
        (Some(name), _, _) => ("account", resolver.find_account_id(name).await),
        (_, Some(name), _) => ("contact", resolver.find_contact_id(name).await),
        (_, _, Some(name)) => ("user", resolver.find_user_id(name).await),
        (None, None, None) => {
            return CommandResult::failure(
                COMMAND,
                "input",
                "one of --account, --contact or --user is required",
                5,
            )
        }
    };

    match lookup {
        Ok(Some(reference)) => CommandResult::success(
            COMMAND,
            format!("{kind} `{}` resolved to {}", reference.query, reference.id),
        )
        .preceded_by(to_json_line(&reference)),
        Ok(None) => CommandResult::failure(COMMAND, "not_found", format!("no {kind} matched"), 5),
        Err(error) => CommandResult::from_error(COMMAND, &CommandError::from(error)),
    }
}
