pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use crmpilot_core::config::{LlmProvider, LogFormat, LoggingConfig};
use tracing::Level;

use crate::commands::resolve::ResolveTarget;

#[derive(Debug, Parser)]
#[command(
    name = "crmpilot",
    about = "Run natural-language commands against Zoho CRM",
    long_about = "Translate a plain-English command into a CRM intent with an LLM, then create accounts, create deals, or move deals between pipeline stages.",
    after_help = "Examples:\n  crmpilot exec \"Create a deal called Rocket Launch for Acme Corp worth 50000\"\n  crmpilot parse \"Move Rocket Launch to closed won\"\n  crmpilot resolve --account \"Acme Corp\"\n  crmpilot config"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    #[arg(long, global = true, value_name = "PATH", help = "Config file to load (must exist)")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "LEVEL", help = "Override logging.level")]
    pub log_level: Option<String>,
    #[arg(
        long,
        global = true,
        value_name = "PROVIDER",
        help = "Override llm.provider (openai|anthropic|ollama)"
    )]
    pub llm_provider: Option<LlmProvider>,
    #[arg(long, global = true, value_name = "MODEL", help = "Override llm.model")]
    pub llm_model: Option<String>,
    #[arg(long, global = true, value_name = "URL", help = "Override crm.api_base_url")]
    pub crm_api_base_url: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Parse a command and apply it to the CRM (prompts on stdin when omitted)")]
    Exec {
        #[arg(value_name = "COMMAND", trailing_var_arg = true)]
        command: Vec<String>,
    },
    #[command(about = "Parse a command and print the intent without touching the CRM")]
    Parse {
        #[arg(value_name = "COMMAND", trailing_var_arg = true)]
        command: Vec<String>,
    },
    #[command(about = "Look up an account, contact or active user id by name")]
    Resolve {
        #[command(flatten)]
        target: ResolveTarget,
    },
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Exec { command } => commands::exec::run(&cli.global, command),
        Command::Parse { command } => commands::parse::run(&cli.global, command),
        Command::Resolve { target } => commands::resolve::run(&cli.global, target),
        Command::Config => commands::config::run(&cli.global),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Installs the global subscriber. Events go to stderr so stdout carries only command output.
pub fn init_logging(config: &LoggingConfig) {
    let log_level = config.level.parse::<Level>().unwrap_or(Level::WARN);
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(log_level);

    // A subscriber may already be installed when commands run in-process.
    let _ = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
