//! CLI argument parsing for the voice-pack compiler.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_SOURCE_DIR: &str = "templates";
pub const DEFAULT_OUTPUT_DIR: &str = "dist";
/// Environment variable holding the tracing filter directive.
pub const LOG_ENV: &str = "VPACK_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "vpack",
    version,
    about = "Compile a business config into voice-agent and workflow artifacts",
    after_help = "Examples:\n  vpack init --config client.json\n  vpack validate --config client.json\n  vpack build --config client.json --src templates --out dist\n  vpack build --config client.json --build-date 2026-01-01T00:00:00Z --json\n  vpack ids --config client.json --tool book_appointment",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Build(BuildArgs),
    Validate(ValidateArgs),
    Init(InitArgs),
    Ids(IdsArgs),
}

impl Command {
    pub fn verbose(&self) -> bool {
        match self {
            Command::Build(args) => args.verbose,
            Command::Validate(args) => args.verbose,
            Command::Init(_) | Command::Ids(_) => false,
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Compile every template into the output directory")]
pub struct BuildArgs {
    /// Configuration document; the built-in default is used when it is missing
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Template source tree
    #[arg(long, value_name = "DIR", default_value = DEFAULT_SOURCE_DIR)]
    pub src: PathBuf,

    /// Output tree
    #[arg(long, value_name = "DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub out: PathBuf,

    /// Pin the recorded build date (RFC 3339) for reproducible output
    #[arg(long, value_name = "RFC3339")]
    pub build_date: Option<String>,

    /// Print the build report as JSON
    #[arg(long)]
    pub json: bool,

    #[arg(long)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Check configuration and service constraints without writing anything")]
pub struct ValidateArgs {
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,

    #[arg(long)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Write the default configuration document")]
pub struct InitArgs {
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Print endpoint identifiers for logical tools")]
pub struct IdsArgs {
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Tool to identify (repeatable); defaults to every known tool
    #[arg(long = "tool", value_name = "NAME")]
    pub tools: Vec<String>,

    /// Print identifiers as JSON
    #[arg(long)]
    pub json: bool,
}
