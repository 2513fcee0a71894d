//! CLI command definitions

use clap::{Parser, Subcommand};
use conductor_domain::OutputFormat;
use std::path::PathBuf;

/// CLI arguments for conductor
#[derive(Parser, Debug)]
#[command(name = "conductor")]
#[command(author, version, about = "Plan, validate and run tool workflows for a goal")]
#[command(long_about = r#"
Conductor turns a natural-language goal into a validated plan of tool calls
and runs it.

The pipeline has four stages:
1. Discovery: candidate tools are ranked by semantic similarity
2. Planning: a low-tier oracle drafts a plan, escalating once to the high tier
3. Validation: schema, dependency, authorization, resource and integrity checks
4. Execution: steps run concurrently as their dependencies complete

Configuration files are loaded from (in priority order):
1. CONDUCTOR_* environment variables
2. --config <path>        Explicit config file
3. ./conductor.toml       Project-level config
4. ~/.config/conductor/config.toml   Global config

Example:
  conductor run --context alice.toml "Summarize billing for customer c-42"
  conductor validate --context alice.toml plans/draft.json
  conductor search --context alice.toml "customer profile"
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output format (text or json)
    #[arg(short, long, global = true, value_name = "FORMAT")]
    pub output: Option<OutputFormat>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Tool catalog file (overrides [registry] catalog)
    #[arg(long, global = true, value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    /// Weight of the tenant preference boost (overrides [discovery.tenant_boost] weight, 0 disables)
    #[arg(long, global = true, value_name = "WEIGHT")]
    pub tenant_boost_weight: Option<f32>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Plan and execute a goal
    Run {
        /// The goal, in natural language
        goal: String,

        /// Execution context file of the caller
        #[arg(long, value_name = "PATH")]
        context: PathBuf,

        /// Plan file used for both tiers (overrides [oracle])
        #[arg(long, value_name = "PATH")]
        plan: Option<PathBuf>,

        /// Tool fixtures file (overrides [invoker] fixtures)
        #[arg(long, value_name = "PATH")]
        fixtures: Option<PathBuf>,
    },

    /// Validate a plan file against the catalog and a context
    Validate {
        /// Plan file (JSON or fenced text)
        plan: PathBuf,

        /// Execution context file of the caller
        #[arg(long, value_name = "PATH")]
        context: PathBuf,

        /// Accept plans without an attestation
        #[arg(long)]
        allow_unsealed: bool,

        /// Execute the plan when it is valid
        #[arg(long)]
        execute: bool,

        /// Tool fixtures file used with --execute
        #[arg(long, value_name = "PATH")]
        fixtures: Option<PathBuf>,
    },

    /// Show the tools discovery would offer for a goal
    Search {
        /// The goal, in natural language
        goal: String,

        /// Execution context file of the caller
        #[arg(long, value_name = "PATH")]
        context: PathBuf,

        /// Maximum number of matches
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Inspect and maintain the tool catalog
    #[command(subcommand)]
    Tools(ToolsCommand),

    /// Show configuration sources and issues
    Config,
}

#[derive(Subcommand, Debug)]
pub enum ToolsCommand {
    /// List registered tools
    List {
        /// Include deprecated tools
        #[arg(long)]
        all: bool,
    },

    /// Deprecate tools with too few recorded invocations
    Sweep {
        /// Minimum invocations to stay active (overrides [registry] deprecation_usage_threshold)
        #[arg(long)]
        min_invocations: Option<u64>,

        /// Audit log to read invocations from (overrides [logging] audit_log)
        #[arg(long, value_name = "PATH")]
        audit_log: Option<PathBuf>,
    },
}
