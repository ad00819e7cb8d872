//! CLI command handling.
//!
//! Provides subcommands for:
//! - Inspecting the gated toolset (`tools list`, `tools classify`)
//! - Invoking a tool through the gate (`tools invoke`)
//! - Showing the effective policy (`policy show`)
//! - Querying a JSONL audit trail (`audit`)

mod audit;
mod confirm;
mod policy;
mod tools;

pub use audit::{AuditArgs, run_audit_command};
pub use confirm::{AutoGrantConfirmer, StdinConfirmer};
pub use policy::{PolicyCommand, run_policy_command};
pub use tools::{ToolsCommand, run_tools_command};

use clap::{ColorChoice, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "toolgate")]
#[command(about = "Policy-gated external tools for agent runtimes")]
#[command(
    long_about = "toolgate classifies every tool call, checks it against an allow/deny/confirm policy and records an audit trail.\nExamples:\n  toolgate tools list  # Show the gated toolset\n  toolgate tools invoke get_weather --params '{\"city\":\"Paris\"}'"
)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect and invoke gated tools
    #[command(
        subcommand,
        about = "Inspect and invoke gated tools",
        long_about = "List the gated toolset, classify tool names, or invoke a tool through the gate.\nExample: toolgate tools list --verbose"
    )]
    Tools(ToolsCommand),

    /// Show the effective policy
    #[command(subcommand)]
    Policy(PolicyCommand),

    /// Query a JSONL audit trail
    Audit(AuditArgs),
}

/// Dispatch a parsed command line.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Tools(cmd) => run_tools_command(cmd).await,
        Command::Policy(cmd) => run_policy_command(cmd).await,
        Command::Audit(args) => run_audit_command(args).await,
    }
}
