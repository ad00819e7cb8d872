//! Tool inspection and invocation commands.

use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;

use crate::audit::AuditFilter;
use crate::cli::confirm::{AutoGrantConfirmer, StdinConfirmer};
use crate::config::Config;
use crate::gate::{Confirmer, violates_floor};
use crate::session::{SessionCache, build_gate, build_session};
use crate::tools::Tool;

#[derive(Subcommand, Debug, Clone)]
pub enum ToolsCommand {
    /// List the gated toolset with each tool's action class and decision
    List {
        /// Show descriptions and rationales
        #[arg(short, long)]
        verbose: bool,
    },

    /// Classify a tool name without registering it
    Classify {
        /// Tool name (e.g. "stripe_tool", "like_post")
        name: String,

        /// Tool description to match description rules against
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Invoke a tool through the gate
    Invoke {
        /// Tool name
        name: String,

        /// Parameters as a JSON object
        #[arg(short, long, default_value = "{}")]
        params: String,

        /// Grant confirmation requests without prompting
        #[arg(short, long)]
        yes: bool,
    },
}

/// Run a tools command.
pub async fn run_tools_command(cmd: ToolsCommand) -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;

    match cmd {
        ToolsCommand::List { verbose } => cmd_list(&config, verbose).await,
        ToolsCommand::Classify { name, description } => {
            cmd_classify(&config, &name, &description).await
        }
        ToolsCommand::Invoke { name, params, yes } => {
            let confirmer: Arc<dyn Confirmer> = if yes {
                Arc::new(AutoGrantConfirmer)
            } else {
                Arc::new(StdinConfirmer)
            };
            cmd_invoke(&config, &name, &params, confirmer).await
        }
    }
}

async fn cmd_list(config: &Config, verbose: bool) -> anyhow::Result<()> {
    let session = build_session(config, Arc::new(StdinConfirmer), &SessionCache::new()).await?;
    let tools = session.registry.snapshot();

    if tools.is_empty() {
        println!("No tools configured. Set integration keys in the environment or .env.");
        return Ok(());
    }

    println!("{:<28} {:<24} DECISION", "NAME", "CLASS");
    println!("{}", "-".repeat(72));
    for tool in &tools {
        let class = tool.action_class();
        let (decision, rationale) = if tool.is_floor_denied() {
            ("deny (safety floor)".to_string(), String::new())
        } else {
            let rule = session.policy().evaluate(class).await;
            (rule.decision.to_string(), rule.rationale)
        };
        println!("{:<28} {:<24} {}", tool.name(), class, decision);
        if verbose {
            println!("    {}", tool.description());
            if !rationale.is_empty() {
                println!("    rationale: {}", rationale);
            }
        }
    }
    println!("\n{} tool(s) registered.", tools.len());
    Ok(())
}

async fn cmd_classify(config: &Config, name: &str, description: &str) -> anyhow::Result<()> {
    let gate = build_gate(config, Arc::new(StdinConfirmer)).await?;
    if violates_floor(name, description) {
        println!("{name}: PUBLISH_SOCIAL (denied by the like/comment safety floor)");
        return Ok(());
    }
    let class = gate.classifier().classify_parts(name, description);
    let rule = gate.policy().evaluate(class).await;
    println!("{name}: {class} -> {} ({})", rule.decision, rule.rationale);
    Ok(())
}

async fn cmd_invoke(
    config: &Config,
    name: &str,
    params: &str,
    confirmer: Arc<dyn Confirmer>,
) -> anyhow::Result<()> {
    let params: serde_json::Value =
        serde_json::from_str(params).context("--params must be a JSON object")?;
    let session = build_session(config, confirmer, &SessionCache::new()).await?;
    let tool = session.registry.get(name).with_context(|| {
        format!(
            "unknown tool '{name}'. Available: {}",
            session.registry.names().join(", ")
        )
    })?;

    let result = tool.invoke(params).await;

    for record in session
        .audit()
        .query(&AuditFilter::new().tool(name))
        .await
    {
        eprintln!(
            "audit #{} {} {} -> {} ({})",
            record.sequence, record.action_class, record.decision, record.outcome, record.rationale
        );
    }

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output.result)?);
    Ok(())
}
