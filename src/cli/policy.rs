//! Policy inspection commands.

use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;

use crate::config::Config;
use crate::gate::{ActionClass, DenyAllConfirmer, SAFETY_FLOOR_RATIONALE};
use crate::session::build_gate;

#[derive(Subcommand, Debug, Clone)]
pub enum PolicyCommand {
    /// Show the rule in effect for every action class
    Show {
        /// Only list classes with an explicit rule
        #[arg(short, long)]
        explicit: bool,
    },
}

/// Run a policy command.
pub async fn run_policy_command(cmd: PolicyCommand) -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    let gate = build_gate(&config, Arc::new(DenyAllConfirmer)).await?;

    match cmd {
        PolicyCommand::Show { explicit } => {
            if let Some(path) = &config.gate.policy_file {
                println!("Policy file: {}", path.display());
            }
            println!("{:<24} {:<22} RATIONALE", "CLASS", "DECISION");
            println!("{}", "-".repeat(72));
            let explicit_rules = gate.policy().rules().await;
            for class in ActionClass::ALL {
                let configured = explicit_rules.iter().any(|r| r.action_class == class);
                if explicit && !configured {
                    continue;
                }
                let rule = gate.policy().evaluate(class).await;
                println!("{:<24} {:<22} {}", class, rule.decision, rule.rationale);
            }
            println!("\nAlways enforced: {}", SAFETY_FLOOR_RATIONALE);
            println!(
                "Confirmation timeout: {}s",
                gate.confirmation_timeout().as_secs()
            );
        }
    }
    Ok(())
}
