//! Audit trail queries over a JSONL file written by the gate.

use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Args;

use crate::audit::{AuditFilter, AuditOutcome, AuditRecord};
use crate::gate::ActionClass;

#[derive(Args, Debug, Clone)]
pub struct AuditArgs {
    /// JSONL audit file (defaults to GATE_AUDIT_JSONL)
    #[arg(short, long, env = "GATE_AUDIT_JSONL")]
    pub file: PathBuf,

    /// Only records for this tool
    #[arg(short, long)]
    pub tool: Option<String>,

    /// Only records of this action class (e.g. FINANCIAL_TRANSACTION)
    #[arg(short, long)]
    pub class: Option<String>,

    /// Only records with this outcome (invoked, rejected, errored, applied)
    #[arg(short, long)]
    pub outcome: Option<String>,

    /// Only records at or after this RFC 3339 timestamp
    #[arg(long)]
    pub since: Option<DateTime<Utc>>,

    /// Show only the most recent N records
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Print raw JSON lines
    #[arg(long)]
    pub json: bool,
}

fn parse_outcome(s: &str) -> anyhow::Result<AuditOutcome> {
    serde_json::from_value(serde_json::Value::String(s.trim().to_ascii_lowercase()))
        .with_context(|| format!("unknown outcome '{s}'"))
}

impl AuditArgs {
    fn filter(&self) -> anyhow::Result<AuditFilter> {
        let mut filter = AuditFilter::new();
        if let Some(tool) = &self.tool {
            filter = filter.tool(tool);
        }
        if let Some(class) = &self.class {
            filter = filter.class(class.parse::<ActionClass>().map_err(anyhow::Error::msg)?);
        }
        if let Some(outcome) = &self.outcome {
            filter = filter.outcome(parse_outcome(outcome)?);
        }
        if let Some(since) = self.since {
            filter = filter.since(since);
        }
        if let Some(limit) = self.limit {
            filter = filter.limit(limit);
        }
        Ok(filter)
    }
}

/// Parse JSONL content, skipping blank lines.
pub(crate) fn parse_records(content: &str) -> anyhow::Result<Vec<AuditRecord>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}: malformed record", i + 1))
        })
        .collect()
}

/// Run the audit command.
pub async fn run_audit_command(args: AuditArgs) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let records = parse_records(&content)?;
    let matched = args.filter()?.apply(&records);

    if matched.is_empty() {
        println!("No audit records match.");
        return Ok(());
    }

    for record in &matched {
        if args.json {
            println!("{}", serde_json::to_string(record)?);
            continue;
        }
        println!(
            "#{:<5} {} {:<26} {:<22} {:<20} {:<10} {}",
            record.sequence,
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.tool_name.as_deref().unwrap_or("(policy update)"),
            record.action_class,
            record.decision,
            record.outcome,
            record.rationale
        );
    }
    println!("\n{} record(s).", matched.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::PolicyDecision;

    fn line(record: &AuditRecord) -> String {
        serde_json::to_string(record).unwrap()
    }

    #[test]
    fn test_parse_and_filter() {
        let mut a = AuditRecord::invocation(
            "get_weather",
            ActionClass::Read,
            PolicyDecision::Allow,
            "no rule defined",
            AuditOutcome::Invoked,
        );
        a.sequence = 0;
        let mut b = AuditRecord::invocation(
            "like_post",
            ActionClass::PublishSocial,
            PolicyDecision::Deny,
            "floor",
            AuditOutcome::Rejected,
        );
        b.sequence = 1;
        let content = format!("{}\n\n{}\n", line(&a), line(&b));
        let records = parse_records(&content).unwrap();
        assert_eq!(records.len(), 2);

        let args = AuditArgs {
            file: PathBuf::from("unused"),
            tool: None,
            class: None,
            outcome: Some("Rejected".to_string()),
            since: None,
            limit: None,
            json: false,
        };
        let matched = args.filter().unwrap().apply(&records);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].tool_name.as_deref(), Some("like_post"));
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let err = parse_records("{}\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_unknown_outcome() {
        assert!(parse_outcome("exploded").is_err());
        assert_eq!(parse_outcome("pending_confirmation").unwrap(), AuditOutcome::PendingConfirmation);
    }
}
