//! Confirmers for interactive use.

use std::io::{BufRead, Write};

use async_trait::async_trait;

use crate::gate::{ConfirmationRequest, ConfirmationResponse, Confirmer};

/// Asks on the terminal. Anything but `y`/`yes` denies.
#[derive(Debug, Default)]
pub struct StdinConfirmer;

fn prompt_text(request: &ConfirmationRequest) -> String {
    format!(
        "\nTool '{}' ({}) requires confirmation: {}\nParameters: {}\nAllow? [y/N] ",
        request.tool_name, request.action_class, request.rationale, request.params
    )
}

fn parse_answer(answer: &str) -> ConfirmationResponse {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => ConfirmationResponse::Granted,
        _ => ConfirmationResponse::denied("declined at the terminal"),
    }
}

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm(&self, request: ConfirmationRequest) -> ConfirmationResponse {
        let text = prompt_text(&request);
        let answer = tokio::task::spawn_blocking(move || {
            let mut stderr = std::io::stderr();
            let _ = write!(stderr, "{text}");
            let _ = stderr.flush();
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => parse_answer(&line),
            Ok(Err(e)) => ConfirmationResponse::denied(format!("could not read answer: {e}")),
            Err(_) => ConfirmationResponse::denied("confirmation cancelled"),
        }
    }
}

/// Grants every request. Backs `--yes`.
#[derive(Debug, Default)]
pub struct AutoGrantConfirmer;

#[async_trait]
impl Confirmer for AutoGrantConfirmer {
    async fn confirm(&self, request: ConfirmationRequest) -> ConfirmationResponse {
        tracing::info!(tool_name = %request.tool_name, "Confirmation granted by --yes");
        ConfirmationResponse::Granted
    }
}
