//! recap-cli: terminal client for the Recap HTTP API
//!
//! # Subcommands
//! - `ask <question> [--json]`: ask about past interview meetings
//! - `status`: show server health

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "recap-cli",
    version,
    about = "Ask questions about past interview meetings"
)]
struct Cli {
    /// Recap HTTP server URL (overrides RECAP_HTTP_URL env var)
    #[arg(long, env = "RECAP_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ask a question, e.g. "On July 10 what did we discuss with ABC Corp?"
    Ask {
        /// Free-text question
        question: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Show Recap server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

/// Body of a successful POST /chat
#[derive(Debug, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
}

/// Body of a failed POST /chat
#[derive(Debug, Deserialize)]
pub struct ChatFailure {
    pub error: String,
    #[serde(default)]
    pub kind: Option<String>,
}

/// Human-readable rendering of a failed request.
pub fn describe_failure(status: u16, body: &str) -> String {
    match serde_json::from_str::<ChatFailure>(body) {
        Ok(f) => match f.kind {
            Some(kind) => format!("{} ({}, HTTP {})", f.error, kind, status),
            None => format!("{} (HTTP {})", f.error, status),
        },
        Err(_) => format!("server returned HTTP {}: {}", status, body.trim()),
    }
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

/// Ask a question via POST /chat.
fn do_ask(server: &str, question: &str, json_output: bool) -> anyhow::Result<()> {
    // Two model calls plus backend round trips; allow generous time.
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(150))
        .build()?;

    let url = format!("{}/chat", server);
    let body = serde_json::json!({ "question": question });

    let resp = match client.post(&url).json(&body).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("recap-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let text = resp.text().unwrap_or_default();

    if !status.is_success() {
        eprintln!("recap-cli: {}", describe_failure(status.as_u16(), &text));
        std::process::exit(1);
    }

    if json_output {
        println!("{}", text);
        return Ok(());
    }

    match serde_json::from_str::<ChatAnswer>(&text) {
        Ok(a) => println!("{}", a.answer),
        Err(e) => {
            eprintln!("recap-cli: failed to parse chat response: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .build()?;

    let url = format!("{}/health", server);
    let resp = client.get(&url).send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Recap server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:      {}", body["version"].as_str().unwrap_or("?"));
            println!("Backend:      {}", body["backend"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            let status = r.status();
            let body: serde_json::Value = r.json().unwrap_or_default();
            eprintln!(
                "recap-cli: server unhealthy (HTTP {}): {}",
                status,
                body["error"].as_str().unwrap_or("unknown error")
            );
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("recap-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Ask { question, json } => do_ask(&server, &question, json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("recap-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_failure_uses_server_message() {
        let body = r#"{"error":"no interview records matched the question","status":"error","kind":"no_candidate_found"}"#;
        assert_eq!(
            describe_failure(404, body),
            "no interview records matched the question (no_candidate_found, HTTP 404)"
        );
    }

    #[test]
    fn test_describe_failure_without_kind() {
        let body = r#"{"error":"bad request"}"#;
        assert_eq!(describe_failure(400, body), "bad request (HTTP 400)");
    }

    #[test]
    fn test_describe_failure_non_json_body() {
        assert_eq!(
            describe_failure(502, "  Bad Gateway\n"),
            "server returned HTTP 502: Bad Gateway"
        );
    }

    #[test]
    fn test_chat_answer_parses() {
        let a: ChatAnswer = serde_json::from_str(r#"{"answer":"- point\nNext step: call"}"#).unwrap();
        assert!(a.answer.starts_with("- point"));
    }

    #[test]
    fn test_cli_parses_ask() {
        let cli = Cli::try_parse_from(["recap-cli", "ask", "What did ABC Corp say?", "--json"])
            .expect("ask should parse");
        match cli.command {
            Commands::Ask { question, json } => {
                assert_eq!(question, "What did ABC Corp say?");
                assert!(json);
            }
            _ => panic!("Expected Ask"),
        }
    }
}
