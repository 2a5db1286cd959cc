// crates/threatveil-cli/src/main.rs
// ============================================================================
// Module: ThreatVeil Token CLI
// Description: Issues signed tokens for the internal rescan endpoint.
// Purpose: Give internal automation a way to mint short-lived API tokens.
// Dependencies: clap, jsonwebtoken, threatveil-core
// ============================================================================

//! ## Overview
//! `threatveil-token issue` mints an HS256 token signed with `JWT_SECRET`
//! for the internal rescan endpoint. Tokens are short-lived by default and
//! the secret is never echoed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use serde::Serialize;
use thiserror::Error;
use threatveil_core::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default token lifetime in minutes.
const DEFAULT_EXPIRES_MINUTES: i64 = 30;
/// Secret placeholder that is refused outright.
const PLACEHOLDER_SECRET: &str = "change_me";

// ============================================================================
// SECTION: CLI Definition
// ============================================================================

/// Token issuer for the internal rescan endpoint.
#[derive(Debug, Parser)]
#[command(name = "threatveil-token", version, about)]
struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Issues a signed token.
    Issue {
        /// Token subject (caller identity).
        #[arg(long)]
        subject: String,
        /// Lifetime in minutes.
        #[arg(long, default_value_t = DEFAULT_EXPIRES_MINUTES)]
        expires_minutes: i64,
    },
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI errors.
#[derive(Debug, Error)]
enum CliError {
    /// The signing secret is missing or the placeholder.
    #[error("JWT_SECRET must be set to a non-default value")]
    MissingSecret,
    /// Token encoding failed.
    #[error("failed to encode token: {0}")]
    Encode(String),
    /// Writing to stdout failed.
    #[error("failed to write output: {0}")]
    Output(String),
}

// ============================================================================
// SECTION: Claims
// ============================================================================

/// Token claims.
#[derive(Debug, Serialize)]
struct Claims {
    /// Token subject.
    sub: String,
    /// Expiry as unix seconds.
    exp: i64,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Process entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = writeln!(std::io::stderr(), "error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Dispatches the parsed command.
fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Issue {
            subject,
            expires_minutes,
        } => issue(&subject, expires_minutes),
    }
}

/// Issues a token and prints it on one line.
fn issue(subject: &str, expires_minutes: i64) -> Result<(), CliError> {
    let secret = std::env::var("JWT_SECRET")
        .ok()
        .filter(|secret| !secret.trim().is_empty() && secret != PLACEHOLDER_SECRET)
        .ok_or(CliError::MissingSecret)?;
    let claims = Claims {
        sub: subject.to_string(),
        exp: Timestamp::now().plus_seconds(expires_minutes.saturating_mul(60)).unix_seconds(),
    };
    let token =
        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
            .map_err(|err| CliError::Encode(err.to_string()))?;
    write_stdout_line(&token)
}

/// Writes one line to stdout without the stdout print macros.
fn write_stdout_line(line: &str) -> Result<(), CliError> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "{line}").map_err(|err| CliError::Output(err.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use clap::Parser;

    use super::Cli;
    use super::Command;

    #[test]
    fn issue_arguments_parse() {
        let cli =
            Cli::parse_from(["threatveil-token", "issue", "--subject", "ops"]);
        let Command::Issue {
            subject,
            expires_minutes,
        } = cli.command;
        assert_eq!(subject, "ops");
        assert_eq!(expires_minutes, super::DEFAULT_EXPIRES_MINUTES);
    }

    #[test]
    fn expiry_override_parses() {
        let cli = Cli::parse_from([
            "threatveil-token",
            "issue",
            "--subject",
            "ops",
            "--expires-minutes",
            "5",
        ]);
        let Command::Issue {
            expires_minutes, ..
        } = cli.command;
        assert_eq!(expires_minutes, 5);
    }
}
