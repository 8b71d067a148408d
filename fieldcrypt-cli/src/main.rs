//! `fieldcrypt` CLI for one-off envelopes, fingerprints and document traversal.
//!
//! Settings are read from the environment (`DATABASE_ENCRYPTION` is
//! required). Logs go to stderr; results go to stdout.

#![warn(clippy::pedantic, clippy::nursery)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fieldcrypt::config::Settings;
use fieldcrypt::dynamic::Document;
use fieldcrypt::engine::FieldEngine;
use fieldcrypt::token::random_token;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fieldcrypt")]
#[command(about = "Field-level encryption for document records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a single value into an envelope
    Encrypt {
        /// Plaintext value
        value: String,
    },
    /// Decrypt a single envelope
    Decrypt {
        /// `AES256:` or `AES256GCM:` envelope
        envelope: String,
    },
    /// Print the fingerprint of a value
    Fingerprint {
        /// Plaintext value
        value: String,
    },
    /// Encrypt and fingerprint every eligible field of a JSON document
    EncryptDoc {
        /// Input file (stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Decrypt a stored JSON document and strip its fingerprints
    DecryptDoc {
        /// Input file (stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Rewrite a plaintext equality filter into a fingerprint filter
    Filter {
        /// Input file (stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Generate a random URL-safe token
    Token,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::from_env().context("failed to load settings from the environment")?;
    init_tracing(&settings.log_level)?;
    let engine = settings.build_engine().context("failed to build field engine")?;

    run(&engine, cli.command)
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise tracing subscriber: {e}"))
}

fn run(engine: &FieldEngine, command: Commands) -> Result<()> {
    match command {
        Commands::Encrypt { value } => {
            println!("{}", engine.encrypt(&value).context("failed to encrypt value")?);
        }
        Commands::Decrypt { envelope } => {
            println!("{}", engine.decrypt(&envelope).context("failed to decrypt envelope")?);
        }
        Commands::Fingerprint { value } => {
            println!("{}", engine.fingerprint(&value));
        }
        Commands::EncryptDoc { input } => {
            let mut doc = read_document(input.as_deref())?;
            engine.encrypt_by_policy(&mut doc).context("failed to encrypt document")?;
            print_document(doc)?;
        }
        Commands::DecryptDoc { input } => {
            let mut doc = read_document(input.as_deref())?;
            engine.decrypt_by_policy(&mut doc).context("failed to decrypt document")?;
            print_document(doc)?;
        }
        Commands::Filter { input } => {
            let mut filter = read_document(input.as_deref())?;
            engine.rewrite_filter_to_fingerprints(&mut filter);
            print_document(filter)?;
        }
        Commands::Token => {
            println!("{}", random_token().context("failed to generate token")?);
        }
    }
    Ok(())
}

fn read_document(input: Option<&Path>) -> Result<Document> {
    let raw = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("failed to read stdin")?;
            buf
        }
    };

    match serde_json::from_str(&raw).context("input is not valid JSON")? {
        Value::Object(doc) => Ok(doc),
        other => bail!("expected a JSON object, got {}", kind(&other)),
    }
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn print_document(doc: Document) -> Result<()> {
    let rendered = serde_json::to_string_pretty(&Value::Object(doc))
        .context("failed to render document")?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_doc_subcommand() {
        let cli = Cli::try_parse_from(["fieldcrypt", "encrypt-doc", "--input", "user.json"]).unwrap();
        assert!(matches!(cli.command, Commands::EncryptDoc { input: Some(_) }));
    }

    #[test]
    fn test_read_document_rejects_non_object() {
        let dir = std::env::temp_dir().join(format!("fieldcrypt-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("array.json");
        std::fs::write(&path, "[1, 2]").unwrap();

        let err = read_document(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("an array"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
