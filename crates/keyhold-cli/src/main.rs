//! `keyhold` CLI: encrypt, decrypt, validate and redact secret records.
//!
//! Records are the JSON wire form of a secret. Commands that take a record
//! read it from the argument, or from stdin when the argument is `-`.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::io::Read as _;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use keyhold_core::crypto::EncryptionKey;
use keyhold_core::{Kms, KmsConfig, ProviderRegistry, Secret, SecretsConfig};
use tracing::debug;

// ── ANSI color helpers ───────────────────────────────────────────────

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";

// ── CLI structure ────────────────────────────────────────────────────

/// keyhold: secret envelopes with pluggable encryption backends.
#[derive(Parser)]
#[command(
    name = "keyhold",
    version,
    about = "keyhold CLI: encrypt, decrypt, validate and hide secret records",
    long_about = None,
    after_help = format!(
        "{DIM}Environment variables:{RESET}\n  \
         KEYHOLD_KMS_URL               Backend URL (default: local://)\n  \
         KEYHOLD_KMS_MASTER_KEY        Inline master key\n  \
         KEYHOLD_KMS_MASTER_KEY_PATH   File holding the master key\n\n\
         {DIM}Examples:{RESET}\n  \
         keyhold encrypt 'hunter2' --additional-data user-42 > secret.json\n  \
         keyhold decrypt - < secret.json\n  \
         keyhold --url builtin:// encrypt 'hunter2'"
    ),
)]
struct Cli {
    /// Backend URL; its scheme selects the provider for new secrets.
    #[arg(long, global = true, env = "KEYHOLD_KMS_URL")]
    url: Option<String>,

    /// Inline master key. Takes precedence over --master-key-path.
    #[arg(long, global = true, env = "KEYHOLD_KMS_MASTER_KEY", hide_env_values = true)]
    master_key: Option<String>,

    /// File holding the master key.
    #[arg(long, global = true, env = "KEYHOLD_KMS_MASTER_KEY_PATH")]
    master_key_path: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a plaintext and print the JSON record.
    Encrypt {
        /// The value to protect.
        plaintext: String,
        /// Context bound to the ciphertext; needed again to decrypt.
        #[arg(long, default_value = "")]
        additional_data: String,
    },
    /// Decrypt a JSON record and print the plaintext.
    Decrypt {
        /// JSON record, or `-` to read it from stdin.
        record: String,
    },
    /// Check a JSON record and report whether it is valid.
    Validate {
        /// JSON record, or `-` to read it from stdin.
        record: String,
        /// Only apply the user-input rules, not the key length checks.
        #[arg(long, default_value = "false")]
        input: bool,
    },
    /// Drop key and additional data from a record and print it.
    Hide {
        /// JSON record, or `-` to read it from stdin.
        record: String,
    },
    /// List registered providers and the one the URL selects.
    Providers,
    /// Print a fresh random master key (64 hex characters).
    #[command(name = "gen-key")]
    GenKey,
}

impl Cli {
    fn kms_config(&self) -> KmsConfig {
        KmsConfig {
            secrets: SecretsConfig {
                url: self.url.clone().unwrap_or_default(),
                master_key_path: self.master_key_path.clone(),
                master_key_string: self.master_key.clone(),
            },
        }
    }
}

// ── Command dispatch ─────────────────────────────────────────────────

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{RED}{BOLD}✗ Error:{RESET} {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Encrypt {
            plaintext,
            additional_data,
        } => cmd_encrypt(&load_kms(cli)?, plaintext, additional_data),
        Commands::Decrypt { record } => cmd_decrypt(&load_kms(cli)?, record),
        Commands::Validate { record, input } => cmd_validate(&load_kms(cli)?, record, *input),
        Commands::Hide { record } => cmd_hide(&load_kms(cli)?, record),
        Commands::Providers => {
            cmd_providers(&load_kms(cli)?);
            Ok(())
        }
        Commands::GenKey => {
            println!("{}", EncryptionKey::generate().to_hex());
            Ok(())
        }
    }
}

fn load_kms(cli: &Cli) -> Result<Kms> {
    let kms = Kms::initialize(&cli.kms_config(), ProviderRegistry::with_defaults())
        .context("failed to load KMS configuration")?;
    debug!(url = kms.config().url(), "kms initialized");
    Ok(kms)
}

// ── Commands ─────────────────────────────────────────────────────────

fn cmd_encrypt(kms: &Kms, plaintext: &str, additional_data: &str) -> Result<()> {
    let secret = kms.plain_secret(plaintext);
    secret.set_additional_data(additional_data.to_owned());
    secret.encrypt().context("encryption failed")?;
    print_record(&secret)
}

fn cmd_decrypt(kms: &Kms, record: &str) -> Result<()> {
    let secret = load_record(kms, record)?;
    secret.try_decrypt().context("decryption failed")?;
    if secret.is_redacted() {
        bail!("secret is redacted and has no recoverable value");
    }
    if !secret.is_plain() {
        bail!("record holds no secret value");
    }
    println!("{}", secret.payload());
    Ok(())
}

fn cmd_validate(kms: &Kms, record: &str, input_only: bool) -> Result<()> {
    let secret = load_record(kms, record)?;
    let result = if input_only {
        secret.validate_input()
    } else {
        secret.validate()
    };
    result.context("secret is not valid")?;

    let status = secret.status().map_or("-", keyhold_core::SecretStatus::as_str);
    println!("{GREEN}{BOLD}✓{RESET} valid {DIM}({status}){RESET}");
    Ok(())
}

fn cmd_hide(kms: &Kms, record: &str) -> Result<()> {
    let secret = load_record(kms, record)?;
    secret.hide();
    print_record(&secret)
}

fn cmd_providers(kms: &Kms) {
    let url = kms.config().url();
    let active = kms.registry().for_url(url).map(|entry| entry.scheme().to_owned());

    println!("{BOLD}{CYAN}Providers{RESET} {DIM}(url: {url}){RESET}");
    for entry in kms.registry().iter() {
        let marker = if active.as_deref() == Some(entry.scheme()) {
            format!("{GREEN}*{RESET}")
        } else {
            " ".to_owned()
        };
        println!(
            "{marker} {:<16} {}",
            entry.scheme(),
            entry.encrypted_status()
        );
    }
    if active.is_none() {
        println!("{DIM}no scheme matches the URL; new secrets use the local provider{RESET}");
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn read_record(arg: &str) -> Result<String> {
    if arg != "-" {
        return Ok(arg.to_owned());
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read record from stdin")?;
    Ok(buf)
}

fn load_record(kms: &Kms, arg: &str) -> Result<Secret> {
    let record = read_record(arg)?;
    kms.secret_from_json(record.trim().as_bytes())
        .context("failed to parse secret record")
}

fn print_record(secret: &Secret) -> Result<()> {
    let json = serde_json::to_string(secret).context("failed to serialize secret")?;
    println!("{json}");
    Ok(())
}
