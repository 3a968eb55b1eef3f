use crate::cert::record::Tier;
use crate::cert::serial::SerialNumber;
use crate::keys::provider::KeyBits;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "certmint")]
#[command(version = "1.0.0")]
#[command(about = "A minimal certificate authority for managing RSA key lifecycles")]
#[command(long_about = None)]
pub struct Cli {
    /// CA home directory (store, revocations, anchors, keys)
    #[arg(long, env = "CERTMINT_HOME")]
    pub home: Option<PathBuf>,

    /// Enable verbose logging (repeat for more verbosity: -v INFO, -vv DEBUG, -vvv TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Output raw tab-separated values (no formatting)
    #[arg(short, long)]
    pub raw: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bootstrap a new self-signed root certificate
    IssueRoot {
        /// Subject identifier
        #[arg(long)]
        subject: String,
        /// Key size (2048, 3072, or 4096; falls back to config default)
        #[arg(long)]
        bits: Option<KeyBits>,
        /// Validity length in days (falls back to config default)
        #[arg(long)]
        days: Option<u32>,
    },
    /// Issue an intermediate certificate under a root
    IssueIntermediate {
        /// Issuer (root) serial number
        #[arg(long)]
        issuer: SerialNumber,
        /// Subject identifier
        #[arg(long)]
        subject: String,
        /// Validity length in days (falls back to config default)
        #[arg(long)]
        days: Option<u32>,
        /// Subject public key PEM file (PKCS#1 or SPKI)
        #[arg(long, conflicts_with = "bits")]
        key: Option<PathBuf>,
        /// Generate a fresh key pair of this size instead
        #[arg(long)]
        bits: Option<KeyBits>,
    },
    /// Issue a leaf certificate under an intermediate
    IssueLeaf {
        /// Issuer (intermediate) serial number
        #[arg(long)]
        issuer: SerialNumber,
        /// Subject identifier
        #[arg(long)]
        subject: String,
        /// Validity length in days (falls back to config default)
        #[arg(long)]
        days: Option<u32>,
        /// Subject public key PEM file (PKCS#1 or SPKI)
        #[arg(long, conflicts_with = "bits")]
        key: Option<PathBuf>,
        /// Generate a fresh key pair of this size instead
        #[arg(long)]
        bits: Option<KeyBits>,
    },
    /// Revoke a certificate by serial
    Revoke {
        /// Certificate serial number
        #[arg(long)]
        serial: SerialNumber,
        /// Revocation reason
        #[arg(long)]
        reason: String,
    },
    /// Validate a certificate chain
    Validate {
        /// Certificate serial number
        #[arg(long)]
        serial: SerialNumber,
        /// Evaluation instant (RFC 3339; defaults to now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// List certificates in issuance order
    List {
        /// Filter by tier (root, intermediate, leaf)
        #[arg(long)]
        tier: Option<Tier>,
        /// Filter by issuer serial
        #[arg(long)]
        issuer: Option<SerialNumber>,
        /// Columns to display (comma-separated): serial,subject,issuer,tier,not_before,not_after,fingerprint,revoked,expired. Use +column to append to defaults.
        #[arg(long)]
        columns: Option<String>,
    },
    /// Show certificate details by serial
    Show {
        /// Certificate serial number
        #[arg(long)]
        serial: SerialNumber,
    },
    /// Export certificates, revocations, and anchors as a bundle
    Export {
        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Import a previously exported bundle
    Import {
        /// Bundle file path
        #[arg(long)]
        input: PathBuf,
    },
    /// Key pair operations
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },
    /// Generate shell completion scripts
    Completion {
        #[command(subcommand)]
        command: CompletionCommands,
    },
    /// Internal completion helpers (hidden)
    #[command(hide = true)]
    CompletionHelper {
        #[command(subcommand)]
        command: CompletionHelperCommands,
    },
}

#[derive(Subcommand)]
pub enum KeyCommands {
    /// Generate a key pair and print it with timing and strength info
    Generate {
        /// Key size (2048, 3072, or 4096)
        #[arg(long)]
        bits: Option<KeyBits>,
    },
    /// Generate a key pair and run an OAEP encrypt/decrypt round trip
    SelfTest {
        /// Key size (2048, 3072, or 4096)
        #[arg(long)]
        bits: Option<KeyBits>,
    },
}

#[derive(Subcommand)]
pub enum CompletionCommands {
    /// Generate bash completion script
    Bash,
    /// Generate zsh completion script
    Zsh,
    /// Generate fish completion script
    Fish,
    /// Generate PowerShell completion script
    PowerShell,
}

impl CompletionCommands {
    pub fn shell(&self) -> Shell {
        match self {
            CompletionCommands::Bash => Shell::Bash,
            CompletionCommands::Zsh => Shell::Zsh,
            CompletionCommands::Fish => Shell::Fish,
            CompletionCommands::PowerShell => Shell::PowerShell,
        }
    }
}

#[derive(Subcommand)]
pub enum CompletionHelperCommands {
    /// List column names for completion
    Columns,
}
