use crate::ca::{CaConfig, CertificateAuthority, TrustAnchors};
use crate::cert::export::ExportBundle;
use crate::cert::record::{ListColumn, ListEntry, Tier, ValidityWindow};
use crate::cert::serial::SerialNumber;
use crate::cert::store::{CertificateStore, ListFilter};
use crate::cli::args::*;
use crate::cli::completions::handle_completion_command;
use crate::keys::keystore::KeyStore;
use crate::keys::provider::{
    private_key_to_pem, public_key_bits, public_key_from_pem, public_key_to_pem, KeyBits,
    RsaKeyPairProvider,
};
use crate::revocation::RevocationRegistry;
use crate::utils::errors::{CertmintError, Result};
use crate::utils::output::{build_table_data, OutputFormat};
use crate::utils::paths::CertmintPaths;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use std::fs;
use std::io;
use std::sync::Arc;
use std::time::Instant;

const SELF_TEST_PROBE: &[u8] = b"certmint OAEP self-test probe";

/// Dispatch a parsed command line. Returns the process exit code:
/// validation outcomes carry their own codes without becoming errors.
pub fn handle_command(cli: Cli) -> Result<i32> {
    // Initialize logging - always to stderr
    if !cli.quiet {
        let log_level = match cli.verbose {
            0 => "certmint=warn",  // Default: warnings only
            1 => "certmint=info",  // -v: info level
            2 => "certmint=debug", // -vv: debug level
            _ => "certmint=trace", // -vvv+: trace level
        };

        tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_env_filter(log_level)
            .init();
    }

    let output = OutputFormat::new(cli.raw);
    let paths = CertmintPaths::resolve(cli.home.clone())?;

    match cli.command {
        Commands::IssueRoot {
            subject,
            bits,
            days,
        } => handle_issue_root(&paths, &subject, bits, days),
        Commands::IssueIntermediate {
            issuer,
            subject,
            days,
            key,
            bits,
        } => handle_issue(&paths, Tier::Intermediate, issuer, &subject, days, key, bits),
        Commands::IssueLeaf {
            issuer,
            subject,
            days,
            key,
            bits,
        } => handle_issue(&paths, Tier::Leaf, issuer, &subject, days, key, bits),
        Commands::Revoke { serial, reason } => handle_revoke(&paths, serial, &reason),
        Commands::Validate { serial, at } => handle_validate(&paths, serial, at),
        Commands::List {
            tier,
            issuer,
            columns,
        } => handle_list(&paths, &output, tier, issuer, columns.as_deref()),
        Commands::Show { serial } => handle_show(&paths, &output, serial),
        Commands::Export { output: path } => {
            let ca = open_authority(&paths, None)?;
            let bundle = ExportBundle::gather(ca.store(), ca.registry(), ca.anchors());
            bundle.write_to(path.as_deref())?;
            Ok(0)
        }
        Commands::Import { input } => {
            let ca = open_authority(&paths, None)?;
            let bundle = ExportBundle::read_from(&input)?;
            let (certs, revocations) = bundle.apply(ca.store(), ca.registry(), ca.anchors())?;
            eprintln!("✓ Imported {certs} certificate(s), {revocations} revocation(s)");
            Ok(0)
        }
        Commands::Key { command } => handle_key_command(&paths, command),
        Commands::Completion { ref command } => {
            handle_completion_command(command)?;
            Ok(0)
        }
        Commands::CompletionHelper { ref command } => {
            match command {
                CompletionHelperCommands::Columns => {
                    for name in ListColumn::NAMES {
                        println!("{name}");
                    }
                }
            }
            Ok(0)
        }
    }
}

/// Open the CA over the home directory. A passphrase is needed only
/// for commands that sign; read-only commands never touch key files.
fn open_authority(paths: &CertmintPaths, passphrase: Option<String>) -> Result<CertificateAuthority> {
    paths.ensure_all_dirs()?;

    let store = Arc::new(CertificateStore::open(paths.cert_log())?);
    let registry = Arc::new(RevocationRegistry::open(paths.revocation_log())?);
    let anchors = Arc::new(TrustAnchors::open(paths.anchors_file())?);
    let keystore = KeyStore::open(paths.keys_dir(), passphrase.unwrap_or_default())?;

    Ok(CertificateAuthority::new(
        store,
        registry,
        anchors,
        Arc::new(RsaKeyPairProvider::new()),
        keystore,
    ))
}

fn load_config(paths: &CertmintPaths) -> Result<CaConfig> {
    CaConfig::load(&paths.config_file()?)
}

fn handle_issue_root(
    paths: &CertmintPaths,
    subject: &str,
    bits: Option<KeyBits>,
    days: Option<u32>,
) -> Result<i32> {
    let config = load_config(paths)?;
    let bits = config.bits_for(bits)?;
    let days = config.days_for(Tier::Root, days)?;

    let passphrase = KeyStore::read_passphrase()?;
    let ca = open_authority(paths, Some(passphrase))?;

    eprintln!("Issuing root certificate for subject: {subject}");
    eprintln!("Key size: {bits} bits, validity: {days} days");

    let record = ca.issue_root(subject, bits, ValidityWindow::starting_now(days))?;
    eprintln!("✓ Root certificate issued with serial: {}", record.serial);
    eprintln!("✓ Serial registered as trust anchor");

    println!("{}", record.serial);
    Ok(0)
}

fn handle_issue(
    paths: &CertmintPaths,
    tier: Tier,
    issuer: SerialNumber,
    subject: &str,
    days: Option<u32>,
    key: Option<std::path::PathBuf>,
    bits: Option<KeyBits>,
) -> Result<i32> {
    let config = load_config(paths)?;
    let days = config.days_for(tier, days)?;
    let window = ValidityWindow::starting_now(days);

    let passphrase = KeyStore::read_passphrase()?;
    let ca = open_authority(paths, Some(passphrase))?;

    eprintln!("Issuing {tier} certificate for subject: {subject}");
    eprintln!("Issuer serial: {issuer}, validity: {days} days");

    match key {
        Some(pem_path) => {
            // Externally held subject key
            let pem = fs::read_to_string(&pem_path)?;
            let public_der = public_key_from_pem(&pem)?;
            let record = ca.issue(subject, &public_der, tier, window, issuer)?;

            eprintln!("✓ Certificate issued with serial: {}", record.serial);
            println!("{}", record.serial);
        }
        None => {
            let bits = config.bits_for(bits)?;
            let (record, pair) = ca.issue_generated(subject, bits, tier, window, issuer)?;

            eprintln!("✓ Certificate issued with serial: {}", record.serial);
            if tier == Tier::Intermediate {
                eprintln!("✓ Private key stored encrypted for leaf signing");
            }
            eprintln!("Generated key pair follows; the private key is the subject's to keep.");

            println!("{}", record.serial);
            print!("{}", public_key_to_pem(&pair.public_der)?);
            print!("{}", private_key_to_pem(&pair.private_der)?);
        }
    }

    Ok(0)
}

fn handle_revoke(paths: &CertmintPaths, serial: SerialNumber, reason: &str) -> Result<i32> {
    let ca = open_authority(paths, None)?;
    ca.revoke(serial, reason)?;
    eprintln!("✓ Certificate {serial} revoked");
    Ok(0)
}

fn handle_validate(
    paths: &CertmintPaths,
    serial: SerialNumber,
    at: Option<chrono::DateTime<Utc>>,
) -> Result<i32> {
    let ca = open_authority(paths, None)?;
    let at = at.unwrap_or_else(Utc::now);

    let outcome = ca.validate(serial, at)?;
    println!("{outcome}");
    Ok(outcome.exit_code())
}

fn handle_list(
    paths: &CertmintPaths,
    output: &OutputFormat,
    tier: Option<Tier>,
    issuer: Option<SerialNumber>,
    columns: Option<&str>,
) -> Result<i32> {
    let filter = match (tier, issuer) {
        (Some(_), Some(_)) => {
            return Err(CertmintError::InvalidInput(
                "Pass either --tier or --issuer, not both".to_string(),
            ))
        }
        (Some(tier), None) => ListFilter::Tier(tier),
        (None, Some(serial)) => ListFilter::Issuer(serial),
        (None, None) => ListFilter::All,
    };

    let columns = ListColumn::parse_spec(columns).map_err(CertmintError::InvalidInput)?;

    let ca = open_authority(paths, None)?;
    let entries: Vec<ListEntry> = ca
        .store()
        .list(filter)
        .map(|record| {
            let revoked = ca.registry().is_revoked(record.serial);
            ListEntry { record, revoked }
        })
        .collect();

    if entries.is_empty() {
        eprintln!("No certificates found");
        return Ok(0);
    }

    let data = build_table_data(&entries, &columns);
    output.print_table(&data);
    Ok(0)
}

fn handle_show(paths: &CertmintPaths, output: &OutputFormat, serial: SerialNumber) -> Result<i32> {
    let ca = open_authority(paths, None)?;
    let record = ca
        .store()
        .get(serial)
        .ok_or(CertmintError::UnknownSerial(serial))?;

    let mut pairs: Vec<(String, String)> = vec![
        ("Serial:".to_string(), record.serial.to_string()),
        ("Subject:".to_string(), record.subject.clone()),
        ("Issuer:".to_string(), record.issuer.to_string()),
        ("Tier:".to_string(), record.tier.to_string()),
        (
            "Not Before:".to_string(),
            record.not_before.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ),
        (
            "Not After:".to_string(),
            record.not_after.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ),
        ("Fingerprint:".to_string(), record.fingerprint.clone()),
    ];

    if let Some(bits) = public_key_bits(&record.public_key) {
        let profile = bits.profile();
        pairs.push(("Key Size:".to_string(), format!("{bits} bits")));
        pairs.push((
            "Security:".to_string(),
            format!(
                "{} ({}-bit), {}",
                profile.label, profile.security_bits, profile.horizon
            ),
        ));
    }

    match ca.registry().reason_for(serial) {
        Some(entry) => {
            pairs.push((
                "Revoked:".to_string(),
                format!(
                    "{} ({})",
                    entry.revoked_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    entry.reason
                ),
            ));
        }
        None if record.is_expired() => pairs.push(("Status:".to_string(), "expired".to_string())),
        None => pairs.push(("Status:".to_string(), "active".to_string())),
    }

    output.print_key_value(&pairs);
    Ok(0)
}

fn handle_key_command(paths: &CertmintPaths, command: KeyCommands) -> Result<i32> {
    let config = load_config(paths)?;
    let provider = RsaKeyPairProvider::new();
    use crate::keys::provider::KeyPairProvider;

    match command {
        KeyCommands::Generate { bits } => {
            let bits = config.bits_for(bits)?;
            let profile = bits.profile();

            eprintln!("Generating {bits}-bit RSA key pair...");
            let started = Instant::now();
            let pair = provider.generate(bits)?;
            let elapsed = started.elapsed();

            eprintln!("✓ Generated in {:.2}s", elapsed.as_secs_f64());
            eprintln!(
                "Security: {} ({}-bit), {}",
                profile.label, profile.security_bits, profile.horizon
            );
            eprintln!("Recommended use: {}", profile.recommended_use);

            print!("{}", public_key_to_pem(&pair.public_der)?);
            print!("{}", private_key_to_pem(&pair.private_der)?);
            Ok(0)
        }
        KeyCommands::SelfTest { bits } => {
            let bits = config.bits_for(bits)?;

            eprintln!("Generating {bits}-bit RSA key pair...");
            let pair = provider.generate(bits)?;

            let ciphertext = provider.encrypt(&pair.public_der, SELF_TEST_PROBE)?;
            println!(
                "Ciphertext: {}",
                general_purpose::STANDARD.encode(&ciphertext)
            );

            let recovered = provider.decrypt(&pair.private_der, &ciphertext)?;
            let recovered_text = String::from_utf8_lossy(&recovered);
            println!("Recovered:  {recovered_text}");

            if recovered != SELF_TEST_PROBE {
                return Err(CertmintError::Crypto(
                    "OAEP round trip mismatch".to_string(),
                ));
            }
            eprintln!("✓ OAEP round trip verified");
            Ok(0)
        }
    }
}
