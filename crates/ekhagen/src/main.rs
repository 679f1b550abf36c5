#![forbid(unsafe_code)]

//! ekhagen CLI: inspect PKCS#12 keystores.

use clap::{Parser, Subcommand};
use ekhagen_core::{oid, DisabledAlgorithms, Error};
use ekhagen_crypto::HashAlgorithm;
use ekhagen_pkcs12::{load, EntryKind, KeystoreEntry, LoadOptions, OrphanKeyPolicy, Password};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(
    name = "ekhagen",
    about = "ekhagen: PKCS#12 keystore reader (legacy PBE, PBES2, GM SM3/SM4)",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the entries of a PKCS#12 file
    List {
        /// Input .p12 / .pfx file
        file: PathBuf,

        /// Store password
        #[arg(short, long, env = "EKHAGEN_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Read the store password from the first line of a file
        #[arg(long = "password-file", conflicts_with = "password")]
        password_file: Option<PathBuf>,

        /// Password for private keys, if different from the store password
        #[arg(long = "entry-password", env = "EKHAGEN_ENTRY_PASSWORD", hide_env_values = true)]
        entry_password: Option<String>,

        /// Disable algorithms by name (e.g. SHA1,RC2,PBEWithSHA1AndDESede)
        #[arg(long, env = "EKHAGEN_DISABLED_ALGORITHMS", value_delimiter = ',')]
        disable: Vec<String>,

        /// Leave out private keys that have no certificate
        #[arg(long = "drop-orphan-keys")]
        drop_orphan_keys: bool,

        /// Accept files without an integrity MAC
        #[arg(long = "allow-missing-mac")]
        allow_missing_mac: bool,

        /// Reject iteration counts above this value
        #[arg(long = "max-iterations")]
        max_iterations: Option<u32>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List supported algorithms
    Info,
}

struct ListArgs {
    file: PathBuf,
    password: Option<String>,
    password_file: Option<PathBuf>,
    entry_password: Option<String>,
    disable: Vec<String>,
    drop_orphan_keys: bool,
    allow_missing_mac: bool,
    max_iterations: Option<u32>,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::List {
            file,
            password,
            password_file,
            entry_password,
            disable,
            drop_orphan_keys,
            allow_missing_mac,
            max_iterations,
            verbose,
        } => {
            init_logging(verbose);
            cmd_list(ListArgs {
                file,
                password,
                password_file,
                entry_password,
                disable,
                drop_orphan_keys,
                allow_missing_mac,
                max_iterations,
            })
        }

        Commands::Info => cmd_info(),
    };

    if let Err(e) = result {
        tracing::debug!("failed in {} stage", e.stage());
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise `--verbose` selects debug output.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_list(args: ListArgs) -> Result<(), Error> {
    let data = read_file(&args.file)?;
    let password = match (args.password, &args.password_file) {
        (Some(p), _) => Password::new(p),
        (None, Some(path)) => read_password_file(path)?,
        (None, None) => {
            tracing::debug!("no password given, using the empty password");
            Password::new("")
        }
    };

    let mut options = LoadOptions::new().allow_missing_mac(args.allow_missing_mac);
    if let Some(p) = args.entry_password {
        options = options.entry_password(Password::new(p));
    }
    if args.drop_orphan_keys {
        options = options.orphan_keys(OrphanKeyPolicy::Drop);
    }
    if let Some(n) = args.max_iterations {
        options = options.max_iterations(n);
    }
    if !args.disable.is_empty() {
        let policy = DisabledAlgorithms::from_property(&args.disable.join(","));
        tracing::debug!("disabled algorithms: {:?}", policy.names().collect::<Vec<_>>());
        options = options.policy(Arc::new(policy));
    }

    let store = load(&data, &password, &options)?;

    println!("Keystore type: PKCS12");
    println!(
        "Keystore contains {} entr{}",
        store.len(),
        if store.len() == 1 { "y" } else { "ies" }
    );
    for entry in &store {
        println!();
        print_entry(entry);
    }
    Ok(())
}

fn print_entry(entry: &KeystoreEntry) {
    println!("{}, {}", entry.alias, entry.kind());
    if let Some(subject) = entry.subject() {
        println!("  Subject: {subject}");
    }
    match entry.kind() {
        EntryKind::PrivateKey => {
            println!("  Certificate chain length: {}", entry.certificate_chain.len());
        }
        EntryKind::SecretKey => {
            if let Some(secret) = &entry.secret_key {
                println!("  Algorithm: {}", oid::describe(&secret.algorithm));
                println!("  Key size: {} bits", secret.key.len() * 8);
            }
        }
        EntryKind::TrustedCertificate => {}
    }
    if let Some(id) = &entry.local_key_id {
        println!("  Local key id: {}", hex::encode(id));
    }
}

fn cmd_info() -> Result<(), Error> {
    println!("ekhagen: PKCS#12 keystore reader");
    println!();
    println!("Supported PBE schemes:");
    println!("  PBEWithSHA1AndDESede, PBEWithSHA1AndDESede2Key");
    println!("  PBEWithSHA1AndRC2_128, PBEWithSHA1AndRC2_40");
    println!("  PBES2 with PBKDF2 (RFC 8018 and GM/T 0010 identifiers)");
    println!();
    println!("Supported PBES2 ciphers:");
    println!("  AES-128/192/256-CBC, DESede-CBC, SM4-CBC");
    println!();
    println!("Supported PBKDF2 PRFs and MAC digests:");
    let names: Vec<&str> = HashAlgorithm::ALL.iter().map(|h| h.name()).collect();
    println!("  {}", names.join(", "));
    println!();
    println!("Supported bags:");
    println!("  keyBag, pkcs8ShroudedKeyBag, certBag (X.509), secretBag, safeContentsBag");
    Ok(())
}

// ── Utility functions ────────────────────────────────────────────────

fn read_file(path: &Path) -> Result<Vec<u8>, Error> {
    std::fs::read(path).map_err(|e| with_path(e, path))
}

fn read_password_file(path: &Path) -> Result<Password, Error> {
    let text = Zeroizing::new(std::fs::read_to_string(path).map_err(|e| with_path(e, path))?);
    let line = text.lines().next().unwrap_or_default();
    Ok(Password::new(line))
}

fn with_path(err: std::io::Error, path: &Path) -> Error {
    Error::Io(std::io::Error::new(err.kind(), format!("{}: {err}", path.display())))
}
