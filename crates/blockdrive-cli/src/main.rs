//! BlockDrive recovery CLI.
//!
//! Recovers a single file from its content CID, proof identifier and a
//! wallet signature, without any BlockDrive service.
//!
//! # Environment Variables
//!
//! - `BLOCKDRIVE_IPFS_GATEWAYS` - Comma-separated gateway list
//! - `BLOCKDRIVE_PROOF_URL` - Proof store base URL
//! - `BLOCKDRIVE_TIMEOUT_SECS` - Per-request timeout
//! - `BLOCKDRIVE_RPC_URL` - Solana RPC endpoint for `--verify-onchain`
//! - `BLOCKDRIVE_PROGRAM_ID` - BlockDrive program id
//! - `BLOCKDRIVE_FILEBASE_ACCESS_KEY`, `BLOCKDRIVE_FILEBASE_SECRET_KEY`,
//!   `BLOCKDRIVE_FILEBASE_BUCKET` - Filebase S3 access for `--s3`
//! - `RUST_LOG` - Log filter (overridden by `-v` / `-q`)
//!
//! # Examples
//!
//! ```bash
//! # Print the message to sign for level 2
//! blockdrive-recover -l 2 --print-message
//!
//! # Recover with a hex signature
//! blockdrive-recover -c bafybeig... -p proof_abc -l 1 --sig-hex 3a4b5c... -o report.pdf
//!
//! # Prompt for the signature
//! blockdrive-recover -c bafybeig... -p proof_abc -l 1 -o report.pdf
//! ```

mod signature;

use std::error::Error;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use blockdrive_recovery::{
    ChainVerifier, ContentStore, FallbackProofStore, FileId, Network, Pubkey, Recovery,
    RecoveryConfig, RecoveryError, RecoveryResult, SecurityLevel, StorageProvider,
};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::signature::Signature;

/// Recover files encrypted with BlockDrive.
#[derive(Parser, Debug)]
#[command(name = "blockdrive-recover", version, about, long_about = None)]
struct Cli {
    /// IPFS CID of the encrypted content, or its object key with `--s3`.
    #[arg(short, long, required_unless_present = "print_message")]
    content_cid: Option<String>,

    /// Read the content from the Filebase bucket by object key.
    #[arg(long)]
    s3: bool,

    /// Identifier of the proof package.
    #[arg(short, long, required_unless_present = "print_message")]
    proof_cid: Option<String>,

    /// Security level: 1 = Standard, 2 = Sensitive, 3 = Maximum.
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=3))]
    level: u8,

    /// Where to write the recovered file. Parent directories are created.
    #[arg(short, long, required_unless_present = "print_message")]
    output: Option<PathBuf>,

    /// Path to a raw signature file.
    #[arg(short = 's', long = "signature", conflicts_with_all = ["sig_hex", "sig_base64"])]
    signature_file: Option<PathBuf>,

    /// Signature as hex, optionally prefixed with 0x.
    #[arg(long, conflicts_with = "sig_base64")]
    sig_hex: Option<String>,

    /// Signature as base64.
    #[arg(long)]
    sig_base64: Option<String>,

    /// CID of the encrypted metadata envelope.
    #[arg(short, long)]
    metadata_cid: Option<String>,

    /// Preferred IPFS gateway: filebase, pinata, infura or cloudflare.
    #[arg(long, value_parser = StorageProvider::from_str)]
    provider: Option<StorageProvider>,

    /// SHA-256 hex the recovered plaintext must match.
    #[arg(long)]
    expected_hash: Option<String>,

    /// Check the proof commitment against the on-chain file record first.
    #[arg(long, requires_all = ["vault_owner", "file_id"], conflicts_with = "metadata_cid")]
    verify_onchain: bool,

    /// Vault owner wallet address (base58).
    #[arg(long)]
    vault_owner: Option<String>,

    /// File UUID.
    #[arg(long)]
    file_id: Option<String>,

    /// Solana network: mainnet, devnet or localnet.
    #[arg(long, value_parser = Network::from_str)]
    network: Option<Network>,

    /// Explicit Solana RPC endpoint.
    #[arg(long)]
    rpc_url: Option<String>,

    /// BlockDrive program id.
    #[arg(long)]
    program_id: Option<String>,

    /// JSON config file. Without it, `BLOCKDRIVE_*` variables apply.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the message to sign for `--level` and exit.
    #[arg(long)]
    print_message: bool,

    /// Only report errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Debug logging.
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if cli.quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let level = SecurityLevel::try_from(cli.level)?;
    if cli.print_message {
        println!("{}", level.sign_message());
        return Ok(());
    }

    let content_cid = required(&cli.content_cid, "--content-cid")?;
    let proof_cid = required(&cli.proof_cid, "--proof-cid")?;
    let output = cli.output.as_deref().ok_or("--output is required")?;

    let config = load_config(cli)?;
    let signature = read_signature(cli, level)?;
    debug!(bytes = signature.len(), "signature loaded");

    let mut builder = Recovery::builder()
        .config(config.clone())
        .signature(level, &signature);
    drop(signature);

    if cli.s3 {
        if let Some(scope) = blockdrive_recovery::parse_object_key(content_cid) {
            debug!(context = %scope.context(), team = scope.team_id(), "object key layout");
        }
        builder = builder
            .content_store(filebase_store(&config)?)
            .proof_store(Arc::new(FallbackProofStore::from_config(&config)?));
    }

    let anchor = if cli.verify_onchain {
        let owner: Pubkey = required(&cli.vault_owner, "--vault-owner")?.parse()?;
        let file_id: FileId = required(&cli.file_id, "--file-id")?.parse()?;
        builder = builder.chain_verifier(chain_verifier(&config)?);
        Some((owner, file_id))
    } else {
        None
    };
    let recovery = builder.build()?;

    info!(content_cid, proof_cid, level = level.as_u8(), "starting recovery");
    let expected = cli.expected_hash.as_deref();
    let result = match (&anchor, &cli.metadata_cid) {
        (Some((owner, file_id)), _) => {
            recovery
                .recover_with_verification(content_cid, proof_cid, level, owner, file_id, expected)
                .await?
        }
        (None, Some(metadata_cid)) => {
            recovery
                .recover_with_metadata(content_cid, proof_cid, metadata_cid, level, expected)
                .await?
        }
        (None, None) => recovery.recover_file(content_cid, proof_cid, level, expected).await?,
    };

    if !result.success {
        let reason = result.error.as_deref().unwrap_or("unknown error");
        return Err(format!("Recovery failed: {}", reason).into());
    }

    write_output(output, &result.data)?;
    if !cli.quiet {
        print_summary(output, &result);
    }
    Ok(())
}

fn required<'a>(value: &'a Option<String>, flag: &str) -> Result<&'a str, String> {
    value.as_deref().ok_or_else(|| format!("{} is required", flag))
}

fn load_config(cli: &Cli) -> Result<RecoveryConfig, RecoveryError> {
    let mut config = match &cli.config {
        Some(path) => RecoveryConfig::from_json_file(path)?,
        None => RecoveryConfig::from_env()?,
    };
    if let Some(provider) = cli.provider {
        config = config.with_provider(provider);
    }
    if let Some(network) = cli.network {
        config = config.with_network(network);
    }
    if let Some(url) = &cli.rpc_url {
        config.rpc_url = Some(url.clone());
    }
    if let Some(program_id) = &cli.program_id {
        config.program_id = program_id.clone();
    }
    config.validate()?;
    Ok(config)
}

fn read_signature(cli: &Cli, level: SecurityLevel) -> Result<Signature, signature::SignatureError> {
    if let Some(path) = &cli.signature_file {
        return signature::from_file(path);
    }
    if let Some(hex) = &cli.sig_hex {
        return signature::from_hex(hex);
    }
    if let Some(b64) = &cli.sig_base64 {
        return signature::from_base64(b64);
    }
    if !io::stdin().is_terminal() {
        // Piped input: take the first line without the banner.
        let mut line = zeroize::Zeroizing::new(String::new());
        io::stdin().read_line(&mut line)?;
        return signature::parse_any(&line);
    }
    signature::prompt(level, io::stdin().lock(), io::stderr())
}

#[cfg(feature = "solana")]
fn chain_verifier(config: &RecoveryConfig) -> Result<Arc<dyn ChainVerifier>, RecoveryError> {
    Ok(Arc::new(blockdrive_recovery::SolanaRpcVerifier::from_config(config)?))
}

#[cfg(not(feature = "solana"))]
fn chain_verifier(_config: &RecoveryConfig) -> Result<Arc<dyn ChainVerifier>, RecoveryError> {
    Err(RecoveryError::Config(
        "on-chain verification requires a build with the `solana` feature".to_string(),
    ))
}

#[cfg(feature = "s3")]
fn filebase_store(config: &RecoveryConfig) -> Result<Arc<dyn ContentStore>, RecoveryError> {
    match blockdrive_recovery::FilebaseS3::from_config(config)? {
        Some(store) => Ok(Arc::new(store)),
        None => Err(RecoveryError::Config(
            "--s3 needs Filebase credentials (BLOCKDRIVE_FILEBASE_* or the config file)".to_string(),
        )),
    }
}

#[cfg(not(feature = "s3"))]
fn filebase_store(_config: &RecoveryConfig) -> Result<Arc<dyn ContentStore>, RecoveryError> {
    Err(RecoveryError::Config(
        "--s3 requires a build with the `s3` feature".to_string(),
    ))
}

fn write_output(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)
}

fn print_summary(output: &Path, result: &RecoveryResult) {
    println!("Recovered {} bytes to {}", result.data.len(), output.display());
    println!("  Commitment:   {}", result.commitment);
    println!("  Verified:     {}", if result.verified { "yes" } else { "no" });
    if result.chain_verified {
        println!("  On-chain:     yes");
    }
    if let Some(metadata) = &result.metadata {
        println!("  Original:     {} ({} bytes)", metadata.file_name, metadata.file_size);
    }
    println!("  Download:     {} ms", result.download_ms);
    println!("  Decryption:   {} ms", result.decryption_ms);
}
