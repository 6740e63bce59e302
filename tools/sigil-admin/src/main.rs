//! Sigil-Admin: command-line front end over a local sigil data directory.
//!
//! Every invocation opens the file-backed stores under `--data-dir`, so
//! several processes sharing a directory coordinate through the same
//! ledger files and send locks.

mod keys;
mod workspace;

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sigil_ledger::{LedgerConfig, Nonce, SendRequest, ShareLink};
use sigil_types::{Amount, Hash};
use workspace::{IssueParams, Workspace};

/// Sigil-Admin: issue, send, receive and inspect sigil artifacts
#[derive(Parser, Debug)]
#[command(name = "sigil-admin")]
#[command(about = "Issue, send, receive and inspect sigil artifacts")]
struct Args {
    /// Data directory holding ledgers, locks, keys and published windows
    #[arg(long, env = "SIGIL_DATA_DIR", default_value = ".sigil", global = true)]
    data_dir: PathBuf,

    /// Name of the key to act with
    #[arg(short, long, default_value = "default", global = true)]
    key: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a signing key
    Keygen {
        /// Replace an existing key of the same name
        #[arg(long)]
        force: bool,
    },

    /// Issue a root artifact owned by the selected key
    Issue {
        /// Allocation of the new artifact
        #[arg(long)]
        base: Amount,
        /// Creation pulse (defaults to the current pulse)
        #[arg(long)]
        pulse: Option<u64>,
        #[arg(long, default_value = "0")]
        beat: u32,
        #[arg(long, default_value = "0")]
        step: u32,
        #[arg(long)]
        day_category: String,
    },

    /// Open a transfer and print its share link
    Send {
        /// Artifact to send from
        artifact: Hash,
        amount: Amount,
        /// Link token the send lock is scoped to
        #[arg(long, default_value = "sigil-admin")]
        token: String,
        /// Reuse a nonce to replay an earlier send
        #[arg(long)]
        nonce: Option<String>,
        /// Attach a hardened link
        #[arg(long)]
        harden: bool,
        /// Memo carried in the sender half
        #[arg(long)]
        payload: Option<String>,
        /// Write the share link here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Claim a share link with the selected key
    Receive {
        /// Share link file, or "-" for stdin
        share: PathBuf,
    },

    /// Print the balance of an artifact
    Balance { artifact: Hash },

    /// Print the full ledger of an artifact
    Show {
        artifact: Hash,
        /// Print only the head commitment
        #[arg(long)]
        head: bool,
    },

    /// Print an inclusion proof for a transfer and check it
    Prove { artifact: Hash, sequence: u64 },

    /// List every stored artifact
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let args = Args::parse();
    debug!(?args, "Parsed arguments");

    let workspace = Workspace::open(&args.data_dir, LedgerConfig::from_env())?;
    let key = args.key.as_str();

    match args.command {
        Command::Keygen { force } => {
            let public = workspace.keygen(key, force)?;
            print_json(&json!({ "key": key, "public_key": public }))
        }
        Command::Issue {
            base,
            pulse,
            beat,
            step,
            day_category,
        } => {
            let params = IssueParams {
                creation_pulse: pulse,
                beat,
                step_index: step,
                day_category,
                base,
            };
            print_json(&workspace.issue(key, params).await?)
        }
        Command::Send {
            artifact,
            amount,
            token,
            nonce,
            harden,
            payload,
            out,
        } => {
            let mut request = SendRequest::new(amount, token);
            if let Some(nonce) = nonce {
                request = request.with_nonce(Nonce::new(nonce));
            }
            if let Some(payload) = payload {
                request = request.with_payload(payload);
            }
            if harden {
                request = request.hardened();
            }
            let share = workspace.send(key, artifact, request).await?;
            match out {
                Some(path) => {
                    let text = serde_json::to_string_pretty(&share)?;
                    fs::write(&path, text)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    print_json(&json!({ "child": share.child, "share_link": path }))
                }
                None => print_json(&share),
            }
        }
        Command::Receive { share } => {
            let share = read_share(&share)?;
            print_json(&workspace.receive(key, &share).await?)
        }
        Command::Balance { artifact } => print_json(&workspace.balance(artifact).await?),
        Command::Show { artifact, head } => {
            if head {
                print_json(&workspace.head(artifact).await?)
            } else {
                print_json(&workspace.show(artifact).await?)
            }
        }
        Command::Prove { artifact, sequence } => {
            let (proof, verified) = workspace.prove(artifact, sequence).await?;
            print_json(&json!({ "proof": proof, "verified": verified }))
        }
        Command::List => print_json(&workspace.list()?),
    }
}

/// Log to stderr, filtered by `SIGIL_LOG_LEVEL`, then `RUST_LOG`.
fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_env("SIGIL_LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn read_share(path: &Path) -> Result<ShareLink> {
    let text = if path.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read share link from stdin")?;
        text
    } else {
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?
    };
    serde_json::from_str(&text).context("Malformed share link")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
