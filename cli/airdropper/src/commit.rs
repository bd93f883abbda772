use std::path::PathBuf;

use airdropper::{hex_encode, CancelToken};
use anyhow::{Context, Result};
use clap::Args;

use crate::session::{self, print_receipt};
use crate::table_file;

#[derive(Args, Debug)]
pub struct Cli {
    /// Config file
    #[arg(short, long, default_value = "airdropper.json")]
    config: PathBuf,

    /// Distribution file written by `build-tree`
    #[arg(short, long)]
    table: PathBuf,

    /// Admin private key; "-" reads from stdin
    #[arg(short = 'k', long)]
    private_key: Option<String>,
}

pub fn run(args: &Cli) -> Result<()> {
    println!("Loading distribution from {:?}...", args.table);
    let distribution = table_file::load(&args.table)?;
    let root = distribution.root();
    println!("Version: {}", distribution.version());
    println!("Merkle root: {}", hex_encode(root));

    let session = session::connect(&args.config, args.private_key.as_deref())?;
    let sender = session.submitter.sender();
    if !session
        .contract
        .is_admin(&sender)
        .context("Failed to read admin status")?
    {
        tracing::warn!(sender = %hex_encode(sender), "sender is not a contract admin");
    }

    if let Some(token) = &session.token {
        let required = distribution.table().total_balance()?;
        session::check_funding(token, &session.contract, required)?;
    }

    println!("Committing root...");
    let receipts = session
        .contract
        .commit_root(&session.submitter, root, &CancelToken::new())
        .context("Failed to commit root")?;
    if receipts.is_empty() {
        println!("Contract already holds this root");
        return Ok(());
    }
    for receipt in &receipts {
        print_receipt("Transaction", receipt, session.config.gas_price);
    }

    let version = session.contract.version().context("Failed to read version")?;
    println!("\nRoot committed. Contract version: {}", version);
    Ok(())
}
