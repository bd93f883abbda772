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

    /// Private key (hex format, with or without 0x prefix)
    /// Use "-" to read from stdin; the configured environment variable is
    /// used when omitted
    #[arg(short = 'k', long)]
    private_key: Option<String>,
}

pub fn run(args: &Cli) -> Result<()> {
    println!("Loading distribution from {:?}...", args.table);
    let distribution = table_file::load(&args.table)?;

    let session = session::connect(&args.config, args.private_key.as_deref())?;
    let sender = session.submitter.sender();

    let (entry, _) = distribution
        .table()
        .proof_for(&sender)
        .context("Sender has no entry in this distribution")?;
    println!("Index: {}", entry.index);
    println!("Balance: {}", entry.balance);

    let on_chain_root = session
        .contract
        .incentive_root()
        .context("Failed to read contract root")?;
    if on_chain_root != distribution.root() {
        anyhow::bail!(
            "Distribution root {} does not match contract root {}",
            hex_encode(distribution.root()),
            hex_encode(on_chain_root)
        );
    }

    if session
        .contract
        .is_claimed(entry.index)
        .context("Failed to read claim status")?
    {
        println!("Entry {} has already been claimed", entry.index);
        return Ok(());
    }

    println!("Submitting claim...");
    let receipt = session
        .contract
        .claim_for_sender(&session.submitter, distribution.table(), &CancelToken::new())
        .context("Claim failed")?;
    print_receipt("Claim transaction", &receipt, session.config.gas_price);

    println!("\nClaimed {} for {}", entry.balance, hex_encode(sender));
    Ok(())
}
