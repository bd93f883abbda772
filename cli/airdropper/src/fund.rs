use std::path::PathBuf;

use airdropper::{hex_encode, CancelToken};
use anyhow::{Context, Result};
use clap::Args;

use crate::session::{self, print_receipt};
use crate::table_file;

#[derive(Args, Debug)]
pub struct Cli {
    /// Config file; must name the token
    #[arg(short, long, default_value = "airdropper.json")]
    config: PathBuf,

    /// Distribution file written by `build-tree`
    #[arg(short, long)]
    table: PathBuf,

    /// Amount to transfer; defaults to the contract's shortfall
    #[arg(short, long)]
    amount: Option<u128>,

    /// Token holder's private key; "-" reads from stdin
    #[arg(short = 'k', long)]
    private_key: Option<String>,
}

pub fn run(args: &Cli) -> Result<()> {
    let distribution = table_file::load(&args.table)?;
    let session = session::connect(&args.config, args.private_key.as_deref())?;
    let token = session
        .token
        .as_ref()
        .context("token_address is not set in the config")?;

    let required = distribution.table().total_balance()?;
    let funding = session::check_funding(token, &session.contract, required)?;
    let amount = args.amount.unwrap_or_else(|| funding.shortfall());
    if amount == 0 {
        println!("Contract is already funded");
        return Ok(());
    }

    let sender_balance = token
        .balance_of(&session.submitter.sender())
        .context("Failed to read sender token balance")?;
    if sender_balance < amount {
        anyhow::bail!(
            "Sender holds {} tokens, cannot transfer {}",
            sender_balance,
            amount
        );
    }

    println!(
        "Transferring {} tokens to {}...",
        amount,
        hex_encode(session.contract.address())
    );
    let receipt = token
        .transfer(
            &session.submitter,
            &session.contract.address(),
            amount,
            &CancelToken::new(),
        )
        .context("Transfer failed")?;
    print_receipt("Transfer transaction", &receipt, session.config.gas_price);
    Ok(())
}
