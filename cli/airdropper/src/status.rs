use std::path::PathBuf;

use airdropper::{hex_encode, Config};
use anyhow::{Context, Result};
use clap::Args;

use crate::session;
use crate::table_file;

#[derive(Args, Debug)]
pub struct Cli {
    /// Config file
    #[arg(short, long, default_value = "airdropper.json")]
    config: PathBuf,

    /// Entry index whose claim status to show
    #[arg(short, long)]
    index: Option<u64>,

    /// Distribution file to compare with the contract root
    #[arg(short, long)]
    table: Option<PathBuf>,
}

pub fn run(args: &Cli) -> Result<()> {
    let config = Config::load(&args.config).context("Failed to load config")?;
    let (contract, token) = session::connect_readonly(&config)?;

    let paused = contract.is_paused().context("Failed to read paused flag")?;
    let version = contract.version().context("Failed to read version")?;
    let root = contract.incentive_root().context("Failed to read root")?;
    println!("Contract: {}", hex_encode(contract.address()));
    println!("Paused: {}", paused);
    println!("Version: {}", version);
    println!("Root: {}", hex_encode(root));

    let distribution = args.table.as_deref().map(table_file::load).transpose()?;
    if let Some(distribution) = &distribution {
        let matches = distribution.root() == root;
        println!(
            "Local version {} root matches: {}",
            distribution.version(),
            matches
        );
    }

    if let Some(token) = &token {
        println!("Token: {}", hex_encode(token.address()));
        match &distribution {
            Some(distribution) => {
                let required = distribution.table().total_balance()?;
                let funding = session::check_funding(token, &contract, required)?;
                println!("Funded: {}", funding.is_sufficient());
            }
            None => {
                let balance = token
                    .balance_of(&contract.address())
                    .context("Failed to read contract token balance")?;
                println!("Contract token balance: {}", balance);
            }
        }
    }

    if let Some(index) = args.index {
        let claimed = contract
            .is_claimed(index)
            .context("Failed to read claim status")?;
        println!("Entry {} claimed: {}", index, claimed);
    }

    Ok(())
}
