#![forbid(unsafe_code)]
#![allow(unreachable_pub)]

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod build_tree;
mod claim;
mod commit;
mod fund;
mod prove;
mod session;
mod status;
mod table_file;

#[derive(Parser, Debug)]
#[command(name = "airdropper")]
#[command(about = "Merkle airdrop distribution tools", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a distribution version: root, entries and proofs
    BuildTree(build_tree::Cli),
    /// Print the entry and proof of one address
    Prove(prove::ProveCli),
    /// Check a proof against a root
    Verify(prove::VerifyCli),
    /// Commit a version's root to the airdrop contract
    Commit(commit::Cli),
    /// Transfer tokens to the airdrop contract to cover a distribution
    Fund(fund::Cli),
    /// Claim the sender's entry from the airdrop contract
    Claim(claim::Cli),
    /// Show the contract's paused flag, version and root
    Status(status::Cli),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::BuildTree(args) => build_tree::run(&args)?,
        Commands::Prove(args) => prove::run_prove(&args)?,
        Commands::Verify(args) => prove::run_verify(&args)?,
        Commands::Commit(args) => commit::run(&args)?,
        Commands::Fund(args) => fund::run(&args)?,
        Commands::Claim(args) => claim::run(&args)?,
        Commands::Status(args) => status::run(&args)?,
    }

    Ok(())
}
