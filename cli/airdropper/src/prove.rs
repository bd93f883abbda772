use std::path::PathBuf;

use airdropper::{
    hex_encode, parse_address, parse_hash, verify_proof, write_file_atomic, Hash,
};
use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::table_file;

#[derive(Args, Debug)]
pub struct ProveCli {
    /// Distribution file written by `build-tree`
    #[arg(short, long)]
    table: PathBuf,

    /// Address whose entry to look up
    #[arg(short, long)]
    address: String,

    /// Optional output JSON file; printed to stdout otherwise
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VerifyCli {
    /// Merkle root (hex format)
    #[arg(short, long)]
    root: String,

    /// Entry index
    #[arg(short, long)]
    index: u64,

    /// Entry address
    #[arg(short, long)]
    address: String,

    /// Entry balance
    #[arg(short, long)]
    balance: u128,

    /// Sibling hashes, bottom-up
    #[arg(short, long, value_delimiter = ',')]
    proof: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProofOutput {
    version: String,
    root_hash: String,
    index: u64,
    address: String,
    balance: u128,
    merkle_proof: Vec<String>,
}

pub fn run_prove(args: &ProveCli) -> Result<()> {
    let distribution = table_file::load(&args.table)?;
    let address = parse_address(&args.address).context("Invalid address")?;

    let (entry, proof) = distribution
        .table()
        .proof_for(&address)
        .context("No entry for address")?;

    let output = ProofOutput {
        version: distribution.version().to_string(),
        root_hash: hex_encode(distribution.root()),
        index: entry.index,
        address: hex_encode(entry.address),
        balance: entry.balance,
        merkle_proof: proof.iter().map(hex_encode).collect(),
    };
    let json_output = serde_json::to_string_pretty(&output).context("Failed to serialize JSON")?;

    match &args.output {
        Some(path) => {
            write_file_atomic(path, &json_output).context("Failed to write proof file")?;
            println!("Index: {}", entry.index);
            println!("Balance: {}", entry.balance);
            println!("Proof length: {} nodes", proof.len());
            println!("Wrote proof to {:?}", path);
        }
        None => println!("{}", json_output),
    }
    Ok(())
}

fn parse_proof(proof: &[String]) -> Result<Vec<Hash>> {
    proof
        .iter()
        .filter(|hash| !hash.trim().is_empty())
        .map(|hash| parse_hash(hash.trim()).context("Invalid proof hash"))
        .collect()
}

pub fn verify(args: &VerifyCli) -> Result<bool> {
    let root = parse_hash(&args.root).context("Invalid Merkle root")?;
    let address = parse_address(&args.address).context("Invalid address")?;
    let proof = parse_proof(&args.proof)?;
    Ok(verify_proof(&root, args.index, &address, args.balance, &proof))
}

pub fn run_verify(args: &VerifyCli) -> Result<()> {
    let valid = verify(args)?;
    println!("{}", valid);
    if !valid {
        tracing::warn!(index = args.index, address = %args.address, "proof does not verify");
    }
    Ok(())
}
