use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use airdropper::{
    hex_encode, parse_address, write_file_atomic, Address, Config, Distribution, Rewards,
    SourceSnapshot,
};
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    /// `address,balance` per line
    Csv,
    /// JSON source snapshot: identities, wallets and referral counts
    Snapshot,
}

#[derive(Args, Debug)]
pub struct Cli {
    /// Input file with the entries in distribution order
    #[arg(short, long)]
    input: PathBuf,

    /// Input format; inferred from the extension when omitted
    #[arg(short, long, value_enum)]
    format: Option<InputFormat>,

    /// Version label of this distribution (the contract's next version)
    #[arg(short = 'V', long)]
    version: String,

    /// Output file for the version document, entries and proofs
    #[arg(short, long)]
    output: PathBuf,

    /// Optional output file holding only the Merkle root
    #[arg(short, long)]
    root_output: Option<PathBuf>,

    /// Config file supplying reward amounts for snapshot input
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn input_format(&self) -> InputFormat {
        self.format.unwrap_or_else(|| {
            match self.input.extension().and_then(|ext| ext.to_str()) {
                Some("json") => InputFormat::Snapshot,
                _ => InputFormat::Csv,
            }
        })
    }
}

/// Reads `address,balance` lines. Blank lines and `#` comments are skipped;
/// any malformed line aborts the whole read.
pub fn read_balances_csv(path: &Path) -> Result<Vec<(Address, u128)>> {
    let file = File::open(path).context("Failed to open input file")?;
    let reader = BufReader::new(file);
    let mut balances = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (addr_str, balance_str) = trimmed.split_once(',').with_context(|| {
            format!(
                "Invalid format at line {}: expected 'address,balance', got '{}'",
                line_num + 1,
                trimmed
            )
        })?;
        let address = parse_address(addr_str)
            .with_context(|| format!("Invalid address at line {}", line_num + 1))?;
        let balance: u128 = balance_str
            .trim()
            .parse()
            .with_context(|| format!("Invalid balance at line {}", line_num + 1))?;
        balances.push((address, balance));

        if (line_num + 1) % 1_000_000 == 0 {
            tracing::info!(lines = line_num + 1, "processed input lines");
        }
    }

    Ok(balances)
}

fn read_snapshot(path: &Path) -> Result<SourceSnapshot> {
    let contents = std::fs::read_to_string(path).context("Failed to read snapshot file")?;
    serde_json::from_str(&contents).context("Failed to parse snapshot JSON")
}

pub fn build(args: &Cli) -> Result<Distribution> {
    match args.input_format() {
        InputFormat::Csv => {
            let balances = read_balances_csv(&args.input)?;
            Ok(Distribution::build(args.version.clone(), balances)?)
        }
        InputFormat::Snapshot => {
            let rewards = match &args.config {
                Some(path) => Config::load(path).context("Failed to load config")?.rewards(),
                None => Rewards::default(),
            };
            let snapshot = read_snapshot(&args.input)?;
            Ok(Distribution::from_snapshot(
                args.version.clone(),
                &snapshot,
                &rewards,
            )?)
        }
    }
}

pub fn run(args: &Cli) -> Result<()> {
    println!("Reading entries from {:?}...", args.input);
    let distribution = build(args)?;
    println!("Total entries: {}", distribution.table().entry_count());

    let root = hex_encode(distribution.root());
    println!("Merkle root: {}", root);

    println!("Generating proofs...");
    let output = distribution.output()?;
    distribution
        .verify_records(&output.entries)
        .context("Generated proofs do not verify")?;

    let json_output =
        serde_json::to_string_pretty(&output).context("Failed to serialize distribution")?;
    write_file_atomic(&args.output, &json_output).context("Failed to write output file")?;
    println!("Wrote version {} to {:?}", distribution.version(), args.output);

    if let Some(root_path) = &args.root_output {
        write_file_atomic(root_path, &format!("{}\n", root)).context("Failed to write root")?;
    }

    println!("Done!");
    Ok(())
}
