use clap::Parser;
use mnemon::cli::{Cli, run};

fn main() -> anyhow::Result<()> {
    mnemon::init_logging();
    let output = run(Cli::parse())?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
