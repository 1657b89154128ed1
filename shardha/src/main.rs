//! shardha command line.

use clap::Parser;
use shardha::cli::{self, Cli};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();
    shardha::logger();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(cli::run(args))?;

    Ok(())
}
