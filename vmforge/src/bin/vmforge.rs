use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use vmforge::cli::{self, Cli};
use vmforge::logging::{init_tracing, JobLogger};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let logger = Arc::new(JobLogger::stdio());
    let code = cli::run(cli, logger).await?;
    std::process::exit(code);
}
