use std::sync::Arc;

use chrono::Local;
use clap::{Parser, ValueEnum};
use postcode_scrap::log::{init_tracing, Logger, TracingLogger};
use postcode_scrap::process::{initialize, query_postcodes};
use postcode_scrap::{info_time, Config, Result};

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Which stage to run
    #[arg(long, value_enum)]
    action: Action,
}

#[derive(Clone, Copy, ValueEnum)]
enum Action {
    /// Download the datasets and build the deduplicated postcode list
    Init,
    /// Look up every postcode that has no result file yet
    Query,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let start_time = Local::now();

    let config = Config::with_root(std::env::current_dir()?);
    config.ensure_dirs().await?;
    let _guard = init_tracing(&config.logs_dir);
    let log: Arc<dyn Logger> = Arc::new(TracingLogger);

    match args.action {
        Action::Init => {
            initialize(&config, log.clone()).await;
        }
        Action::Query => {
            query_postcodes(&config, log.clone()).await;
        }
    }
    info_time!(log, start_time, "Full program time:");

    Ok(())
}
