use clap::Parser;
use log::{error, info};
use std::path::Path;

use gatewatch::configuration::config::Config;
use gatewatch::pipeline::collector::Collector;

#[derive(Parser)]
#[command(name = "gatewatch")]
#[command(version = "0.1.0")]
#[command(about = "Home gateway network telemetry collector")]
struct Args {
    config_file: String,

    /// Run a single ingest/enrich/retention pass and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    println!(
        "
 ██████╗  █████╗ ████████╗███████╗██╗    ██╗ █████╗ ████████╗ ██████╗██╗  ██╗
██╔════╝ ██╔══██╗╚══██╔══╝██╔════╝██║    ██║██╔══██╗╚══██╔══╝██╔════╝██║  ██║
██║  ███╗███████║   ██║   █████╗  ██║ █╗ ██║███████║   ██║   ██║     ███████║
██║   ██║██╔══██║   ██║   ██╔══╝  ██║███╗██║██╔══██║   ██║   ██║     ██╔══██║
╚██████╔╝██║  ██║   ██║   ███████╗╚███╔███╔╝██║  ██║   ██║   ╚██████╗██║  ██║
 ╚═════╝ ╚═╝  ╚═╝   ╚═╝   ╚══════╝ ╚══╝╚══╝ ╚═╝  ╚═╝   ╚═╝    ╚═════╝╚═╝  ╚═╝
==============================================================================
            Home gateway network telemetry collector v0.1.0
==============================================================================
"
    );

    let args = Args::parse();

    info!("Importing configuration");
    let config = match Config::from_file(Path::new(args.config_file.as_str())) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration from file: {:?}", e);
            std::process::exit(1);
        }
    };
    info!("Configuration imported successfully");

    let mut collector = match Collector::new(config).await {
        Ok(collector) => collector,
        Err(e) => {
            error!("Unable to assemble the collector: {:?}, exiting...", e);
            std::process::exit(1);
        }
    };

    let result = if args.once {
        collector.run_once().await
    } else {
        collector.run().await
    };

    if let Err(e) = result {
        error!("Error occured in the collector process: {:?}, exiting...", e);
        std::process::exit(1);
    }
}
