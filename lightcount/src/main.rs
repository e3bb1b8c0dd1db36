use clap::Parser;
use lightcount_core::config::load_from_path;
use lightcount_core::daemon;
use lightcount_core::telemetry::init_tracing;
use std::path::PathBuf;
use tracing::error;

#[derive(Parser, Debug)]
#[command(author, version, about = "Per-IP passive traffic counter daemon")]
struct Cli {
    /// Interface to capture on, or "any".
    #[arg(short, long, value_name = "IFACE")]
    interface: Option<String>,

    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "lightcount.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match load_from_path(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };
    if let Some(interface) = cli.interface {
        config.interface = interface;
    }

    if let Err(err) = init_tracing(&config.log_level) {
        eprintln!("failed to initialize logging: {err}");
        std::process::exit(1);
    }

    if let Err(err) = daemon::run(cli.config, config).await {
        error!(%err, "lightcount exited with error");
        std::process::exit(1);
    }
}
