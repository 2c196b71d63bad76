//! pairchat CLI entry point

use clap::Parser;
use tracing::{error, info};

use pairchat_cli::{app::ChatApp, cli::Cli, config::AppConfig, error::Result};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let mut config = load_configuration(&cli)?;
    if let Some(name) = &cli.name {
        config.name = name.clone();
    }
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }

    let app = ChatApp::new(config);
    if let Err(e) = app.run(cli.connect).await {
        error!("chat session failed: {}", e);
        std::process::exit(1);
    }

    info!("pairchat exited");
    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    if let Some(config_path) = &cli.config {
        info!("loading configuration from {}", config_path);
    }
    AppConfig::load(cli.config.as_deref())
}
