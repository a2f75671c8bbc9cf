use clap::Parser;
use log::{error, info};
use rebound::configuration::config::{Args, Config};
use rebound::controller::controller_handler::Controller;
use rebound::error_handling::types::ControllerError;

async fn start(args: &Args) -> Result<(), ControllerError> {
    info!("Importing configuration");
    let config = Config::load(args)?;
    info!(
        "Configuration imported: domain {}, listener {}:{}",
        config.domain, config.listen_ip, config.http_port
    );

    let controller = Controller::new(config)?;
    info!("Spawning the controller");
    controller.run().await
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // RUST_LOG still wins over the default level.
    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_target(false)
        .init();

    println!(
        "
=============================================================
  rebound v{}  -  out-of-band interaction capture server
=============================================================
",
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = start(&args).await {
        error!("{}, exiting...", e);
        std::process::exit(1);
    }
}
