use clap::Parser;
use fieldcast_lib::config::RuntimeSettings;
use fieldcast_lib::logging::setup_logging;

#[tokio::main]
async fn main() {
    let settings = RuntimeSettings::parse();
    setup_logging(settings.log_level.as_deref());

    let exit_delay = settings.fatal_exit_delay();
    if let Err(error) = fieldcast_lib::run(settings).await {
        // The host has already been sent the error; give it time to flush.
        log::error!("Fatal: {}. Exiting in {:?}", error, exit_delay);
        tokio::time::sleep(exit_delay).await;
        std::process::exit(1);
    }

    log::info!("fieldcast stopped");
    // A pending stdin read would otherwise hold the runtime open.
    std::process::exit(0);
}
