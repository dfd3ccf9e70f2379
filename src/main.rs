use log::{error, info, LevelFilter};
use rocket::Error as RocketError;
use thiserror::Error;

const LOG_CONFIG: &str = "log4rs.yaml";

/// Errors that are critical to the entire server.
#[derive(Debug, Error)]
enum Error {
    #[error(transparent)]
    RocketError(#[from] RocketError),
}

async fn run() -> Result<(), Error> {
    info!("Configuring server...");
    let rocket = proxyvote_backend::build().ignite().await?;
    info!("...server configured with {} routes", rocket.routes().count());
    // Rocket's own logging is noisy; the logger fairing covers requests from here on.
    log4rs_dynamic_filters::DynamicLevelFilter::set("rocket", LevelFilter::Off);
    let _ = rocket.launch().await?;
    Ok(())
}

#[rocket::main]
async fn main() {
    if let Err(e) = log4rs::init_file(LOG_CONFIG, log4rs_dynamic_filters::default_deserializers())
    {
        eprintln!("Failed to initialise logging from {LOG_CONFIG}: {e}");
        std::process::exit(1);
    }
    info!("Initialised logging from {LOG_CONFIG}");

    if let Err(err) = run().await {
        error!("{err}");
        error!("Critical failure, shutting down");
        std::process::exit(1)
    }
}
