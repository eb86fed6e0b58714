use anyhow::Result;

use booking_gateway::{startup, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Loads .env first, so RUST_LOG and LOG_FORMAT from it apply to logging too
    let config = Config::from_env()?;

    startup::init_tracing(&config);

    startup::run(config).await
}
