use regsync_telemetry::init_tracing;

use crate::core::start_mirror;

mod config;
mod core;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_name = env!("CARGO_BIN_NAME");

    let _log_flusher = init_tracing(app_name)?;

    // We run one mirror pass and exit.
    start_mirror().await?;

    Ok(())
}
