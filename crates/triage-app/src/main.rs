//! Triage application binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Initialize logging to stderr
//! 3. Build the HTTP transport and the voice capture device
//! 4. Run the terminal view over one session controller

mod cli;
mod view;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use triage_capture::SystemCaptureDevice;
use triage_core::config::TriageConfig;
use triage_session::SessionController;
use triage_transport::HttpTransport;

use crate::cli::CliArgs;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let config_exists = config_file.exists();
    let mut config = if config_exists {
        TriageConfig::load(&config_file)?
    } else {
        TriageConfig::default()
    };
    args.apply(&mut config);
    config.validate()?;

    // Tracing. RUST_LOG wins over the resolved level. Logs go to stderr so
    // the conversation on stdout stays readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Triage v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        path = %config_file.display(),
        from_file = config_exists,
        "Configuration loaded"
    );

    let transport = HttpTransport::new(config.transport.clone())?;
    let device = Arc::new(SystemCaptureDevice::from_config(&config.capture));
    let controller = SessionController::from_config(transport, device, &config);

    view::run(controller).await?;

    tracing::info!("Triage exited");
    Ok(())
}
