use tandem_core::{CoreError, TandemConfig};
use tandem_hub::HubSettings;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

fn main() {
    let config = load_config();
    tandem_core::logging::init_tracing(config.logging.enabled);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    // Create shared cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    let settings = HubSettings::from_config(&config.hub);
    info!(
        "Playlist snapshot: {:?}, uploads: {:?}",
        settings.state_file, settings.upload_dir
    );

    let result = runtime.block_on(async {
        let listener = tandem_hub::bind(&config.hub).await?;
        tandem_hub::run(listener, settings, cancel_token).await
    });

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

/// Load the config file, falling back to defaults when it was just created.
///
/// Runs before tracing is installed, so problems go to stderr.
fn load_config() -> TandemConfig {
    match TandemConfig::load_or_create() {
        Ok(config) => config,
        Err(CoreError::ConfigNotFound { path }) => {
            eprintln!(
                "Created config template at {}; using defaults",
                path.display()
            );
            TandemConfig::default()
        }
        Err(e) => {
            eprintln!("Failed to load {}: {e}", TandemConfig::config_path().display());
            std::process::exit(1);
        }
    }
}
