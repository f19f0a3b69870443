use tandem_core::{CoreError, TandemConfig, duration_from_secs};
use tandem_viewer::{ClockPlayer, Session, SessionSettings, ViewerAgent, ViewerCommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const COMMAND_QUEUE_CAPACITY: usize = 16;

fn main() {
    let config = load_config();
    tandem_core::logging::init_tracing(config.logging.enabled);

    let settings = match SessionSettings::from_config(&config.viewer) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

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

    let track_length = config.viewer.track_length_secs.map(duration_from_secs);
    let agent = ViewerAgent::new(
        ClockPlayer::new(track_length),
        settings.hub_url.clone(),
        config.viewer.controller,
        config.viewer.dead_band_secs,
    );
    if config.viewer.controller {
        info!("Running as the controller");
    }

    let result = runtime.block_on(async {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let session = Session::new(agent, &settings, rx, cancel_token.clone())?;
        tokio::spawn(read_console(tx));
        session.run().await;
        Ok::<_, tandem_viewer::ViewerError>(())
    });

    // The stdin reader may be parked in a blocking read
    runtime.shutdown_timeout(std::time::Duration::from_millis(100));

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

/// Forward parsed stdin lines to the session until stdin closes
async fn read_console(tx: mpsc::Sender<ViewerCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read stdin: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<ViewerCommand>() {
            Ok(command) => {
                if tx.send(command).await.is_err() {
                    break;
                }
            }
            Err(e) => println!("{e}"),
        }
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
