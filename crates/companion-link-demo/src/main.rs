//! # companion-link-demo
//!
//! Drives a companion link session against the scripted in-memory platform.
//!
//! ## Running
//!
//! ```bash
//! # Write a sample config to the default location
//! cargo run --package companion-link-demo -- init
//!
//! # Send a message and print the delivery report as JSON
//! cargo run --package companion-link-demo -- send hello watch
//!
//! # Reproduce a failure
//! COMPANION_LINK_SCENARIO=not-running cargo run --package companion-link-demo
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::time::Duration;

use companion_link_demo::cli::{self, Command, ConfigSource};
use companion_link_demo::error::DemoError;
use companion_link_demo::logging;
use companion_link_demo::state::AppState;
use tracing::{error, info};

const REPLY_WAIT: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "companion-link-demo failed");
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run() -> Result<(), DemoError> {
    let command = Command::parse(std::env::args().skip(1))?;
    let path = cli::config_path()?;

    let (config, source) = if command == Command::Init {
        let config = cli::init_config(&path)?;
        println!("Wrote sample configuration to {}", path.display());
        (config, ConfigSource::Written)
    } else {
        cli::load_config(&path)?
    };

    if let Err(e) = logging::init(cli::is_production(), config.logging().verbose) {
        eprintln!("warning: logging disabled: {e}");
    }
    info!(command = ?command, config = %path.display(), ?source, "Starting companion-link-demo");
    if source == ConfigSource::Sample {
        info!(path = %path.display(), "No config file, using sample configuration");
    }

    let state = AppState::new(config, cli::scenario_from_env()?);
    let result = execute(&state, command).await;
    state.shutdown().await;
    result
}

async fn execute(state: &AppState, command: Command) -> Result<(), DemoError> {
    match command {
        Command::Init => Ok(()),
        Command::Status => {
            let connected = state.link().is_connected().await;
            let device = state.link().current_device().await;
            let status = serde_json::json!({ "connected": connected, "device": device });
            println!("{status:#}");
            Ok(())
        }
        Command::Send(message) => {
            let report = state.send(&message).await?;
            println!("{}", serde_json::json!(report));
            Ok(())
        }
        Command::Listen => {
            state.listen().await?;
            let reached = state.simulate_reply("hello from the watch");
            info!(receivers = reached, "Simulated companion reply");
            if let Some(message) = state.next_message(REPLY_WAIT).await {
                println!("{message}");
            }
            Ok(())
        }
    }
}
