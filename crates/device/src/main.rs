//! Bell device simulator.
//!
//! Optional env: RELAYER_URL (default http://localhost:8080)

use std::env;
use std::path::PathBuf;

use bell_device::{cli, client};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let relayer_url =
        env::var("RELAYER_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

    match cli.command.unwrap_or(cli::Commands::Listen) {
        cli::Commands::Listen => {
            client::run_listener(&client::ws_url(&relayer_url)).await?;
        }
        cli::Commands::Press {
            device_id,
            firmware_version,
            hold_ms,
        } => {
            client::press_button(
                &client::ws_url(&relayer_url),
                &device_id,
                &firmware_version,
                hold_ms,
            )
            .await?;
        }
        cli::Commands::CheckUpdate { version, mac, out } => {
            let out = PathBuf::from(shellexpand::tilde(&out).to_string());
            let outcome =
                client::check_update(&relayer_url, version.as_deref(), mac.as_deref(), &out)
                    .await?;
            match outcome {
                client::UpdateOutcome::UpToDate => println!("Firmware is up to date."),
                client::UpdateOutcome::Updated { version, bytes } => {
                    println!("Downloaded {} ({} bytes) to {}", version, bytes, out.display());
                }
                client::UpdateOutcome::Unavailable(reason) => {
                    anyhow::bail!("No firmware available: {}", reason)
                }
            }
        }
    }

    Ok(())
}
