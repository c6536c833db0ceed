//! CLI argument parsing.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bell-device")]
#[command(about = "Bell device simulator: button events and firmware update checks")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stay connected and print every broadcast [default]
    Listen,

    /// Press the button, hold it, release it
    Press {
        /// Device id reported in the events
        #[arg(long, default_value = "bell-sim")]
        device_id: String,

        /// Firmware version reported in the events
        #[arg(long, default_value = "v1.0.0")]
        firmware_version: String,

        /// How long the button stays down
        #[arg(long, default_value_t = 250)]
        hold_ms: u64,
    },

    /// Ask the relayer for a firmware update
    CheckUpdate {
        /// Version the simulated device is running
        #[arg(long)]
        version: Option<String>,

        /// MAC address sent with the check
        #[arg(long)]
        mac: Option<String>,

        /// Where to save a served firmware image
        #[arg(long, default_value = "./firmware.bin")]
        out: String,
    },
}
