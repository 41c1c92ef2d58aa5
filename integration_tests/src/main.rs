//! Integration tests for the IMU GATT firmware.
//!
//! Run after flashing the firmware with the board lying still.

mod ble_client;
mod protocol;
mod tests;

use std::time::Duration;

use clap::Parser;
use colored::Colorize;

use ble_client::ImuClient;
use tests::{print_results, run_all_tests};

#[derive(Parser)]
#[command(name = "integration-tests")]
#[command(about = "Over-the-air integration tests for the IMU GATT firmware")]
struct Args {
    /// Advertised device name
    #[arg(short, long, default_value = "ESP32C3_IMU")]
    name: String,

    /// Scan timeout in seconds
    #[arg(long, default_value = "10")]
    scan_timeout: u64,

    /// Live data collection window in seconds
    #[arg(long, default_value = "3")]
    sample_window: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("{}", "IMU GATT Integration Tests".bold());
    println!("Device: {}", args.name);
    println!();

    println!("Scanning...");
    let client =
        ImuClient::connect_by_name(&args.name, Duration::from_secs(args.scan_timeout)).await?;
    println!("{}", "Connected!".green());

    println!("\nRunning tests...\n");

    let results = run_all_tests(&client, Duration::from_secs(args.sample_window)).await;
    print_results(&results);

    client.disconnect().await.ok();

    // Exit with error code if any tests failed
    let failed = results.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
