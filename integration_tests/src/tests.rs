//! Over-the-air test cases.

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, ensure, Result};
use colored::Colorize;

use crate::ble_client::ImuClient;
use crate::protocol::{
    OpCode, ResponseCode, CCCD_IMPROPERLY_CONFIGURED, CSC_FEATURES, CSC_FEATURE_UUID,
    DEFAULT_LOCATION, IMU_LIVE_DATA_UUID, MANUFACTURER_NAME_UUID, MODEL_NUMBER_UUID,
    SENSOR_LOCATION_UUID, SUPPORTED_LOCATIONS,
};

const INDICATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Test result.
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub message: Option<String>,
}

/// Run a test and print its result as it happens.
async fn run_test<F, Fut>(name: &str, client: &ImuClient, test_fn: F) -> TestResult
where
    F: FnOnce(&ImuClient) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    print!("  {} ... ", name);
    std::io::Write::flush(&mut std::io::stdout()).ok();

    let result = match test_fn(client).await {
        Ok(()) => TestResult {
            name: name.to_string(),
            passed: true,
            message: None,
        },
        Err(e) => TestResult {
            name: name.to_string(),
            passed: false,
            message: Some(e.to_string()),
        },
    };

    if result.passed {
        println!("{}", "PASS".green().bold());
    } else {
        println!("{}", "FAIL".red().bold());
        if let Some(msg) = &result.message {
            println!("    {}", msg.red());
        }
    }

    result
}

/// Run all tests and return results.
pub async fn run_all_tests(client: &ImuClient, sample_window: Duration) -> Vec<TestResult> {
    let mut results = Vec::new();

    results.push(run_test("Feature flags read 0x0007", client, test_feature_flags).await);
    results.push(run_test("Device information strings", client, test_device_info).await);
    results.push(run_test("Live data is not readable", client, test_live_data_not_readable).await);
    results.push(
        run_test(
            "Control point rejected without indications",
            client,
            test_control_point_requires_indications,
        )
        .await,
    );
    results.push(run_test("Supported locations list", client, test_supported_locations).await);
    results.push(run_test("Update to supported location", client, test_update_location).await);
    results.push(
        run_test(
            "Unsupported location leaves location unchanged",
            client,
            test_update_invalid_location,
        )
        .await,
    );
    results.push(run_test("Unsupported op-code", client, test_unsupported_op_code).await);
    results.push(run_test("Set cumulative value", client, test_set_cumulative_value).await);
    results.push(
        run_test("Live data notifications", client, |c| {
            test_live_data(c, sample_window)
        })
        .await,
    );

    results
}

/// Print test results summary.
pub fn print_results(results: &[TestResult]) {
    println!("\n{}", "=".repeat(60));
    println!("{}", "Test Results".bold());
    println!("{}", "=".repeat(60));

    let mut passed = 0;
    let mut failed = 0;

    for result in results {
        if result.passed {
            println!("  {} {}", "[PASS]".green().bold(), result.name);
            passed += 1;
        } else {
            println!("  {} {}", "[FAIL]".red().bold(), result.name);
            if let Some(msg) = &result.message {
                println!("         {}", msg.red());
            }
            failed += 1;
        }
    }

    println!("{}", "-".repeat(60));
    println!(
        "  Total: {} passed, {} failed",
        passed.to_string().green(),
        if failed > 0 {
            failed.to_string().red()
        } else {
            failed.to_string().normal()
        }
    );
    println!("{}", "=".repeat(60));
}

// --- Individual Tests ---

async fn test_feature_flags(client: &ImuClient) -> Result<()> {
    let value = client.read(CSC_FEATURE_UUID).await?;
    ensure!(value.len() == 2, "Expected 2 bytes, got {}", value.len());
    let features = u16::from_le_bytes([value[0], value[1]]);
    ensure!(
        features == CSC_FEATURES,
        "Expected 0x{:04x}, got 0x{:04x}",
        CSC_FEATURES,
        features
    );
    Ok(())
}

async fn test_device_info(client: &ImuClient) -> Result<()> {
    let manufacturer = String::from_utf8(client.read(MANUFACTURER_NAME_UUID).await?)?;
    let model = String::from_utf8(client.read(MODEL_NUMBER_UUID).await?)?;
    ensure!(!manufacturer.is_empty(), "Empty manufacturer name");
    ensure!(!model.contains('\0'), "Model number is NUL terminated");
    print!("({} / {}) ", manufacturer, model);
    Ok(())
}

async fn test_live_data_not_readable(client: &ImuClient) -> Result<()> {
    match client.read(IMU_LIVE_DATA_UUID).await {
        Ok(_) => Err(anyhow!("Read of notify-only characteristic succeeded")),
        Err(_) => Ok(()),
    }
}

async fn test_control_point_requires_indications(client: &ImuClient) -> Result<()> {
    client.disable_control_point_indications().await.ok();
    let error = client
        .control_point_error_text(&[OpCode::UpdateSensorLocation as u8, 4])
        .await?;
    ensure!(
        error.contains(&format!("0x{:02x}", CCCD_IMPROPERLY_CONFIGURED)),
        "Expected ATT error 0x{:02x}, got '{}'",
        CCCD_IMPROPERLY_CONFIGURED,
        error
    );

    let location = client.read(SENSOR_LOCATION_UUID).await?;
    ensure!(
        location == [DEFAULT_LOCATION],
        "Location changed to {:?}",
        location
    );
    Ok(())
}

async fn test_supported_locations(client: &ImuClient) -> Result<()> {
    client.enable_control_point_indications().await?;
    let response = client
        .control_point(
            &[OpCode::RequestSupportedSensorLocations as u8],
            INDICATION_TIMEOUT,
        )
        .await?;
    ensure!(
        response.status == ResponseCode::Success,
        "Expected Success, got {:?}",
        response.status
    );
    ensure!(
        response.payload == SUPPORTED_LOCATIONS,
        "Unexpected list {:?}",
        response.payload
    );
    Ok(())
}

async fn test_update_location(client: &ImuClient) -> Result<()> {
    client.enable_control_point_indications().await?;
    for location in SUPPORTED_LOCATIONS {
        let response = client
            .control_point(
                &[OpCode::UpdateSensorLocation as u8, location],
                INDICATION_TIMEOUT,
            )
            .await?;
        ensure!(
            response.status == ResponseCode::Success,
            "Location {}: expected Success, got {:?}",
            location,
            response.status
        );
        let stored = client.read(SENSOR_LOCATION_UUID).await?;
        ensure!(stored == [location], "Stored {:?}, expected {}", stored, location);
    }

    let response = client
        .control_point(
            &[OpCode::UpdateSensorLocation as u8, DEFAULT_LOCATION],
            INDICATION_TIMEOUT,
        )
        .await?;
    ensure!(
        response.status == ResponseCode::Success,
        "Restoring default location failed: {:?}",
        response.status
    );
    Ok(())
}

async fn test_update_invalid_location(client: &ImuClient) -> Result<()> {
    client.enable_control_point_indications().await?;
    let before = client.read(SENSOR_LOCATION_UUID).await?;

    let response = client
        .control_point(&[OpCode::UpdateSensorLocation as u8, 0x42], INDICATION_TIMEOUT)
        .await?;
    ensure!(
        response.status == ResponseCode::InvalidParameter,
        "Expected InvalidParameter, got {:?}",
        response.status
    );

    let after = client.read(SENSOR_LOCATION_UUID).await?;
    ensure!(before == after, "Location changed from {:?} to {:?}", before, after);
    Ok(())
}

async fn test_unsupported_op_code(client: &ImuClient) -> Result<()> {
    client.enable_control_point_indications().await?;
    let response = client
        .control_point(&[OpCode::StartSensorCalibration as u8, 0x99], INDICATION_TIMEOUT)
        .await?;
    ensure!(
        response.status == ResponseCode::OpCodeNotSupported,
        "Expected OpCodeNotSupported, got {:?}",
        response.status
    );
    ensure!(response.payload.is_empty(), "Unexpected payload {:?}", response.payload);
    Ok(())
}

async fn test_set_cumulative_value(client: &ImuClient) -> Result<()> {
    client.enable_control_point_indications().await?;

    let mut command = vec![OpCode::SetCumulativeValue as u8];
    command.extend_from_slice(&1234u32.to_le_bytes());
    let response = client.control_point(&command, INDICATION_TIMEOUT).await?;
    ensure!(
        response.status == ResponseCode::Success,
        "Expected Success, got {:?}",
        response.status
    );

    // Truncated parameter is an ATT error, not an indication
    client
        .control_point_expect_error(&[OpCode::SetCumulativeValue as u8, 0x01, 0x02])
        .await
}

async fn test_live_data(client: &ImuClient, window: Duration) -> Result<()> {
    client.subscribe_live_data().await?;
    let samples = client.collect_samples(window).await?;
    client.unsubscribe_live_data().await?;

    // 100 ms period; allow for connection interval jitter
    let expected = window.as_millis() as usize / 100;
    ensure!(
        samples.len() >= expected / 2,
        "Expected about {} samples, got {}",
        expected,
        samples.len()
    );

    // At rest the accelerometer reads about 1 g
    let mean = samples.iter().map(|s| s.accel_magnitude()).sum::<f32>() / samples.len() as f32;
    ensure!(
        (0.5..1.5).contains(&mean),
        "Mean acceleration {:.2} g out of range",
        mean
    );
    print!("({} samples, |a| = {:.2} g) ", samples.len(), mean);
    Ok(())
}
