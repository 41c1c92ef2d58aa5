#![no_std]
#![no_main]

extern crate alloc;

// Required for ESP-IDF bootloader compatibility
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use embassy_executor::Spawner;
use esp_backtrace as _;
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::Async;
use static_cell::StaticCell;

use imu_gatt_firmware::config;
use imu_gatt_firmware::sensor::driver::Icm42670;
use imu_gatt_firmware::sensor::ImuSensor;
use imu_gatt_firmware::tasks::ble_task;

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

/// Static cell for esp-radio controller (needed for 'static lifetime)
static RADIO_CONTROLLER: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();

/// Type alias for the BLE controller
type BleController = trouble_host::prelude::ExternalController<
    esp_radio::ble::controller::BleConnector<'static>,
    10,
>;

type Imu = Icm42670<I2c<'static, Async>>;

#[esp_hal::main]
fn main() -> ! {
    // BLE requires significant heap
    esp_alloc::heap_allocator!(size: 64 * 1024);

    esp_println::logger::init_logger(config::logging::LEVEL);

    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Must be started before any async operation
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // I2C0 on the board's IMU pins (SDA = GPIO10, SCL = GPIO8)
    let i2c = I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(config::i2c::FREQUENCY_KHZ)),
    )
    .expect("Failed to initialise I2C")
    .with_sda(peripherals.GPIO10)
    .with_scl(peripherals.GPIO8)
    .into_async();

    let imu = Icm42670::new(i2c);

    // Last 3 bytes of the eFuse MAC make the BLE address unique per board
    let mac = esp_hal::efuse::Efuse::read_base_mac_address();
    let device_id: [u8; 3] = [mac[3], mac[4], mac[5]];

    // esp-radio must be initialised after esp_rtos::start
    let radio_controller = RADIO_CONTROLLER.init(
        esp_radio::init().expect("Failed to initialise esp-radio")
    );

    let ble_connector = esp_radio::ble::controller::BleConnector::new(
        radio_controller,
        peripherals.BT,
        esp_radio::ble::Config::default(),
    ).expect("Failed to initialise BLE connector");

    let controller: BleController = trouble_host::prelude::ExternalController::new(ble_connector);

    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(async_main(spawner, imu, controller, device_id));
    })
}

#[embassy_executor::task]
async fn async_main(spawner: Spawner, mut imu: Imu, controller: BleController, device_id: [u8; 3]) {
    // On failure every sample() returns NotReady and ticks are skipped
    match imu.init().await {
        Ok(()) => log::info!("IMU: initialised"),
        Err(e) => log::error!("IMU: init failed: {}", e),
    }

    spawner.must_spawn(ble_host_task(controller, imu, device_id));
}

/// Task that manages BLE connectivity and live data notifications
#[embassy_executor::task]
async fn ble_host_task(controller: BleController, imu: Imu, device_id: [u8; 3]) {
    ble_task(controller, imu, device_id).await;
}
