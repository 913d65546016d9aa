#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_time::Delay;
use esp_hal::clock::CpuClock;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info};
use station_core::{Capabilities, DutyCycle, PowerAction};
use station_firmware::battery::AdcBatteryProbe;
use station_firmware::hardware::{create_battery_adc, create_i2c_bus, device_id};
use station_firmware::http::HttpClient;
use station_firmware::sensor::Bme280Sensor;
use station_firmware::settings::{CONFIG, FIRMWARE_VERSION};
use station_firmware::sntp::SntpClock;
use station_firmware::{power, wifi};

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    esp_hal::system::software_reset()
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();
    log::set_max_level(CONFIG.log_level());

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let device_id = device_id();
    info!("Weather station {} firmware {}", device_id, FIRMWARE_VERSION);

    let link = match wifi::init_network(&spawner, peripherals.WIFI, &CONFIG.wifi) {
        Ok(link) => link,
        Err(e) => {
            error!("Network bring-up failed: {}", e);
            power::apply(PowerAction::Reset, peripherals.LPWR).await
        }
    };
    let stack = link.stack();

    let i2c = create_i2c_bus(peripherals.I2C0, peripherals.GPIO8, peripherals.GPIO9)
        .expect("Failed to configure I2C bus");
    let (adc, battery_pin) = create_battery_adc(peripherals.ADC1, peripherals.GPIO1);

    let capabilities = Capabilities {
        link,
        sensor: Bme280Sensor::new(i2c, &CONFIG.sensor),
        battery: AdcBatteryProbe::new(adc, battery_pin),
        transport: HttpClient::new(stack),
        clock: SntpClock::new(stack),
        delay: Delay,
    };

    let report = DutyCycle::new(&CONFIG, device_id, FIRMWARE_VERSION)
        .run(capabilities)
        .await;
    info!("Cycle finished: {:?}", report.outcome);

    power::apply(report.action, peripherals.LPWR).await
}
