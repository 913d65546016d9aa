//! End of a wake
//!
//! Deep sleep uses the RTC timer as wake-up source, so the chip boots from
//! the top like after a reset and no GPIO-to-reset strap is needed.

use core::time::Duration;

use embassy_time::Timer;
use esp_hal::peripherals::LPWR;
use esp_hal::rtc_cntl::Rtc;
use esp_hal::rtc_cntl::sleep::TimerWakeupSource;
use esp_hal::system::software_reset;
use log::info;
use station_core::PowerAction;

pub async fn apply(action: PowerAction, lpwr: LPWR<'static>) -> ! {
    match action {
        PowerAction::DeepSleep { seconds } => {
            let mut rtc = Rtc::new(lpwr);
            let timer = TimerWakeupSource::new(Duration::from_secs(u64::from(seconds)));
            info!("Entering deep sleep for {}s", seconds);
            rtc.sleep_deep(&[&timer])
        }
        PowerAction::Restart { delay_ms } => {
            Timer::after_millis(u64::from(delay_ms)).await;
            software_reset()
        }
        PowerAction::Reset => software_reset(),
    }
}
