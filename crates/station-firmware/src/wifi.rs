//! WiFi station and network stack
//!
//! The radio and the embassy-net stack are created once per boot. The
//! association itself is driven by [`EspWifiLink`] so the duty cycle can
//! count connectivity polls and give up.

use embassy_executor::Spawner;
use embassy_net::{DhcpConfig, Runner, Stack, StackResources};
use esp_hal::peripherals::WIFI;
use esp_hal::rng::Rng;
use esp_radio::Controller;
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice};
use log::{debug, error, info};
use static_cell::StaticCell;
use station_core::config::WifiConfig;
use station_core::error::NetworkError;
use station_core::traits::WifiLink;

/// Sockets alive at once: DNS, one UDP for SNTP and one TCP for the POST.
const SOCKET_COUNT: usize = 3;

static RADIO: StaticCell<Controller<'static>> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<SOCKET_COUNT>> = StaticCell::new();

pub struct EspWifiLink {
    controller: WifiController<'static>,
    stack: Stack<'static>,
}

impl EspWifiLink {
    pub fn stack(&self) -> Stack<'static> {
        self.stack
    }
}

/// Bring up the radio and the DHCP network stack, and spawn its runner
pub fn init_network(
    spawner: &Spawner,
    wifi: WIFI<'static>,
    config: &WifiConfig<'_>,
) -> Result<EspWifiLink, NetworkError> {
    let radio = esp_radio::init().map_err(|e| {
        error!("Radio init failed: {:?}", e);
        NetworkError::Start
    })?;
    let radio = RADIO.init(radio);

    let (controller, interfaces) =
        esp_radio::wifi::new(radio, wifi, Default::default()).map_err(|e| {
            error!("WiFi driver init failed: {:?}", e);
            NetworkError::Start
        })?;

    let mut dhcp = DhcpConfig::default();
    dhcp.hostname = config.hostname.parse().ok();
    let net_config = embassy_net::Config::dhcpv4(dhcp);

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    let resources = NET_RESOURCES.init(StackResources::new());
    let (stack, runner) = embassy_net::new(interfaces.sta, net_config, resources, seed);

    spawner.spawn(net_task(runner)).map_err(|e| {
        error!("Failed to spawn network runner: {:?}", e);
        NetworkError::Start
    })?;

    Ok(EspWifiLink { controller, stack })
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

impl WifiLink for EspWifiLink {
    async fn begin(&mut self, config: &WifiConfig<'_>) -> Result<(), NetworkError> {
        let client = ModeConfig::Client(
            ClientConfig::default()
                .with_ssid(config.ssid.into())
                .with_password(config.password.into()),
        );

        self.controller.set_config(&client).map_err(|e| {
            error!("WiFi set_config failed: {:?}", e);
            NetworkError::Configuration
        })?;

        if !matches!(self.controller.is_started(), Ok(true)) {
            self.controller.start_async().await.map_err(|e| {
                error!("WiFi start failed: {:?}", e);
                NetworkError::Start
            })?;
        }

        info!("Connecting to WiFi \"{}\" (channel hint {})", config.ssid, config.channel);
        self.controller.connect().map_err(|e| {
            error!("WiFi connect failed: {:?}", e);
            NetworkError::Association
        })
    }

    fn is_connected(&mut self) -> bool {
        matches!(self.controller.is_connected(), Ok(true)) && self.stack.is_config_up()
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self.controller.disconnect_async().await {
            debug!("WiFi disconnect: {:?}", e);
        }
        if let Err(e) = self.controller.stop_async().await {
            debug!("WiFi stop: {:?}", e);
        }
        info!("WiFi disconnected");
    }
}
