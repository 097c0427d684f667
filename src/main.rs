//! Linkcore firmware: main entry point.
//!
//! Hexagonal architecture driven by one cooperative loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiLink        SmartConfig     SystemRestart   MqttTransport │
//! │  (LinkPort)      (Provisioning)  (RestartPort)   (Transport)   │
//! │  SwitchAdapter   LogEventSink    NvsConfigStore  Clock         │
//! │  (SwitchPort)    (EventSink)     (ConfigPort)                  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │                 Runtime (pure logic)                   │    │
//! │  │  LinkSupervisor · SessionManager · Scheduler           │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  EventQueue ◀── WiFi sysloop · MQTT connection thread          │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{debug, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{AnyIOPin, AnyOutputPin, PinDriver, Pull};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use linkcore::adapters::device_id;
use linkcore::adapters::hardware::SwitchAdapter;
use linkcore::adapters::log_sink::LogEventSink;
use linkcore::adapters::mqtt::MqttTransport;
use linkcore::adapters::network::Network;
use linkcore::adapters::nvs::NvsConfigStore;
use linkcore::adapters::provisioning::SmartConfig;
use linkcore::adapters::system::SystemRestart;
use linkcore::adapters::time::MonotonicClock;
use linkcore::adapters::wifi::WifiLink;
use linkcore::app::commands::{register_switch_handler, switch_topic};
use linkcore::app::ports::ConfigPort;
use linkcore::app::runtime::Runtime;
use linkcore::app::supervisor::LinkSupervisor;
use linkcore::config::SystemConfig;
use linkcore::diagnostics;
use linkcore::error::Error;
use linkcore::events::EventQueue;
use linkcore::pins;
use linkcore::session::{SessionManager, SessionSettings};

/// Shared between the WiFi event loop, the MQTT connection thread and the
/// main loop.
static QUEUE: EventQueue = EventQueue::new();

/// Main-loop pacing.
const LOOP_PERIOD_MS: u32 = 10;

/// How often the status report is written to the debug log.
const STATUS_LOG_INTERVAL_MS: u64 = 60_000;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Linkcore v{}                     ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    diagnostics::install_panic_handler();

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let clock = MonotonicClock::new();

    // ── 2. Config + identity ──────────────────────────────────
    let config = match NvsConfigStore::new(nvs_partition.clone()) {
        Ok(store) => match store.load() {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("Config load failed ({}), using defaults", e);
                SystemConfig::default()
            }
        },
        Err(e) => {
            warn!("NVS unavailable ({}), running with defaults", e);
            SystemConfig::default()
        }
    };

    let mac = device_id::read_mac();
    let hostname = device_id::hostname(&config.hostname_prefix, &mac);
    info!(
        "Device: chip id {} (hostname: {})",
        device_id::chip_id(&mac),
        hostname
    );

    // ── 3. Pins ───────────────────────────────────────────────
    // SAFETY: each GPIO number below is claimed exactly once and never
    // through `peripherals.pins`.
    let led = PinDriver::output(unsafe { AnyOutputPin::new(pins::STATUS_LED_GPIO) })?;
    let mut button = PinDriver::input(unsafe { AnyIOPin::new(pins::RECOVERY_BUTTON_GPIO) })?;
    button.set_pull(Pull::Up)?;
    let switch_pin = PinDriver::output(unsafe { AnyOutputPin::new(pins::APPLIANCE_SWITCH_GPIO) })?;
    let indicator =
        PinDriver::output(unsafe { AnyOutputPin::new(pins::APPLIANCE_INDICATOR_GPIO) })?;

    // ── 4. Network adapters ───────────────────────────────────
    let link = WifiLink::new(
        peripherals.modem,
        sysloop.clone(),
        nvs_partition,
        &hostname,
        &QUEUE,
    )
    .map_err(Error::from)?;
    let provisioning = SmartConfig::new().map_err(Error::from)?;
    let mut net = Network::new(link, provisioning, SystemRestart::new());

    // ── 5. Core ───────────────────────────────────────────────
    let supervisor = LinkSupervisor::with_pins(
        Some(led),
        pins::STATUS_LED_ACTIVE_HIGH,
        Some(button),
        pins::RECOVERY_BUTTON_ACTIVE_LOW,
        &config,
        clock.uptime_ms(),
    );
    let session = SessionManager::new(
        MqttTransport::new(&QUEUE),
        config.broker.endpoint(&hostname),
        SessionSettings::from(&config),
    );
    let mut runtime = Runtime::new(supervisor, session, &config);

    let switch = SwitchAdapter::new(
        switch_pin,
        pins::APPLIANCE_SWITCH_ACTIVE_HIGH,
        Some(indicator),
        pins::APPLIANCE_INDICATOR_ACTIVE_HIGH,
    );
    let topic = switch_topic(&hostname);
    register_switch_handler(runtime.session_mut(), &topic, switch, config.ack_qos)
        .map_err(Error::from)?;
    info!("Switch commands on '{}'", topic);

    let mut sink = LogEventSink::new();
    runtime.start(clock.uptime_ms(), &mut net, &mut sink);

    info!("System ready. Entering event loop.");

    // ── 6. Event loop ─────────────────────────────────────────
    let mut last_status_ms = clock.uptime_ms();
    loop {
        let started = clock.uptime_ms();
        runtime.step(started, &QUEUE, &mut net, &mut sink);
        let ended = clock.uptime_ms();
        runtime.record_loop(started, ended, &mut sink);

        if ended.saturating_sub(last_status_ms) >= STATUS_LOG_INTERVAL_MS {
            last_status_ms = ended;
            match runtime.status_report().to_json() {
                Ok(json) => debug!("Status: {}", json),
                Err(e) => warn!("Status report not serialisable: {}", e),
            }
        }

        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
