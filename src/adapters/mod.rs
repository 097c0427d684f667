//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                   |
//! |----------------|--------------------|-------------------------------|
//! | `device_id`    |                    | eFuse MAC → hostname          |
//! | `hardware`     | SwitchPort         | Appliance GPIO + indicator    |
//! | `log_sink`     | EventSink          | Serial log output             |
//! | `mqtt`         | BrokerTransport    | ESP-MQTT client               |
//! | `network`      | Link/Provisioning/ | Bundles the three below       |
//! |                | RestartPort        |                               |
//! | `nvs`          | ConfigPort         | NVS / in-memory store         |
//! | `provisioning` | ProvisioningPort   | ESP-Touch SmartConfig         |
//! | `system`       | RestartPort        | `esp_restart()`               |
//! | `time`         |                    | ESP32 system timer            |
//! | `wifi`         | LinkPort           | ESP-IDF WiFi STA              |

pub mod device_id;
pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod network;
pub mod nvs;
pub mod provisioning;
pub mod system;
pub mod time;
pub mod wifi;
