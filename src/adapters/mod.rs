//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements        | Connects to                     |
//! |-------------|-------------------|---------------------------------|
//! | `wifi`      | StationPort       | ESP-IDF Wi-Fi STA / sim thread  |
//! | `mqtt`      | PublishPort       | ESP-IDF MQTT client / sim log   |
//! | `nvs`       | ConfigPort        | NVS / in-memory store           |
//! | `log_sink`  | EventSink         | Serial log output               |
//! | `time`      | MonotonicClock    | ESP32 high-resolution timer     |
//! | `device_id` | —                 | eFuse factory MAC               |

pub mod device_id;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod time;
pub mod wifi;
