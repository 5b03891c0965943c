//! Device identity derived from the ESP32 factory MAC address.
//!
//! When no MQTT client id is configured, the monitor identifies itself as
//! `salt-level-xxyyzz` (last 3 MAC bytes, lowercase hex). The id doubles as
//! the discovery node id, so it is stable across reboots and free of topic
//! separators.

use core::fmt::Write;

/// Fixed-size identity string: "salt-level-xxyyzz" (17 chars).
pub type DeviceIdString = heapless::String<24>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: writes exactly 6 bytes into `mac`.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Derive the client identity from the last 3 MAC bytes.
pub fn client_id(mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    let _ = write!(id, "salt-level-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    id
}

/// The configured id, or the MAC-derived one when none is configured.
pub fn resolve_client_id(configured: &str) -> String {
    if configured.is_empty() {
        client_id(&read_mac()).as_str().to_owned()
    } else {
        configured.to_owned()
    }
}
