/// Build-time configuration inputs baked into `SystemConfig::from_build_env()`.
const CONFIG_ENV: &[&str] = &[
    "WIFI_SSID",
    "WIFI_PASSWORD",
    "WIFI_MAX_RETRY",
    "MQTT_BROKER_URL",
    "MQTT_CLIENT_ID",
    "MQTT_USERNAME",
    "MQTT_PASSWORD",
    "TANK_HEIGHT_CM",
    "READING_INTERVAL_SEC",
];

fn main() {
    for var in CONFIG_ENV {
        println!("cargo:rerun-if-env-changed={var}");
    }

    // Host builds run the simulation and have no ESP-IDF environment to export.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
}
