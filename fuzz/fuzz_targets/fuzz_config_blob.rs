//! Fuzz target: persisted config blob decode
//!
//! Writes arbitrary bytes as the stored config and loads it back.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - A successful load always yields a config that passes validation
//!
//! cargo fuzz run fuzz_config_blob

#![no_main]

use libfuzzer_sys::fuzz_target;
use saltlevel::adapters::nvs::NvsAdapter;
use saltlevel::app::ports::ConfigPort;

fuzz_target!(|data: &[u8]| {
    let Ok(nvs) = NvsAdapter::new() else {
        return;
    };
    nvs.sim_write_raw(data);

    if let Ok(config) = nvs.load() {
        assert!(config.validate().is_ok(), "load returned an invalid config");
    }
});
