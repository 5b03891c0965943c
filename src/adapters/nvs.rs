//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`]: a single `postcard` blob under
//! `saltlevel::syscfg` overrides the build-time defaults.
//!
//! - **`target_os = "espidf"`**: default NVS partition via `esp_idf_svc::nvs`.
//!   Taking the partition runs `nvs_flash_init`, erasing and re-initialising
//!   on a layout/version mismatch. The same partition handle is lent to the
//!   Wi-Fi driver for its calibration data.
//! - **other targets**: in-memory map for host tests and simulation.
//!
//! Stored blobs are validated on load and before every save.

use log::info;

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

const CONFIG_NAMESPACE: &str = "saltlevel";
const CONFIG_KEY: &str = "syscfg";

/// Upper bound on the stored config blob.
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(target_os = "espidf")]
    partition: EspDefaultNvsPartition,
    #[cfg(target_os = "espidf")]
    nvs: EspNvs<NvsDefault>,
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Bring up persistent storage.
    ///
    /// `Err(ConfigError::IoError)` is boot-fatal: the caller must halt.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            let partition = EspDefaultNvsPartition::take().map_err(|e| {
                log::warn!("NvsAdapter: partition init failed ({})", e);
                ConfigError::IoError
            })?;
            let nvs = EspNvs::new(partition.clone(), CONFIG_NAMESPACE, true).map_err(|e| {
                log::warn!("NvsAdapter: open '{}' failed ({})", CONFIG_NAMESPACE, e);
                ConfigError::IoError
            })?;
            info!("NvsAdapter: ESP-IDF NVS initialised");
            Ok(Self { partition, nvs })
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("NvsAdapter: simulation backend");
            Ok(Self {
                store: std::cell::RefCell::new(HashMap::new()),
            })
        }
    }

    /// Partition handle for drivers that keep their own NVS data.
    #[cfg(target_os = "espidf")]
    pub fn partition(&self) -> EspDefaultNvsPartition {
        self.partition.clone()
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key() -> String {
        format!("{}::{}", CONFIG_NAMESPACE, CONFIG_KEY)
    }

    /// Raw blob read. `Ok(None)` when nothing is stored.
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            let mut buf = vec![0u8; MAX_BLOB_SIZE];
            match self.nvs.get_blob(CONFIG_KEY, &mut buf) {
                Ok(found) => Ok(found.map(<[u8]>::to_vec)),
                Err(e) => {
                    log::warn!("NvsAdapter: NVS read error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            Ok(self.store.borrow().get(&Self::composite_key()).cloned())
        }
    }

    fn write_blob(&mut self, bytes: &[u8]) -> Result<(), ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            self.nvs.set_blob(CONFIG_KEY, bytes).map_err(|e| {
                log::warn!("NvsAdapter: NVS write error {}", e);
                ConfigError::IoError
            })
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(Self::composite_key(), bytes.to_vec());
            Ok(())
        }
    }

    /// Store raw bytes without validation (test hook for corrupt blobs).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_write_raw(&self, bytes: &[u8]) {
        self.store
            .borrow_mut()
            .insert(Self::composite_key(), bytes.to_vec());
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let Some(bytes) = self.read_blob()? else {
            info!("NvsAdapter: no stored config, using build defaults");
            return Ok(SystemConfig::from_build_env());
        };
        let cfg: SystemConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::ValidationFailed("config blob too large"));
        }
        self.write_blob(&bytes)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> SystemConfig {
        SystemConfig {
            wifi_ssid: "HomeNet".into(),
            tank_height_cm: 80.0,
            ..SystemConfig::default()
        }
    }

    #[test]
    fn empty_store_yields_build_defaults() {
        let nvs = NvsAdapter::new().unwrap();
        assert_eq!(nvs.load().unwrap(), SystemConfig::from_build_env());
    }

    #[test]
    fn save_then_load() {
        let mut nvs = NvsAdapter::new().unwrap();
        nvs.save(&valid()).unwrap();
        assert_eq!(nvs.load().unwrap(), valid());
    }

    #[test]
    fn save_rejects_invalid_config() {
        let mut nvs = NvsAdapter::new().unwrap();
        let mut cfg = valid();
        cfg.tank_height_cm = -1.0;
        assert!(matches!(nvs.save(&cfg), Err(ConfigError::ValidationFailed(_))));
        assert_eq!(nvs.load().unwrap(), SystemConfig::from_build_env());
    }

    #[test]
    fn corrupt_blob_is_reported() {
        let nvs = NvsAdapter::new().unwrap();
        nvs.sim_write_raw(&[0xFF; 3]);
        assert_eq!(nvs.load(), Err(ConfigError::Corrupted));
    }

    #[test]
    fn stored_blob_failing_validation_is_rejected() {
        let nvs = NvsAdapter::new().unwrap();
        let mut cfg = valid();
        cfg.reading_interval_secs = 0;
        nvs.sim_write_raw(&postcard::to_allocvec(&cfg).unwrap());
        assert!(matches!(nvs.load(), Err(ConfigError::ValidationFailed(_))));
    }
}
