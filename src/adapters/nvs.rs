//! In-memory persistence adapter.
//!
//! Implements [`ConfigPort`] over a keyed blob map, the host-side stand-in
//! for flash storage.  Blobs are postcard-encoded; every save is validated
//! first so nothing out of range is ever persisted.

use std::cell::RefCell;
use std::collections::HashMap;

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::ControlConfig;
use crate::error::Error;

const CONFIG_NAMESPACE: &str = "windctl";
const CONFIG_KEY: &str = "ctlcfg";

/// Largest blob the store accepts.
const MAX_BLOB_SIZE: usize = 4000;

#[derive(Default)]
pub struct MemoryNvs {
    store: RefCell<HashMap<String, Vec<u8>>>,
}

impl MemoryNvs {
    pub fn new() -> Self {
        info!("MemoryNvs: simulation backend");
        Self::default()
    }

    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// Raw blob access, for corruption tests and inspection.
    pub fn raw(&self) -> Option<Vec<u8>> {
        self.store
            .borrow()
            .get(&Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY))
            .cloned()
    }

    pub fn put_raw(&self, bytes: Vec<u8>) {
        self.store
            .borrow_mut()
            .insert(Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY), bytes);
    }
}

impl ConfigPort for MemoryNvs {
    fn load(&self) -> Result<ControlConfig, ConfigError> {
        let key = Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY);
        let Some(bytes) = self.store.borrow().get(&key).cloned() else {
            info!("MemoryNvs: no stored config, using defaults");
            return Ok(ControlConfig::default());
        };
        let cfg: ControlConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        if let Err(e) = cfg.validate() {
            warn!("MemoryNvs: stored config invalid ({}), using defaults", e);
            return Ok(ControlConfig::default());
        }
        info!("MemoryNvs: loaded config ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&self, config: &ControlConfig) -> Result<(), ConfigError> {
        config.validate().map_err(|e| match e {
            Error::Config(msg) => ConfigError::ValidationFailed(msg),
            _ => ConfigError::ValidationFailed("invalid config"),
        })?;

        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::IoError);
        }
        let key = Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY);
        self.store.borrow_mut().insert(key, bytes);
        info!("MemoryNvs: config saved");
        Ok(())
    }
}
