use std::{fs, path::Path};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::PinError;
use crate::pin::PinRegistry;

fn default_chip() -> String {
    "/dev/gpiochip0".to_string()
}

/// Machine description: which logical pin names exist and which physical
/// pins they map to, as `backend[.index][:option]*` specification strings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MachineConfig {
    pub name: String,
    #[serde(default = "default_chip")]
    pub chip: String,
    pub pins: FxHashMap<String, String>,
}

impl MachineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, PinError> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| PinError::Config(format!("Failed to read machine file: {e}")))?;
        serde_json::from_str(&contents)
            .map_err(|e| PinError::Config(format!("Invalid machine json: {e}")))
    }

    /// Defines every configured pin on the registry. Any illegal
    /// specification fails the whole bring-up.
    pub fn apply(&self, registry: &PinRegistry) -> Result<(), PinError> {
        for (name, spec) in &self.pins {
            registry.define(name, spec)?;
        }
        Ok(())
    }
}
