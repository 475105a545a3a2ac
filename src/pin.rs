//! Pin handles and the name→backend registry.

use std::fmt;
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::backend::{ExpanderBus, ExpanderPin, GpioPin, NetRelayPin, NullPin, PinBackend, PwmPin};
use crate::chip::GpioChip;
use crate::error::PinError;
use crate::flags::{PinAttributes, PinCapabilities};
use crate::interrupt::{EdgeMode, IsrHandler};
use crate::options::split_spec;

/// Lightweight façade over one backend instance. Cloning is cheap and every
/// clone aliases the same backend.
#[derive(Clone)]
pub struct Pin {
    backend: Arc<dyn PinBackend>,
}

impl Pin {
    pub fn capabilities(&self) -> PinCapabilities {
        self.backend.capabilities()
    }

    pub fn attributes(&self) -> PinAttributes {
        self.backend.attributes()
    }

    pub fn read(&self) -> bool {
        self.backend.read()
    }

    pub fn write(&self, high: bool) {
        self.backend.write(high)
    }

    pub fn on(&self) {
        self.write(true)
    }

    pub fn off(&self) {
        self.write(false)
    }

    pub fn write_duty(&self, duty: f32) {
        self.backend.write_duty(duty)
    }

    pub fn set_attr(&self, attrs: PinAttributes) -> Result<(), PinError> {
        self.backend.set_attr(attrs)
    }

    pub fn attach_interrupt(&self, mode: EdgeMode, handler: IsrHandler) {
        self.backend.attach_interrupt(mode, handler)
    }

    pub fn detach_interrupt(&self) {
        self.backend.detach_interrupt()
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.backend.describe())
    }
}

/// Long-lived registry mapping canonical pin names to backend instances.
/// Populated once during startup configuration, read-mostly afterwards.
pub struct PinRegistry {
    chip: Arc<dyn GpioChip>,
    expander: Arc<ExpanderBus>,
    pins: RwLock<FxHashMap<String, Pin>>,
}

impl PinRegistry {
    pub fn new(chip: Arc<dyn GpioChip>) -> Self {
        Self {
            chip,
            expander: Arc::new(ExpanderBus::new()),
            pins: RwLock::new(FxHashMap::default()),
        }
    }

    /// Register image shared by every expanded pin, for the streaming
    /// driver.
    pub fn expander(&self) -> Arc<ExpanderBus> {
        self.expander.clone()
    }

    /// Parses a pin specification, constructs the backend it selects and
    /// registers it under `name`. Fails fast on any unrecognized token,
    /// disallowed option or out-of-range index, before motion ever starts.
    pub fn define(&self, name: &str, spec: &str) -> Result<Pin, PinError> {
        let mut buffer = spec.to_string();
        let backend = self.build_backend(&mut buffer)?;
        let pin = Pin { backend };

        let mut pins = self.pins.write();
        if pins.contains_key(name) {
            return Err(PinError::Config(format!("pin '{name}' already defined")));
        }
        debug!("pin '{name}' -> {pin}");
        pins.insert(name.to_string(), pin.clone());
        Ok(pin)
    }

    pub fn get(&self, name: &str) -> Result<Pin, PinError> {
        self.pins
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| PinError::Lookup(name.to_string()))
    }

    /// Drops every registered backend. Test harness use only; must never run
    /// concurrently with consumers holding handles.
    pub fn reset_for_tests(&self) {
        self.pins.write().clear();
    }

    fn build_backend(&self, buffer: &mut str) -> Result<Arc<dyn PinBackend>, PinError> {
        let (head, options) = split_spec(buffer);
        let (kind, index) = match head.split_once('.') {
            Some((kind, index)) => {
                let index: u8 = index.parse().map_err(|_| {
                    PinError::Config(format!("bad pin index in '{head}'"))
                })?;
                (kind, index)
            }
            None => (head, 0),
        };

        match kind {
            "gpio" => Ok(Arc::new(GpioPin::new(self.chip.clone(), index, options)?)),
            "pwm" => Ok(Arc::new(PwmPin::new(index, options)?)),
            "expanded" => Ok(Arc::new(ExpanderPin::new(
                self.expander.clone(),
                index,
                options,
            )?)),
            "network_relay" => Ok(Arc::new(NetRelayPin::new(index, options)?)),
            "null" | "" => Ok(Arc::new(NullPin::new(options)?)),
            other => Err(PinError::Config(format!("unknown pin backend '{other}'"))),
        }
    }
}
