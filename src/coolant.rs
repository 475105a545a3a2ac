//! Flood/mist coolant outputs, driven through named pin handles.

use bitflags::bitflags;
use log::debug;

use crate::error::PinError;
use crate::flags::PinAttributes;
use crate::pin::{Pin, PinRegistry};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CoolantState: u8 {
        const FLOOD = 0x01;
        const MIST  = 0x02;
    }
}

pub struct CoolantControl {
    flood: Pin,
    mist: Pin,
}

impl CoolantControl {
    /// Looks up the coolant pins by their canonical names.
    pub fn new(registry: &PinRegistry) -> Result<Self, PinError> {
        Ok(Self {
            flood: registry.get("coolant_flood")?,
            mist: registry.get("coolant_mist")?,
        })
    }

    /// Configures both lines readable-writable (state reporting reads them
    /// back) and drives them to the safe (off) state.
    pub fn init(&self) -> Result<(), PinError> {
        self.flood
            .set_attr(PinAttributes::INPUT | PinAttributes::OUTPUT)?;
        self.mist
            .set_attr(PinAttributes::INPUT | PinAttributes::OUTPUT)?;
        self.stop();
        Ok(())
    }

    /// Current coolant output state; overrides may alter it from the
    /// programmed state.
    pub fn state(&self) -> CoolantState {
        let mut state = CoolantState::empty();
        if self.flood.read() {
            state |= CoolantState::FLOOD;
        }
        if self.mist.read() {
            state |= CoolantState::MIST;
        }
        state
    }

    /// Immediately turns everything off. Safe to call from reset paths.
    pub fn stop(&self) {
        self.flood.off();
        self.mist.off();
    }

    pub fn set_state(&self, state: CoolantState) {
        debug!("coolant state -> {state:?}");
        if state.is_empty() {
            self.stop();
            return;
        }
        if state.contains(CoolantState::FLOOD) {
            self.flood.on();
        }
        if state.contains(CoolantState::MIST) {
            self.mist.on();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::SoftGpio;
    use std::sync::Arc;

    fn setup() -> CoolantControl {
        let registry = PinRegistry::new(Arc::new(SoftGpio::new()));
        registry.define("coolant_flood", "gpio.25").unwrap();
        registry.define("coolant_mist", "gpio.21").unwrap();
        let coolant = CoolantControl::new(&registry).unwrap();
        coolant.init().unwrap();
        coolant
    }

    #[test]
    fn init_leaves_everything_off() {
        let coolant = setup();
        assert_eq!(coolant.state(), CoolantState::empty());
    }

    #[test]
    fn flood_and_mist_track_requests() {
        let coolant = setup();
        coolant.set_state(CoolantState::FLOOD);
        assert_eq!(coolant.state(), CoolantState::FLOOD);

        coolant.set_state(CoolantState::FLOOD | CoolantState::MIST);
        assert_eq!(coolant.state(), CoolantState::FLOOD | CoolantState::MIST);

        coolant.stop();
        assert_eq!(coolant.state(), CoolantState::empty());
    }

    #[test]
    fn missing_pin_name_fails_lookup() {
        let registry = PinRegistry::new(Arc::new(SoftGpio::new()));
        registry.define("coolant_flood", "gpio.25").unwrap();
        assert!(matches!(
            CoolantControl::new(&registry),
            Err(PinError::Lookup(_))
        ));
    }
}
