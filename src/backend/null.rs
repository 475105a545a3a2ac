//! The safe default for unassigned logical pins.

use parking_lot::Mutex;

use crate::error::PinError;
use crate::flags::{PinAttributes, PinCapabilities};
use crate::options::PinOptionsParser;

use super::PinBackend;

/// Declares no capability, reads false, ignores writes.
pub struct NullPin {
    attributes: Mutex<PinAttributes>,
}

impl NullPin {
    pub fn new(mut options: PinOptionsParser<'_>) -> Result<Self, PinError> {
        if let Some(opt) = options.next() {
            return Err(PinError::Config(format!(
                "unsupported option '{}' on a null pin",
                opt.token()
            )));
        }
        Ok(Self {
            attributes: Mutex::new(PinAttributes::UNDEFINED),
        })
    }
}

impl PinBackend for NullPin {
    fn capabilities(&self) -> PinCapabilities {
        PinCapabilities::empty()
    }

    fn attributes(&self) -> PinAttributes {
        *self.attributes.lock()
    }

    fn read(&self) -> bool {
        false
    }

    fn write(&self, _high: bool) {}

    fn set_attr(&self, attrs: PinAttributes) -> Result<(), PinError> {
        if !attrs.validate_with(self.capabilities()) {
            return Err(PinError::Config(format!(
                "attributes {attrs:?} exceed the capabilities of {}",
                self.describe()
            )));
        }
        *self.attributes.lock() |= attrs;
        Ok(())
    }

    fn reset(&self) {}

    fn describe(&self) -> String {
        "None".to_string()
    }
}
