//! Output-only pins on an external shift-register expander.
//!
//! Pins of this kind live in a shared register image; a streaming driver
//! outside this layer ships the image to the hardware. Writing a pin only
//! flips its bit in the image.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::PinError;
use crate::flags::{PinAttributes, PinCapabilities};
use crate::options::PinOptionsParser;
use crate::pin_assert;

use super::PinBackend;

pub const EXPANDER_CHANNELS: u8 = 32;

/// Shared register image for one expander chain.
#[derive(Default)]
pub struct ExpanderBus {
    bits: Mutex<u32>,
}

impl ExpanderBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bit(&self, index: u8, high: bool) {
        let mut bits = self.bits.lock();
        if high {
            *bits |= 1 << index;
        } else {
            *bits &= !(1 << index);
        }
    }

    pub fn read_bit(&self, index: u8) -> bool {
        *self.bits.lock() & (1 << index) != 0
    }

    /// Current register image, for the streaming driver and for tests.
    pub fn snapshot(&self) -> u32 {
        *self.bits.lock()
    }
}

struct Inner {
    attributes: PinAttributes,
    invert: bool,
}

pub struct ExpanderPin {
    bus: Arc<ExpanderBus>,
    index: u8,
    inner: Mutex<Inner>,
}

impl ExpanderPin {
    pub fn new(
        bus: Arc<ExpanderBus>,
        index: u8,
        options: PinOptionsParser<'_>,
    ) -> Result<Self, PinError> {
        if index >= EXPANDER_CHANNELS {
            return Err(PinError::Config(format!(
                "expander index {index} out of range (0..{EXPANDER_CHANNELS})"
            )));
        }

        let mut attributes = PinAttributes::UNDEFINED;
        for opt in options {
            if opt.is("low") {
                attributes |= PinAttributes::ACTIVE_LOW;
            } else if opt.is("high") {
                // Active high is the default.
            } else if opt.is("init_on") {
                attributes |= PinAttributes::INITIAL_ON;
            } else {
                return Err(PinError::Config(format!(
                    "unsupported expander option '{}' on pin {index}",
                    opt.token()
                )));
            }
        }

        Ok(Self {
            bus,
            index,
            inner: Mutex::new(Inner {
                invert: attributes.contains(PinAttributes::ACTIVE_LOW),
                attributes,
            }),
        })
    }
}

impl PinBackend for ExpanderPin {
    fn capabilities(&self) -> PinCapabilities {
        PinCapabilities::OUTPUT
    }

    fn attributes(&self) -> PinAttributes {
        self.inner.lock().attributes
    }

    fn read(&self) -> bool {
        let attrs = self.attributes();
        pin_assert!(
            attrs.contains(PinAttributes::INPUT),
            "cannot read {}: no input attribute configured",
            self.describe()
        );
        false
    }

    fn write(&self, high: bool) {
        let (attrs, invert) = {
            let inner = self.inner.lock();
            (inner.attributes, inner.invert)
        };
        pin_assert!(
            attrs.contains(PinAttributes::OUTPUT),
            "cannot write {}: no output attribute configured",
            self.describe()
        );
        self.bus.write_bit(self.index, high ^ invert);
    }

    fn set_attr(&self, attrs: PinAttributes) -> Result<(), PinError> {
        {
            let mut inner = self.inner.lock();
            let merged = inner.attributes | attrs;
            if !merged.validate_with(self.capabilities()) {
                return Err(PinError::Config(format!(
                    "attributes {attrs:?} exceed the capabilities of {}",
                    self.describe()
                )));
            }
            if inner.attributes.conflicts_with(attrs) {
                return Err(PinError::Config(format!(
                    "attributes on {} were set before and conflict with {attrs:?}",
                    self.describe()
                )));
            }
            inner.attributes = merged;
            inner.invert = merged.contains(PinAttributes::ACTIVE_LOW);
        }
        self.reset();
        Ok(())
    }

    fn reset(&self) {
        let attrs = self.attributes();
        if attrs.contains(PinAttributes::OUTPUT) {
            self.write(attrs.contains(PinAttributes::INITIAL_ON));
        }
    }

    fn describe(&self) -> String {
        format!("Expander.{}", self.index)
    }
}
