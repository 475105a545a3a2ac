//! Duty-cycle output channel.
//!
//! The logical→hardware duty scale is computed once at configuration time;
//! the write path is a clamp, a multiply and a store.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::error::PinError;
use crate::flags::{PinAttributes, PinCapabilities};
use crate::options::PinOptionsParser;
use crate::pin_assert;

use super::PinBackend;

pub const PWM_CHANNELS: u8 = 8;

const DEFAULT_FREQUENCY_HZ: u32 = 5_000;
const DEFAULT_RESOLUTION_BITS: u8 = 10;

struct Inner {
    attributes: PinAttributes,
    invert: bool,
}

pub struct PwmPin {
    index: u8,
    frequency_hz: u32,
    max_duty: u32,
    duty_scale: f32,
    duty: AtomicU32,
    inner: Mutex<Inner>,
}

impl PwmPin {
    pub fn new(index: u8, options: PinOptionsParser<'_>) -> Result<Self, PinError> {
        if index >= PWM_CHANNELS {
            return Err(PinError::Config(format!(
                "pwm channel {index} out of range (0..{PWM_CHANNELS})"
            )));
        }

        let mut attributes = PinAttributes::UNDEFINED;
        let mut frequency_hz = DEFAULT_FREQUENCY_HZ;
        let mut resolution_bits = DEFAULT_RESOLUTION_BITS;
        for opt in options {
            if opt.is("low") {
                attributes |= PinAttributes::ACTIVE_LOW;
            } else if opt.is("high") {
                // Active high is the default.
            } else if opt.is("init_on") {
                attributes |= PinAttributes::INITIAL_ON;
            } else if opt.is("freq") {
                frequency_hz = opt.value().parse().map_err(|_| {
                    PinError::Config(format!(
                        "bad pwm frequency '{}' on channel {index}",
                        opt.value()
                    ))
                })?;
                if frequency_hz == 0 {
                    return Err(PinError::Config(format!(
                        "pwm frequency must be non-zero on channel {index}"
                    )));
                }
            } else if opt.is("bits") {
                resolution_bits = opt.value().parse().map_err(|_| {
                    PinError::Config(format!(
                        "bad pwm resolution '{}' on channel {index}",
                        opt.value()
                    ))
                })?;
                if !(1..=16).contains(&resolution_bits) {
                    return Err(PinError::Config(format!(
                        "pwm resolution {resolution_bits} out of range (1..=16) on channel {index}"
                    )));
                }
            } else {
                return Err(PinError::Config(format!(
                    "unsupported pwm option '{}' on channel {index}",
                    opt.token()
                )));
            }
        }

        let max_duty = (1u32 << resolution_bits) - 1;
        Ok(Self {
            index,
            frequency_hz,
            max_duty,
            duty_scale: max_duty as f32,
            duty: AtomicU32::new(0),
            inner: Mutex::new(Inner {
                invert: attributes.contains(PinAttributes::ACTIVE_LOW),
                attributes,
            }),
        })
    }

    pub fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }

    pub fn max_duty(&self) -> u32 {
        self.max_duty
    }

    /// Current duty register value, in hardware units.
    pub fn duty(&self) -> u32 {
        self.duty.load(Ordering::Relaxed)
    }

    fn store_duty(&self, raw: u32, invert: bool) {
        let raw = if invert { self.max_duty - raw } else { raw };
        self.duty.store(raw, Ordering::Relaxed);
    }
}

impl PinBackend for PwmPin {
    fn capabilities(&self) -> PinCapabilities {
        PinCapabilities::OUTPUT | PinCapabilities::PWM
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
        self.store_duty(if high { self.max_duty } else { 0 }, invert);
    }

    fn write_duty(&self, duty: f32) {
        let (attrs, invert) = {
            let inner = self.inner.lock();
            (inner.attributes, inner.invert)
        };
        pin_assert!(
            attrs.contains(PinAttributes::OUTPUT),
            "cannot write {}: no output attribute configured",
            self.describe()
        );
        let raw = (duty.clamp(0.0, 1.0) * self.duty_scale) as u32;
        self.store_duty(raw, invert);
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
        format!("PWM.{}", self.index)
    }
}
