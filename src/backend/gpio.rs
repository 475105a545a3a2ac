//! Direct digital line, routed through the platform's [`GpioChip`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::chip::GpioChip;
use crate::error::PinError;
use crate::flags::{PinAttributes, PinCapabilities};
use crate::interrupt::{EdgeMode, IsrHandler};
use crate::options::PinOptionsParser;
use crate::pin_assert;

use super::PinBackend;

pub const GPIO_CHANNELS: u8 = 40;

struct Inner {
    attributes: PinAttributes,
    invert: bool,
    isr_attached: bool,
}

pub struct GpioPin {
    chip: Arc<dyn GpioChip>,
    index: u8,
    capabilities: PinCapabilities,
    inner: Mutex<Inner>,
}

/// Board definition: which modes each channel index physically supports.
/// Indices 34..=39 are input-only and have no internal pulls.
fn capabilities_for(index: u8) -> Result<PinCapabilities, PinError> {
    let mut caps = match index {
        0..=33 => {
            PinCapabilities::INPUT
                | PinCapabilities::OUTPUT
                | PinCapabilities::INTERRUPT
                | PinCapabilities::PULL_UP
                | PinCapabilities::PULL_DOWN
        }
        34..=39 => PinCapabilities::INPUT | PinCapabilities::INTERRUPT,
        _ => {
            return Err(PinError::Config(format!(
                "gpio index {index} out of range (0..{GPIO_CHANNELS})"
            )));
        }
    };
    if matches!(index, 25 | 26) {
        caps |= PinCapabilities::ANALOG_OUT;
    }
    if (32..=39).contains(&index) {
        caps |= PinCapabilities::ANALOG_IN;
    }
    Ok(caps)
}

impl GpioPin {
    pub fn new(
        chip: Arc<dyn GpioChip>,
        index: u8,
        options: PinOptionsParser<'_>,
    ) -> Result<Self, PinError> {
        let capabilities = capabilities_for(index)?;

        let mut attributes = PinAttributes::UNDEFINED;
        for opt in options {
            if opt.is("low") {
                attributes |= PinAttributes::ACTIVE_LOW;
            } else if opt.is("high") {
                // Active high is the default.
            } else if opt.is("pu") {
                if !capabilities.contains(PinCapabilities::PULL_UP) {
                    return Err(PinError::Config(format!(
                        "gpio {index} has no internal pull-up"
                    )));
                }
                attributes |= PinAttributes::PULL_UP;
            } else if opt.is("pd") {
                if !capabilities.contains(PinCapabilities::PULL_DOWN) {
                    return Err(PinError::Config(format!(
                        "gpio {index} has no internal pull-down"
                    )));
                }
                attributes |= PinAttributes::PULL_DOWN;
            } else if opt.is("init_on") {
                attributes |= PinAttributes::INITIAL_ON;
            } else {
                return Err(PinError::Config(format!(
                    "unsupported gpio option '{}' on pin {index}",
                    opt.token()
                )));
            }
        }

        Ok(Self {
            chip,
            index,
            capabilities,
            inner: Mutex::new(Inner {
                invert: attributes.contains(PinAttributes::ACTIVE_LOW),
                attributes,
                isr_attached: false,
            }),
        })
    }

    fn snapshot(&self) -> (PinAttributes, bool) {
        let inner = self.inner.lock();
        (inner.attributes, inner.invert)
    }
}

impl PinBackend for GpioPin {
    fn capabilities(&self) -> PinCapabilities {
        self.capabilities
    }

    fn attributes(&self) -> PinAttributes {
        self.inner.lock().attributes
    }

    fn read(&self) -> bool {
        let (attrs, invert) = self.snapshot();
        pin_assert!(
            attrs.contains(PinAttributes::INPUT),
            "cannot read {}: no input attribute configured",
            self.describe()
        );
        self.chip.read_level(self.index) ^ invert
    }

    fn write(&self, high: bool) {
        let (attrs, invert) = self.snapshot();
        pin_assert!(
            attrs.contains(PinAttributes::OUTPUT),
            "cannot write {}: no output attribute configured",
            self.describe()
        );
        self.chip.write_level(self.index, high ^ invert);
    }

    fn set_attr(&self, attrs: PinAttributes) -> Result<(), PinError> {
        {
            let mut inner = self.inner.lock();
            let merged = inner.attributes | attrs;
            if !merged.validate_with(self.capabilities) {
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
            self.chip.set_mode(self.index, merged)?;
            inner.attributes = merged;
            inner.invert = merged.contains(PinAttributes::ACTIVE_LOW);
        }
        self.reset();
        Ok(())
    }

    fn reset(&self) {
        let (attrs, _) = self.snapshot();
        if attrs.contains(PinAttributes::OUTPUT) {
            self.write(attrs.contains(PinAttributes::INITIAL_ON));
        }
    }

    fn attach_interrupt(&self, mode: EdgeMode, handler: IsrHandler) {
        let mut inner = self.inner.lock();
        pin_assert!(
            inner.attributes.contains(PinAttributes::INTERRUPT),
            "cannot attach interrupt to {}: no interrupt attribute configured",
            self.describe()
        );
        pin_assert!(
            !inner.isr_attached,
            "interrupt already attached to {}",
            self.describe()
        );
        let physical = if inner.invert { mode.inverted() } else { mode };
        self.chip.attach_isr(self.index, physical, handler);
        inner.isr_attached = true;
    }

    fn detach_interrupt(&self) {
        let mut inner = self.inner.lock();
        if inner.isr_attached {
            self.chip.detach_isr(self.index);
            inner.isr_attached = false;
        }
    }

    fn describe(&self) -> String {
        format!("GPIO.{}", self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::SoftGpio;
    use crate::options::split_spec;

    fn build(spec: &str) -> Result<(Arc<SoftGpio>, GpioPin), PinError> {
        let chip = Arc::new(SoftGpio::new());
        let mut buf = spec.to_string();
        let (head, opts) = split_spec(&mut buf);
        let index: u8 = head.split_once('.').unwrap().1.parse().unwrap();
        let pin = GpioPin::new(chip.clone(), index, opts)?;
        Ok((chip, pin))
    }

    #[test]
    fn index_out_of_range_is_rejected() {
        assert!(matches!(build("gpio.40"), Err(PinError::Config(_))));
    }

    #[test]
    fn unknown_option_is_rejected() {
        assert!(matches!(build("gpio.16:bogus"), Err(PinError::Config(_))));
    }

    #[test]
    fn pull_up_on_input_only_channel_is_rejected() {
        assert!(matches!(build("gpio.36:pu"), Err(PinError::Config(_))));
    }

    #[test]
    fn input_only_channel_rejects_output_attr() {
        let (_, pin) = build("gpio.36").unwrap();
        assert!(pin.set_attr(PinAttributes::OUTPUT).is_err());
        // Prior (empty) configuration is untouched by the failure.
        assert_eq!(pin.attributes(), PinAttributes::UNDEFINED);
    }

    #[test]
    fn active_low_inverts_both_directions() {
        let (chip, pin) = build("gpio.16:low").unwrap();
        pin.set_attr(PinAttributes::INPUT | PinAttributes::OUTPUT)
            .unwrap();

        pin.write(true);
        assert!(!chip.output(16), "logical on must drive the line low");
        assert!(pin.read());

        pin.write(false);
        assert!(chip.output(16));
        assert!(!pin.read());
    }

    #[test]
    fn initial_on_drives_boot_level() {
        let (chip, pin) = build("gpio.13:init_on").unwrap();
        pin.set_attr(PinAttributes::OUTPUT).unwrap();
        assert!(chip.output(13));
    }

    #[test]
    fn attributes_stay_within_capabilities() {
        let (_, pin) = build("gpio.16:pu").unwrap();
        pin.set_attr(PinAttributes::INPUT | PinAttributes::INTERRUPT)
            .unwrap();
        let attrs = pin.attributes();
        assert!(attrs.validate_with(pin.capabilities()));
        assert!(attrs.contains(PinAttributes::PULL_UP));
    }
}
