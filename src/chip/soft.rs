//! Software-simulated GPIO chip.
//!
//! A fixed table of simulated channels stands in for the real registers so
//! the whole pin layer can run off-hardware. Edge callbacks fire under the
//! exact same classification as the hardware path, on the stack of whoever
//! injected the value.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::PinError;
use crate::flags::PinAttributes;
use crate::interrupt::{EdgeMode, IsrHandler};
use crate::pin_assert;

use super::GpioChip;

pub const SOFT_CHANNELS: usize = 64;

type SharedIsr = Arc<Mutex<IsrHandler>>;

#[derive(Default)]
struct SoftChannel {
    input: bool,
    output: bool,
    pin_mode: PinAttributes,
    edge_mode: Option<EdgeMode>,
    isr: Option<SharedIsr>,
}

impl SoftChannel {
    fn clear(&mut self) {
        self.input = false;
        self.output = false;
        self.pin_mode = PinAttributes::UNDEFINED;
        self.edge_mode = None;
        self.isr = None;
    }
}

pub struct SoftGpio {
    channels: Mutex<Vec<SoftChannel>>,
}

impl Default for SoftGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftGpio {
    pub fn new() -> Self {
        let channels = (0..SOFT_CHANNELS).map(|_| SoftChannel::default()).collect();
        Self {
            channels: Mutex::new(channels),
        }
    }

    /// Injects a new input value, as an external signal source would. Fires
    /// the registered callback when the transition matches the configured
    /// edge mode. The callback runs on the caller's stack, after the table
    /// lock is released.
    pub fn set_input(&self, index: u8, value: bool) {
        let fire = {
            let mut channels = self.channels.lock();
            let ch = &mut channels[index as usize];
            let old = ch.input;
            ch.input = value;
            match (ch.edge_mode, &ch.isr) {
                (Some(mode), Some(isr)) if mode.matches(old, value) => Some(isr.clone()),
                _ => None,
            }
        };
        if let Some(isr) = fire {
            let mut handler = isr.lock();
            (*handler)();
        }
    }

    /// Last value driven out of the channel.
    pub fn output(&self, index: u8) -> bool {
        self.channels.lock()[index as usize].output
    }

    /// Current input register value.
    pub fn input(&self, index: u8) -> bool {
        self.channels.lock()[index as usize].input
    }

    /// Mode bits the pin layer configured for the channel.
    pub fn mode(&self, index: u8) -> PinAttributes {
        self.channels.lock()[index as usize].pin_mode
    }

    /// Restores every channel to power-up defaults: no callback, no edge
    /// mode, both values false. Safe to call between independent test cases.
    pub fn reset(&self) {
        let mut channels = self.channels.lock();
        for ch in channels.iter_mut() {
            ch.clear();
        }
    }
}

impl GpioChip for SoftGpio {
    fn set_mode(&self, index: u8, attrs: PinAttributes) -> Result<(), PinError> {
        self.channels.lock()[index as usize].pin_mode = attrs;
        Ok(())
    }

    fn read_level(&self, index: u8) -> bool {
        self.input(index)
    }

    /// Records the output value and loops it back through the input path, so
    /// a write on an input+output pin is observable by `read` and can fire
    /// an attached interrupt, matching what the wire does on real hardware.
    fn write_level(&self, index: u8, high: bool) {
        self.channels.lock()[index as usize].output = high;
        self.set_input(index, high);
    }

    fn attach_isr(&self, index: u8, mode: EdgeMode, handler: IsrHandler) {
        let mut channels = self.channels.lock();
        let ch = &mut channels[index as usize];
        pin_assert!(
            ch.edge_mode.is_none(),
            "interrupt already attached to simulated channel {index}"
        );
        ch.edge_mode = Some(mode);
        ch.isr = Some(Arc::new(Mutex::new(handler)));
    }

    fn detach_isr(&self, index: u8) {
        let mut channels = self.channels.lock();
        let ch = &mut channels[index as usize];
        ch.edge_mode = None;
        ch.isr = None;
    }
}
