pub mod expander;
pub mod gpio;
pub mod netrelay;
pub mod null;
pub mod pwm;

pub use expander::{ExpanderBus, ExpanderPin};
pub use gpio::GpioPin;
pub use netrelay::NetRelayPin;
pub use null::NullPin;
pub use pwm::PwmPin;

use crate::error::PinError;
use crate::flags::{PinAttributes, PinCapabilities};
use crate::interrupt::{EdgeMode, IsrHandler};
use crate::pin_assert;

/// One concrete transport behind the pin interface. Implementations are
/// selected from runtime configuration and owned behind a shared handle, so
/// every method takes `&self` and mutates through interior state.
pub trait PinBackend: Send + Sync {
    /// Physically possible modes, fixed at construction.
    fn capabilities(&self) -> PinCapabilities;

    /// Configuration actually committed. Always a subset of the capabilities
    /// once `set_attr` has succeeded.
    fn attributes(&self) -> PinAttributes;

    /// Logical input value, with the inversion mask applied.
    fn read(&self) -> bool;

    /// Drives the logical output value through the inversion mask.
    fn write(&self, high: bool);

    /// Duty-cycle write path. Only meaningful on PWM-capable backends.
    fn write_duty(&self, _duty: f32) {
        pin_assert!(false, "pin {} has no pwm capability", self.describe());
    }

    /// Commits the requested attributes: validates them against the
    /// capabilities, rejects conflicting re-attribution, recomputes the
    /// inversion mask and drives the pin to its initial level.
    fn set_attr(&self, attrs: PinAttributes) -> Result<(), PinError>;

    /// Drives the pin to its configured boot state (on iff INITIAL_ON),
    /// through the inversion mask.
    fn reset(&self);

    fn attach_interrupt(&self, _mode: EdgeMode, _handler: IsrHandler) {
        pin_assert!(false, "pin {} has no interrupt capability", self.describe());
    }

    fn detach_interrupt(&self) {}

    /// Diagnostic identity, e.g. `GPIO.16`.
    fn describe(&self) -> String;
}
