mod backend;
mod chip;
mod config;
mod coolant;
mod error;
mod flags;
mod interrupt;
mod options;
mod pin;

pub use backend::{ExpanderBus, ExpanderPin, GpioPin, NetRelayPin, NullPin, PinBackend, PwmPin};
pub use chip::{GpioChip, SoftGpio};
pub use config::MachineConfig;
pub use coolant::{CoolantControl, CoolantState};
pub use error::PinError;
pub use flags::{PinAttributes, PinCapabilities};
pub use interrupt::{EdgeMode, IsrHandler};
pub use options::{PinOption, PinOptionsParser};
pub use pin::{Pin, PinRegistry};

#[cfg(feature = "hardware-gpio")]
pub use chip::LibgpiodChip;
