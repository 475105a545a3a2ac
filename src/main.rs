use std::sync::Arc;

use log::info;

use pinmgr::{MachineConfig, PinRegistry};

#[cfg(feature = "hardware-gpio")]
use pinmgr::LibgpiodChip;
#[cfg(not(feature = "hardware-gpio"))]
use pinmgr::SoftGpio;

fn main() {
    env_logger::init();

    let machine_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PINMGR_MACHINE").ok())
        .unwrap_or_else(|| "machine.json".to_string());
    let machine = MachineConfig::load_from_file(&machine_path)
        .unwrap_or_else(|e| panic!("Failed to load machine file: {e}"));

    info!("bringing up '{}' (chip {})", machine.name, machine.chip);

    let chip = {
        #[cfg(feature = "hardware-gpio")]
        {
            Arc::new(LibgpiodChip::new(&machine.chip))
        }
        #[cfg(not(feature = "hardware-gpio"))]
        {
            Arc::new(SoftGpio::new())
        }
    };

    let registry = PinRegistry::new(chip);
    machine
        .apply(&registry)
        .unwrap_or_else(|e| panic!("Machine bring-up failed: {e}"));

    let mut names: Vec<&String> = machine.pins.keys().collect();
    names.sort();
    for name in names {
        let pin = registry
            .get(name)
            .unwrap_or_else(|e| panic!("Pin vanished during bring-up: {e}"));
        info!(
            "pin {name:24} {pin} capabilities={:?}",
            pin.capabilities()
        );
    }

    info!("{} pins ready", machine.pins.len());
}
