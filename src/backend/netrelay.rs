//! A pin that is really a command sent to a remote relay.
//!
//! The first write spawns one background worker. The worker owns the
//! transport: it connects, transmits the command frame matching the desired
//! level, and retries while the peer is unreachable. Writes from the control
//! path only store the desired level; rapid toggles coalesce to the latest
//! value, and an in-flight command is never cancelled. Relay-class actuators
//! tolerate sub-second staleness, which is what buys the non-blocking write.

use std::io::Write as _;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, info};
use parking_lot::Mutex;

use crate::error::PinError;
use crate::flags::{PinAttributes, PinCapabilities};
use crate::options::PinOptionsParser;
use crate::pin_assert;

use super::PinBackend;

const IDLE_TIME: Duration = Duration::from_millis(10);
const DEFAULT_PORT: u16 = 6668;

// Worker run states.
const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOP_REQUESTED: u8 = 2;

// Desired level; UNSET until the first write so the first real command is
// always transmitted.
const UNSET: u8 = 2;

// Command frames captured from the relay's local protocol; the third word of
// the header selects the action (0x03 switches on, 0x02 switches off).
const FRAME_ON: &str = "00 00 55 aa 00 00 00 03 00 00 00 0d 00 00 00 37 33 2e 33 00 00 00 00 00 00 00 19 00 09 20 e9 0d 59 d9 f9 85 89 ad d1 \
                        1c 1a 32 7b be 7f 91 60 1b bd fd 8f 0e 14 56 30 6c c8 b1 4c 2a 4e 62 db 2f 89 7b fc 00 00 aa 55";
const FRAME_OFF: &str = "00 00 55 aa 00 00 00 02 00 00 00 0d 00 00 00 37 33 2e 33 00 00 00 00 00 00 00 18 00 09 20 e9 ee 4b 62 0f 5d 55 43 5a \
                         55 69 95 4a 91 7e e1 7b 11 09 3b 2c 37 ed fe 4f a2 7a b8 af f1 fd 34 6a 42 f0 88 1a 00 00 aa 55";

fn decode_frame(hex: &str) -> Vec<u8> {
    let digits: Vec<u8> = hex
        .chars()
        .filter_map(|c| c.to_digit(16))
        .map(|d| d as u8)
        .collect();
    digits.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect()
}

struct Inner {
    attributes: PinAttributes,
    invert: bool,
}

pub struct NetRelayPin {
    index: u8,
    host: String,
    port: u16,
    frame_on: Vec<u8>,
    frame_off: Vec<u8>,
    desired: Arc<AtomicU8>,
    running: Arc<AtomicU8>,
    worker: Mutex<Option<JoinHandle<()>>>,
    inner: Mutex<Inner>,
}

impl NetRelayPin {
    pub fn new(index: u8, options: PinOptionsParser<'_>) -> Result<Self, PinError> {
        let mut attributes = PinAttributes::UNDEFINED;
        let mut host = None;
        let mut port = DEFAULT_PORT;
        for opt in options {
            if opt.is("low") {
                attributes |= PinAttributes::ACTIVE_LOW;
            } else if opt.is("high") {
                // Active high is the default.
            } else if opt.is("host") {
                if opt.value().is_empty() {
                    return Err(PinError::Config(format!(
                        "empty host on network relay {index}"
                    )));
                }
                host = Some(opt.value().to_string());
            } else if opt.is("port") {
                port = opt.value().parse().map_err(|_| {
                    PinError::Config(format!(
                        "bad port '{}' on network relay {index}",
                        opt.value()
                    ))
                })?;
            } else {
                return Err(PinError::Config(format!(
                    "unsupported network relay option '{}' on pin {index}",
                    opt.token()
                )));
            }
        }
        let host = host.ok_or_else(|| {
            PinError::Config(format!("network relay {index} needs a host= option"))
        })?;

        Ok(Self {
            index,
            host,
            port,
            frame_on: decode_frame(FRAME_ON),
            frame_off: decode_frame(FRAME_OFF),
            desired: Arc::new(AtomicU8::new(UNSET)),
            running: Arc::new(AtomicU8::new(IDLE)),
            worker: Mutex::new(None),
            inner: Mutex::new(Inner {
                invert: attributes.contains(PinAttributes::ACTIVE_LOW),
                attributes,
            }),
        })
    }

    /// Spawns the command worker on the first write.
    fn ensure_worker(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }

        self.running.store(RUNNING, Ordering::Release);
        let desired = self.desired.clone();
        let running = self.running.clone();
        let host = self.host.clone();
        let port = self.port;
        let frame_on = self.frame_on.clone();
        let frame_off = self.frame_off.clone();
        let label = self.describe();

        info!("{label}: starting relay command worker for {host}:{port}");
        *worker = Some(std::thread::spawn(move || {
            relay_worker(&label, &host, port, &frame_on, &frame_off, &desired, &running);
        }));
    }

    #[cfg(test)]
    pub(crate) fn desired_level(&self) -> u8 {
        self.desired.load(Ordering::Acquire)
    }
}

/// Transmits the frame for every change of desired level, retrying while the
/// peer is unreachable. A desired level is acknowledged only after a
/// successful send; transient transport failures are observable only as
/// staleness of the remote actuator.
fn relay_worker(
    label: &str,
    host: &str,
    port: u16,
    frame_on: &[u8],
    frame_off: &[u8],
    desired: &AtomicU8,
    running: &AtomicU8,
) {
    let mut acked = UNSET;
    while running.load(Ordering::Acquire) == RUNNING {
        let want = desired.load(Ordering::Acquire);
        if want == acked || want == UNSET {
            std::thread::sleep(IDLE_TIME);
            continue;
        }

        let frame = if want == 1 { frame_on } else { frame_off };
        match send_frame(host, port, frame) {
            Ok(()) => {
                debug!("{label}: relay switched to {want}");
                acked = want;
            }
            Err(err) => {
                debug!("{label}: relay unreachable ({err}), retrying");
                std::thread::sleep(IDLE_TIME);
            }
        }
    }
    running.store(IDLE, Ordering::Release);
}

fn send_frame(host: &str, port: u16, frame: &[u8]) -> std::io::Result<()> {
    let mut stream = TcpStream::connect((host, port))?;
    stream.set_write_timeout(Some(Duration::from_secs(1)))?;
    stream.write_all(frame)?;
    Ok(())
}

impl PinBackend for NetRelayPin {
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

    /// Returns as soon as the desired level is recorded; transmission happens
    /// on the worker. Latest write wins.
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
        self.ensure_worker();
        self.desired.store((high ^ invert) as u8, Ordering::Release);
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
        format!("NetRelay.{}", self.index)
    }
}

impl Drop for NetRelayPin {
    /// Requests the worker to stop and blocks until it acknowledges.
    fn drop(&mut self) {
        if self.running.load(Ordering::Acquire) == RUNNING {
            self.running.store(STOP_REQUESTED, Ordering::Release);
        }
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::split_spec;

    fn build(spec: &str) -> Result<NetRelayPin, PinError> {
        let mut buf = spec.to_string();
        let (head, opts) = split_spec(&mut buf);
        let index: u8 = head.split_once('.').unwrap().1.parse().unwrap();
        NetRelayPin::new(index, opts)
    }

    #[test]
    fn frames_decode_to_fixed_commands() {
        let on = decode_frame(FRAME_ON);
        let off = decode_frame(FRAME_OFF);
        assert_eq!(on.len(), 71);
        assert_eq!(off.len(), 71);
        assert_eq!(&on[..4], &[0x00, 0x00, 0x55, 0xaa]);
        assert_eq!(on[7], 0x03);
        assert_eq!(off[7], 0x02);
        assert_eq!(&on[on.len() - 2..], &[0xaa, 0x55]);
    }

    #[test]
    fn host_option_is_mandatory() {
        assert!(matches!(build("network_relay.0"), Err(PinError::Config(_))));
        assert!(build("network_relay.0:host=127.0.0.1").is_ok());
    }

    #[test]
    fn bad_port_is_rejected() {
        assert!(matches!(
            build("network_relay.0:host=127.0.0.1:port=banana"),
            Err(PinError::Config(_))
        ));
    }

    #[test]
    fn capabilities_are_output_only() {
        let pin = build("network_relay.0:host=127.0.0.1").unwrap();
        assert_eq!(pin.capabilities(), PinCapabilities::OUTPUT);
        assert!(pin.set_attr(PinAttributes::INPUT).is_err());
    }

    #[test]
    fn rapid_writes_coalesce_to_latest() {
        // Unreachable peer: the worker keeps retrying while the desired
        // level tracks the newest write.
        let pin = build("network_relay.1:host=127.0.0.1:port=1").unwrap();
        pin.set_attr(PinAttributes::OUTPUT).unwrap();
        pin.write(true);
        pin.write(false);
        pin.write(true);
        assert_eq!(pin.desired_level(), 1);
        drop(pin); // joins the worker
    }

    #[test]
    fn active_low_stores_physical_level() {
        let pin = build("network_relay.2:host=127.0.0.1:port=1:low").unwrap();
        pin.set_attr(PinAttributes::OUTPUT).unwrap();
        pin.write(true);
        assert_eq!(pin.desired_level(), 0);
    }
}
