//! Hardware GPIO chip over the Linux GPIO character device.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, yield_now};
use std::time::Duration;

use libgpiod::{chip::Chip, line, request};
use log::warn;
use parking_lot::{FairMutex, RwLock};
use rustc_hash::FxHashMap;

use crate::error::PinError;
use crate::flags::PinAttributes;
use crate::interrupt::{EdgeMode, IsrHandler};
use crate::pin_assert;

use super::GpioChip;

const EVENT_BUFFER_CAPACITY: usize = 64;
const EVENT_WAIT_TIMEOUT: Duration = Duration::from_millis(10);

pub struct LibgpiodChip {
    path: String,
    lines: RwLock<FxHashMap<u8, LineState>>,
}

struct LineState {
    attrs: PinAttributes,
    handle: Arc<FairMutex<GpiodHandle>>,
    listener: Option<EdgeListener>, // drop before the handle
}

struct GpiodHandle {
    request: request::Request,
}

impl GpiodHandle {
    fn new(chip_path: &str, line_cfg: &line::Config) -> Result<Self, PinError> {
        let chip = Chip::open(&PathBuf::from(chip_path))
            .map_err(|e| PinError::Config(format!("open chip {chip_path}: {e}")))?;
        let mut req_cfg = request::Config::new()
            .map_err(|e| PinError::Config(format!("request config: {e}")))?;
        req_cfg
            .set_consumer(env!("CARGO_PKG_NAME"))
            .map_err(|e| PinError::Config(format!("request consumer: {e}")))?;
        let request = chip
            .request_lines(Some(&req_cfg), line_cfg)
            .map_err(|e| PinError::Config(format!("request lines: {e}")))?;
        Ok(Self { request })
    }
}

/// Waits for edge events on one requested line and feeds qualifying ones to
/// the attached handler.
struct EdgeListener {
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EdgeListener {
    fn new(
        index: u8,
        gpiod_handle: Arc<FairMutex<GpiodHandle>>,
        mode: EdgeMode,
        mut handler: IsrHandler,
    ) -> Result<Self, PinError> {
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_flag = cancel.clone();
        let mut buffer = request::Buffer::new(EVENT_BUFFER_CAPACITY)
            .map_err(|e| PinError::Config(format!("event buffer: {e}")))?;

        let handle = std::thread::spawn(move || {
            while !cancel_flag.load(Ordering::Relaxed) {
                let hdl = gpiod_handle.lock();
                let req = &hdl.request;

                let has_event = match req.wait_edge_events(Some(EVENT_WAIT_TIMEOUT)) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!("wait edge events error for gpio {index}: {e}");
                        yield_now();
                        continue;
                    }
                };
                if !has_event {
                    continue;
                }

                let events = match req.read_edge_events(&mut buffer) {
                    Ok(events) => events,
                    Err(e) => {
                        warn!("read edge events error for gpio {index}: {e}");
                        yield_now();
                        continue;
                    }
                };
                for event in events {
                    let event = match event {
                        Ok(e) => e,
                        Err(_) => continue,
                    };
                    let (old, new) = match event.event_type() {
                        Ok(line::EdgeKind::Rising) => (false, true),
                        Ok(line::EdgeKind::Falling) => (true, false),
                        Err(_) => continue,
                    };
                    if mode.matches(old, new) {
                        handler();
                    }
                }
            }
        });

        Ok(Self {
            cancel,
            handle: Some(handle),
        })
    }
}

impl Drop for EdgeListener {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl LibgpiodChip {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            lines: RwLock::new(FxHashMap::default()),
        }
    }

    fn make_line_settings(
        attrs: PinAttributes,
        edge: Option<line::Edge>,
    ) -> Result<line::Settings, PinError> {
        let mut ls = line::Settings::new()
            .map_err(|e| PinError::Config(format!("libgpiod settings: {e}")))?;

        // The character device cannot hold a line in both directions at
        // once; an input+output pin is requested as an output and read back
        // through the driver.
        if attrs.contains(PinAttributes::OUTPUT) {
            ls.set_direction(line::Direction::Output)
                .map_err(|e| PinError::Config(format!("set direction: {e}")))?;
            ls.set_drive(line::Drive::PushPull)
                .map_err(|e| PinError::Config(format!("set drive: {e}")))?;
        } else {
            ls.set_direction(line::Direction::Input)
                .map_err(|e| PinError::Config(format!("set direction: {e}")))?;
            let bias = if attrs.contains(PinAttributes::PULL_UP) {
                Some(line::Bias::PullUp)
            } else if attrs.contains(PinAttributes::PULL_DOWN) {
                Some(line::Bias::PullDown)
            } else {
                None
            };
            ls.set_bias(bias)
                .map_err(|e| PinError::Config(format!("set bias: {e}")))?;
        }

        if let Some(edge) = edge {
            ls.set_edge_detection(Some(edge))
                .map_err(|e| PinError::Config(format!("set edge detection: {e}")))?;
        }

        Ok(ls)
    }

    fn make_line_config(index: u8, settings: line::Settings) -> Result<line::Config, PinError> {
        let mut cfg =
            line::Config::new().map_err(|e| PinError::Config(format!("line config: {e}")))?;
        cfg.add_line_settings(&[index as u32], settings)
            .map_err(|e| PinError::Config(format!("line config add settings: {e}")))?;
        Ok(cfg)
    }

    fn reconfigure(
        &self,
        index: u8,
        attrs: PinAttributes,
        edge: Option<line::Edge>,
    ) -> Result<Arc<FairMutex<GpiodHandle>>, PinError> {
        let settings = Self::make_line_settings(attrs, edge)?;
        let line_cfg = Self::make_line_config(index, settings)?;

        let mut lines = self.lines.write();
        match lines.get_mut(&index) {
            Some(state) => {
                state
                    .handle
                    .lock()
                    .request
                    .reconfigure_lines(&line_cfg)
                    .map_err(|e| PinError::Config(format!("reconfigure lines: {e}")))?;
                state.attrs = attrs;
                Ok(state.handle.clone())
            }
            None => {
                let handle = Arc::new(FairMutex::new(GpiodHandle::new(&self.path, &line_cfg)?));
                lines.insert(
                    index,
                    LineState {
                        attrs,
                        handle: handle.clone(),
                        listener: None,
                    },
                );
                Ok(handle)
            }
        }
    }
}

impl GpioChip for LibgpiodChip {
    fn set_mode(&self, index: u8, attrs: PinAttributes) -> Result<(), PinError> {
        self.reconfigure(index, attrs, None)?;
        Ok(())
    }

    fn read_level(&self, index: u8) -> bool {
        let lines = self.lines.read();
        let Some(state) = lines.get(&index) else {
            warn!("read on unconfigured gpio {index}");
            return false;
        };
        match state.handle.lock().request.value(index as u32) {
            Ok(line::Value::Active) => true,
            Ok(line::Value::InActive) => false,
            Err(e) => {
                warn!("get value for gpio {index}: {e}");
                false
            }
        }
    }

    fn write_level(&self, index: u8, high: bool) {
        let lines = self.lines.read();
        let Some(state) = lines.get(&index) else {
            warn!("write on unconfigured gpio {index}");
            return;
        };
        let value = if high {
            line::Value::Active
        } else {
            line::Value::InActive
        };
        if let Err(e) = state.handle.lock().request.set_value(index as u32, value) {
            warn!("set value for gpio {index}: {e}");
        }
    }

    fn attach_isr(&self, index: u8, mode: EdgeMode, handler: IsrHandler) {
        let attrs = {
            let lines = self.lines.read();
            let Some(state) = lines.get(&index) else {
                pin_assert!(false, "interrupt attach on unconfigured gpio {index}");
                return;
            };
            pin_assert!(
                state.listener.is_none(),
                "interrupt already attached to gpio {index}"
            );
            state.attrs
        };

        // Always request both edges; the listener filters against the mode
        // so classification is identical to the simulated chip.
        let handle = match self.reconfigure(index, attrs, Some(line::Edge::Both)) {
            Ok(handle) => handle,
            Err(e) => {
                pin_assert!(false, "edge reconfigure for gpio {index}: {e}");
                return;
            }
        };
        let listener = match EdgeListener::new(index, handle, mode, handler) {
            Ok(listener) => listener,
            Err(e) => {
                pin_assert!(false, "edge listener for gpio {index}: {e}");
                return;
            }
        };
        if let Some(state) = self.lines.write().get_mut(&index) {
            state.listener = Some(listener);
        }
    }

    fn detach_isr(&self, index: u8) {
        let (attrs, listener) = {
            let mut lines = self.lines.write();
            let Some(state) = lines.get_mut(&index) else {
                return;
            };
            (state.attrs, state.listener.take())
        };
        drop(listener); // joins the event thread before the lines change
        if let Err(e) = self.reconfigure(index, attrs, None) {
            warn!("clearing edge detection for gpio {index}: {e}");
        }
    }
}
