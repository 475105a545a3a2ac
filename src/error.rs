use thiserror::Error;

#[derive(Debug, Error)]
pub enum PinError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Pin not found: {0}")]
    Lookup(String),
}

/// Contract violation on a pin: report through the diagnostic channel and
/// abort. Pin misuse can drive actuators into an unsafe physical state, so
/// these are never recoverable.
#[macro_export]
macro_rules! pin_assert {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            let msg = format!($($arg)+);
            ::log::error!(
                "assertion failed: {msg} at {}",
                ::std::backtrace::Backtrace::capture()
            );
            panic!("assertion failed: {msg}");
        }
    };
}
