//! # Kernel Log Sink
//!
//! Leveled diagnostics over COM1. Messages at or below the current threshold
//! are written, everything else is dropped.
//!
//! | Level | Value | Used for                              |
//! |-------|-------|---------------------------------------|
//! | Error | 3     | failed configuration, driver errors   |
//! | Warn  | 4     | skipped ports, dropped messages       |
//! | Info  | 6     | bring-up progress                     |
//! | Debug | 7     | every discovered device, each event   |
//!
//! ## Usage
//!
//! ```ignore
//! use kosmos::{log, logger::LogLevel};
//! log!(LogLevel::Info, "xHC found at {}.{}.{}", dev.bus, dev.device, dev.function);
//! ```
//!
//! The serial lock is always taken with interrupts masked, so a handler that
//! logs can never spin on a lock held by the code it interrupted.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use spin::Mutex;
use uart_16550::SerialPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 3,
    Warn = 4,
    Info = 6,
    Debug = 7,
}

impl LogLevel {
    fn from_u8(value: u8) -> Self {
        match value {
            0..=3 => LogLevel::Error,
            4..=5 => LogLevel::Warn,
            6 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN ",
            LogLevel::Info => "INFO ",
            LogLevel::Debug => "DEBUG",
        }
    }
}

pub static SERIAL: Mutex<SerialPort> = Mutex::new(unsafe { SerialPort::new(0x3F8) });

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);

/// Brings up COM1. Must run before the first log line reaches the port.
pub fn init() {
    SERIAL.lock().init();
}

pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn log_level() -> LogLevel {
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

pub fn enabled(level: LogLevel) -> bool {
    level <= log_level()
}

#[doc(hidden)]
pub fn write_log(level: LogLevel, args: fmt::Arguments) {
    if !enabled(level) {
        return;
    }
    write_line(format_args!("[{}] {}", level.tag(), args));
}

#[cfg(not(test))]
#[doc(hidden)]
pub fn write_line(args: fmt::Arguments) {
    use core::fmt::Write;

    x86_64::instructions::interrupts::without_interrupts(|| {
        let _ = writeln!(SERIAL.lock(), "{}", args);
    });
}

#[cfg(test)]
#[doc(hidden)]
pub fn write_line(args: fmt::Arguments) {
    std::eprintln!("{}", args);
}

#[macro_export]
macro_rules! log {
    ($level:expr, $($arg:tt)*) => {{
        $crate::logger::write_log($level, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! println {
    () => {{
        $crate::logger::write_line(format_args!(""));
    }};
    ($($arg:tt)*) => {{
        $crate::logger::write_line(format_args!($($arg)*));
    }};
}
