//! # Kernel Error Type
//!
//! Every fallible operation in the kernel returns [`Result`]. An [`Error`]
//! carries a [`Code`] plus the source location that produced it, so a log
//! line like `Full at src/pci/scan.rs:42` points straight at the failing
//! call without needing a backtrace.
//!
//! ```ignore
//! fn add(&mut self) -> Result<()> {
//!     if self.is_full() {
//!         return Err(Error::new(Code::Full));
//!     }
//!     Ok(())
//! }
//! ```

use core::fmt;
use core::panic::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    /// A fixed-capacity container is at capacity.
    Full,
    /// Pop on an empty queue.
    Empty,
    /// Requested capability or matching device is absent.
    NotFound,
    /// Invalid BAR index or capability offset.
    IndexOutOfRange,
    /// The host controller driver reported a failure.
    HardwareInitFailure,
    /// The device only offers a mechanism the kernel does not drive (MSI-X).
    NotImplemented,
    /// Operation issued in the wrong controller state.
    InvalidPhase,
}

impl Code {
    pub fn name(self) -> &'static str {
        match self {
            Code::Full => "Full",
            Code::Empty => "Empty",
            Code::NotFound => "NotFound",
            Code::IndexOutOfRange => "IndexOutOfRange",
            Code::HardwareInitFailure => "HardwareInitFailure",
            Code::NotImplemented => "NotImplemented",
            Code::InvalidPhase => "InvalidPhase",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Error {
    code: Code,
    file: &'static str,
    line: u32,
}

impl Error {
    /// Creates an error tagged with the caller's source location.
    #[track_caller]
    pub fn new(code: Code) -> Self {
        let loc = Location::caller();
        Self {
            code,
            file: loc.file(),
            line: loc.line(),
        }
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Error {}

impl PartialEq<Code> for Error {
    fn eq(&self, other: &Code) -> bool {
        self.code == *other
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.code, self.file, self.line)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
