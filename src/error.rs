//! Application error carrying the process exit code.
//!
//! Exit codes:
//! - `1`: `billy dates --check` found the date already collected
//! - `2`: bad input file, configuration or I/O failure
//! - `3`: nothing to write (no usable observations)

#[derive(Clone, PartialEq, Eq)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub const ALREADY_COLLECTED: u8 = 1;
    pub const INPUT: u8 = 2;
    pub const NO_DATA: u8 = 3;

    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// Input, configuration or I/O failure.
    pub fn input(message: impl Into<String>) -> Self {
        Self::new(Self::INPUT, message)
    }

    /// The run produced no rows; nothing is written.
    pub fn no_data(message: impl Into<String>) -> Self {
        Self::new(Self::NO_DATA, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
