//! Protocol constants

/// Default response timeout (seconds)
pub const DEFAULT_TIMEOUT: u64 = 5;

/// Default TCP port of a serial device server (RFC 2217 / raw TCP)
pub const DEFAULT_TCP_PORT: u16 = 4001;

/// Default serial baud rate
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Carriage return
pub const CR: u8 = b'\r';

/// Line feed
pub const LF: u8 = b'\n';

/// Channel parameter keys understood by more than one family
pub mod parameters {
    /// Number of readings averaged by a calibration
    pub const CALIBRATION_READINGS: &str = "calibration_readings";
    
    /// Readings averaged automatically per measurement
    pub const AUTO_AVERAGE: &str = "auto_average";
    
    /// Readings averaged by manual repetition
    pub const MANUAL_AVERAGE: &str = "manual_average";
    
    /// Delay before measuring (seconds)
    pub const DELAY: &str = "delay";
    
    /// Instrument display mode
    pub const DISPLAY_MODE: &str = "display_mode";
}
