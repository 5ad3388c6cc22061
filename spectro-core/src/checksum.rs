//! Hex-frame checksum algorithm
//!
//! 1. Sum every payload byte as an unsigned 8-bit value (wrapping)
//! 2. Take ones-complement: ~sum
//!
//! The checksum covers the binary payload, not its hex text.

use tracing::trace;

/// Calculate frame checksum
///
/// # Examples
///
/// ```
/// use spectro_core::checksum;
///
/// assert_eq!(checksum::calculate(&[]), 0xFF);
/// assert_eq!(checksum::calculate(&[0x10]), 0xEF);
/// ```
pub fn calculate(payload: &[u8]) -> u8 {
    let sum = payload
        .iter()
        .fold(0u8, |sum, byte| sum.wrapping_add(*byte));
    
    let checksum = !sum;
    
    trace!(
        payload_len = payload.len(),
        checksum = format!("0x{:02X}", checksum),
        "Calculated checksum"
    );
    
    checksum
}

/// Verify checksum
pub fn verify(payload: &[u8], expected: u8) -> bool {
    calculate(payload) == expected
}
