//! RHMP port helpers.
//!
//! RHMP source and destination ports are 14-bit fields. Packing masks larger
//! values instead of rejecting them, so callers that care must check
//! [`fits_port`] first.

/// Mask selecting the 14 bits of an RHMP port.
pub const PORT_MASK: u16 = 0x3FFF;

/// Largest representable RHMP port.
pub const MAX_PORT: u16 = PORT_MASK;

/// Truncate a port to its 14 packed bits.
pub fn mask_port(port: u16) -> u16 {
    port & PORT_MASK
}

/// Returns true if the port survives packing unchanged.
pub fn fits_port(port: u16) -> bool {
    port <= MAX_PORT
}
