//! Checksummed request/response messaging over UDP.
//!
//! rhp speaks two stacked protocols inside one datagram: RHP, a byte-aligned
//! frame with a 16-bit one's-complement checksum, and RHMP, a bit-packed
//! message carried inside RHP frames. A bounded retry loop resends a request
//! until a reply with a valid checksum arrives.
//!
//! # Crate Structure
//!
//! - [`transport`]: datagram transport abstraction and UDP implementations
//! - [`frame`]: checksum engine plus the RHP and RHMP codecs
//! - [`exchange`]: retrying exchanges, client API, responder and configuration

/// Re-export transport types.
pub mod transport {
    pub use rhp_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use rhp_frame::*;
}

/// Re-export exchange types.
pub mod exchange {
    pub use rhp_exchange::*;
}
