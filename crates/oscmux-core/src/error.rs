//! Error types for the OSC codec and address handling

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Codec and addressing errors
///
/// Every decode failure is one of these; the runtime layers log and drop
/// the offending datagram instead of propagating it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A length field or fixed-width value runs past the end of the buffer
    #[error("buffer too small: need {needed} bytes, have {have}")]
    BufferTooSmall { needed: usize, have: usize },

    /// A string field has no NUL terminator inside the remaining bytes
    #[error("unterminated string (scanned {scanned} bytes)")]
    UnterminatedString { scanned: usize },

    /// A string field is not valid UTF-8
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// Packet does not start with `/` or `#bundle`
    #[error("unknown packet start byte: 0x{0:02x}")]
    UnknownPacket(u8),

    /// Type-tag string does not begin with `,`
    #[error("malformed type tag string: {0:?}")]
    MalformedTypeTags(String),

    /// Type tag character outside the supported set
    #[error("unsupported type tag: {0:?}")]
    UnknownTypeTag(char),

    /// Bundle element size is zero, unaligned or larger than what is left
    #[error("invalid bundle element size: {0}")]
    InvalidElementSize(i32),

    /// Blob size field is negative
    #[error("negative length field: {0}")]
    NegativeLength(i32),

    /// Bundles nested deeper than the decoder allows
    #[error("bundle nesting exceeds depth {0}")]
    DepthExceeded(usize),

    /// Trailing bytes left after a message was fully decoded
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),

    /// String argument the wire format cannot carry (embedded NUL)
    #[error("invalid string argument: {0:?}")]
    InvalidString(String),

    /// Blob or packet larger than the wire format can express
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// Invalid concrete address
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid address pattern
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// Invalid argument type signature
    #[error("invalid type signature: {0}")]
    InvalidSignature(String),
}
