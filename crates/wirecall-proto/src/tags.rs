//! Message tags and error-mask bits (spec §4.5).

use crate::errors::ProtocolError;

/// One-byte tags that open every exchange and close every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageTag {
    /// Client → server: negotiate integer/size widths.
    Connect = 0xCC,
    /// Client → server: look up a procedure by name.
    FuncFind = 0xFF,
    /// Client → server: invoke a procedure by digest.
    FuncCall = 0xFC,
    /// Client → server: end the session, no reply expected.
    Disconnect = 0xDC,
    /// Terminates every request and every reply.
    End = 0xED,
    /// Server → client: the preceding request succeeded.
    RtnSuccess = 0x55,
    /// Server → client: the preceding request failed.
    RtnError = 0xEE,
}

impl MessageTag {
    /// The tag's wire representation.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parses a tag byte, or `None` for an unrecognised value.
    #[must_use]
    pub const fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0xCC => Some(Self::Connect),
            0xFF => Some(Self::FuncFind),
            0xFC => Some(Self::FuncCall),
            0xDC => Some(Self::Disconnect),
            0xED => Some(Self::End),
            0x55 => Some(Self::RtnSuccess),
            0xEE => Some(Self::RtnError),
            _ => None,
        }
    }

    /// Parses a tag byte, mapping an unrecognised value to
    /// [`ProtocolError::UnknownTag`].
    pub fn parse(byte: u8) -> Result<Self, ProtocolError> {
        Self::from_u8(byte).ok_or(ProtocolError::UnknownTag(byte))
    }
}

/// Bitmask of error kinds carried in an `RTN_ERROR` reply (spec §4.5).
///
/// Multiple problems detected in a single exchange are OR-ed together, so
/// this is a plain bitmask rather than an enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorMask(u8);

impl ErrorMask {
    /// No error.
    pub const NONE: Self = Self(0x00);
    /// The connection has not completed a CONNECT handshake.
    pub const CXN_INVALID: Self = Self(0x01);
    /// No procedure is registered under the requested name/digest.
    pub const FUNC_NOT_FOUND: Self = Self(0x02);
    /// The payload's signed integer is outside the peer's negotiated range.
    pub const DATA_INT_OVF: Self = Self(0x04);
    /// The payload's buffer exceeds the peer's negotiated size ceiling.
    pub const DATA_BUFF_OVF: Self = Self(0x08);
    /// The payload's shape is internally inconsistent.
    pub const DATA_INVALID: Self = Self(0x10);
    /// The call referenced a digest with no bound handler.
    pub const HNDL_INVALID: Self = Self(0x20);
    /// An unrecognised message tag was received.
    pub const MSG_INVALID: Self = Self(0x40);
    /// A packet was not terminated by END.
    pub const PKT_INVALID: Self = Self(0x80);

    /// Wraps a raw mask byte as received on the wire.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// The mask's wire representation.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        self.0
    }

    /// True if no bit is set.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// True if `bit` is set in this mask.
    #[must_use]
    pub const fn contains(self, bit: Self) -> bool {
        self.0 & bit.0 == bit.0
    }

    /// Combines two masks, OR-ing their bits together.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Renders each set bit as a human-readable line, in a fixed order, for
    /// the client's stderr error report (spec §7).
    #[must_use]
    pub fn describe(self) -> Vec<&'static str> {
        const BITS: [(ErrorMask, &str); 8] = [
            (ErrorMask::CXN_INVALID, "connection is not initialised"),
            (ErrorMask::FUNC_NOT_FOUND, "procedure not found"),
            (ErrorMask::DATA_INT_OVF, "integer field out of range"),
            (ErrorMask::DATA_BUFF_OVF, "buffer exceeds negotiated size limit"),
            (ErrorMask::DATA_INVALID, "payload shape is invalid"),
            (ErrorMask::HNDL_INVALID, "handle does not resolve to a procedure"),
            (ErrorMask::MSG_INVALID, "unrecognised message tag"),
            (ErrorMask::PKT_INVALID, "packet was not terminated by END"),
        ];
        BITS.into_iter().filter(|(bit, _)| self.contains(*bit)).map(|(_, msg)| msg).collect()
    }
}

impl std::fmt::Display for ErrorMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            return write!(f, "none");
        }
        write!(f, "{}", self.describe().join(", "))
    }
}

impl std::ops::BitOr for ErrorMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for ErrorMask {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trip() {
        for tag in
            [MessageTag::Connect, MessageTag::FuncFind, MessageTag::FuncCall, MessageTag::Disconnect, MessageTag::End, MessageTag::RtnSuccess, MessageTag::RtnError]
        {
            assert_eq!(MessageTag::from_u8(tag.to_u8()), Some(tag));
        }
    }

    #[test]
    fn unknown_tag_is_none() {
        assert_eq!(MessageTag::from_u8(0x00), None);
        assert!(MessageTag::parse(0x00).is_err());
    }

    #[test]
    fn error_mask_combines_bits() {
        let mask = ErrorMask::DATA_INT_OVF | ErrorMask::DATA_BUFF_OVF;
        assert!(mask.contains(ErrorMask::DATA_INT_OVF));
        assert!(mask.contains(ErrorMask::DATA_BUFF_OVF));
        assert!(!mask.contains(ErrorMask::HNDL_INVALID));
        assert_eq!(mask.to_byte(), 0x0C);
    }

    #[test]
    fn error_mask_describe_lists_each_set_bit() {
        let mask = ErrorMask::CXN_INVALID | ErrorMask::PKT_INVALID;
        let lines = mask.describe();
        assert_eq!(lines.len(), 2);
        assert!(lines.contains(&"connection is not initialised"));
        assert!(lines.contains(&"packet was not terminated by END"));
    }

    #[test]
    fn error_mask_none_is_empty() {
        assert!(ErrorMask::NONE.is_none());
        assert!(ErrorMask::NONE.describe().is_empty());
    }
}
